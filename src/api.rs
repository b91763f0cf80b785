//! Coordinator API client — best-effort, bounded timeout, no retries.
//!
//! Every call degrades instead of failing: a coordinator outage costs at
//! most one cycle of stale metrics or a deferred job pickup.

use std::time::Duration;

use serde::Deserialize;

use crate::job::Job;
use crate::metrics::MetricsSnapshot;

/// Result of one job poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// The coordinator has work for this device.
    Job(Job),
    /// The coordinator answered: nothing queued.
    NoJob,
    /// Transport failure, non-2xx status, or a malformed body. For
    /// dispatch this means the same as `NoJob` — nothing to start this
    /// cycle — but it is not an authoritative "no work" answer.
    Unreachable,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    job: Option<Job>,
}

/// Stateless request/response wrapper around the coordinator's endpoints.
pub struct CoordinatorClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// `POST /heartbeat` — fire-and-forget; failures are absorbed.
    pub async fn publish_metrics(&self, snapshot: &MetricsSnapshot) {
        let result = self
            .client
            .post(self.endpoint("heartbeat"))
            .timeout(self.timeout)
            .json(snapshot)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "Heartbeat rejected");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Heartbeat failed");
            }
        }
    }

    /// `GET /check-for-jobs/{user_id}`.
    pub async fn poll_for_job(&self, user_id: &str) -> PollOutcome {
        let result = self
            .client
            .get(self.endpoint(&format!("check-for-jobs/{user_id}")))
            .timeout(self.timeout)
            .send()
            .await;

        let resp = match result {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "Job poll rejected");
                return PollOutcome::Unreachable;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Job poll failed");
                return PollOutcome::Unreachable;
            }
        };

        match resp.json::<JobEnvelope>().await {
            Ok(JobEnvelope { job: Some(job) }) => PollOutcome::Job(job),
            Ok(JobEnvelope { job: None }) => PollOutcome::NoJob,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed job poll response");
                PollOutcome::Unreachable
            }
        }
    }

    /// `POST /update-job` — returns whether the coordinator acknowledged
    /// the result with HTTP 200. Callers must not clear job state on
    /// `false`; re-reporting the same job id is safe.
    pub async fn report_result(&self, job_id: &str, stdout: &str, stderr: &str) -> bool {
        let body = serde_json::json!({
            "job_id": job_id,
            "stdout": stdout,
            "stderr": stderr,
        });

        let result = self
            .client
            .post(self.endpoint("update-job"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(job_id, status = %resp.status(), "Result report rejected");
                false
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Result report failed");
                false
            }
        }
    }
}
