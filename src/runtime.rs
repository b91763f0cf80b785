//! Agent runtime — the heartbeat/poll loop and the single-job execution path.
//!
//! Two background tasks exist at most: the poll loop (fixed cadence,
//! heartbeat then job poll) and one execution task. They share a single
//! guarded slot holding the current job, so a discovery can never race a
//! completion and the poll cadence is never stalled by a running job.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{CoordinatorClient, PollOutcome};
use crate::config::AgentConfig;
use crate::executor::JobExecutor;
use crate::job::Job;
use crate::metrics::MetricsSampler;
use crate::state::{AgentState, StateStore};
use crate::status::DeviceStatus;
use crate::tunnel::{PublicUrlProvider, advertised_url};

/// State shared between the poll loop and the execution path.
struct SharedSlot {
    device_enabled: bool,
    current_job: Option<Job>,
    execution: Option<JoinHandle<()>>,
}

impl SharedSlot {
    fn executing(&self) -> bool {
        self.execution.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Everything the background tasks need, built once at startup and passed
/// by reference — no ambient globals.
struct RuntimeContext {
    config: AgentConfig,
    user_id: String,
    client: CoordinatorClient,
    executor: JobExecutor,
    store: Arc<dyn StateStore>,
    url_provider: Arc<dyn PublicUrlProvider>,
    slot: Mutex<SharedSlot>,
}

impl RuntimeContext {
    /// Mirror the in-memory slot to durable state. Persistence failures
    /// are non-fatal — the next successful save catches up.
    async fn persist(&self, slot: &SharedSlot) {
        let state = AgentState {
            user_id: self.user_id.clone(),
            device_enabled: slot.device_enabled,
            current_job: slot.current_job.clone(),
        };
        if let Err(e) = self.store.save(&state).await {
            warn!(error = %e, "Failed to persist agent state");
        }
    }
}

/// The resident agent: owns the current-job slot and the device status.
pub struct AgentRuntime {
    ctx: Arc<RuntimeContext>,
    cancel: CancellationToken,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl AgentRuntime {
    /// Build the runtime from startup state.
    ///
    /// A `current_job` recovered from durable state re-enters the slot, so
    /// the first heartbeat already reports `BUSY` and the job cannot be
    /// lost; execution restarts once the coordinator re-delivers it.
    pub fn new(
        config: AgentConfig,
        initial: AgentState,
        store: Arc<dyn StateStore>,
        url_provider: Arc<dyn PublicUrlProvider>,
    ) -> Self {
        let client = CoordinatorClient::new(&config.api_base_url, config.request_timeout);
        let executor = JobExecutor::new(config.execution_deadline);

        if let Some(job) = &initial.current_job {
            info!(job_id = %job.id, "Recovered unacknowledged job from durable state");
        }

        let ctx = Arc::new(RuntimeContext {
            user_id: initial.user_id,
            client,
            executor,
            store,
            url_provider,
            slot: Mutex::new(SharedSlot {
                device_enabled: initial.device_enabled,
                current_job: initial.current_job,
                execution: None,
            }),
            config,
        });

        Self {
            ctx,
            cancel: CancellationToken::new(),
            poll_task: Mutex::new(None),
        }
    }

    /// Start the periodic cycle. The first heartbeat+poll fires
    /// immediately rather than after the first interval.
    pub async fn start(&self) {
        let ctx = Arc::clone(&self.ctx);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            info!(interval = ?ctx.config.poll_interval, "Agent runtime started");

            // Stateful across ticks so CPU load deltas are meaningful.
            let mut sampler = MetricsSampler::new();
            let mut tick = tokio::time::interval(ctx.config.poll_interval);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Poll loop shutting down");
                        return;
                    }
                    _ = tick.tick() => run_cycle(&ctx, &mut sampler).await,
                }
            }
        });

        *self.poll_task.lock().await = Some(handle);
    }

    /// Halt the periodic cycle, then wait a bounded grace for any
    /// in-flight execution so its result report is not orphaned. If the
    /// grace elapses, shutdown proceeds — the job survives in durable
    /// state and is retried on the next start.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.poll_task.lock().await.take() {
            let _ = handle.await;
        }

        let execution = self.ctx.slot.lock().await.execution.take();
        if let Some(handle) = execution {
            if tokio::time::timeout(self.ctx.config.shutdown_grace, handle)
                .await
                .is_err()
            {
                warn!("Shutdown grace elapsed with a job still executing; it will be retried from durable state");
            }
        }
    }

    /// Flip the operator preference and persist it. The visible status
    /// stays `BUSY` while a job runs; once it completes, status resolves
    /// to whatever the current preference dictates.
    pub async fn set_device_enabled(&self, enabled: bool) {
        let mut slot = self.ctx.slot.lock().await;
        slot.device_enabled = enabled;
        self.ctx.persist(&slot).await;
        info!(enabled, "Device sharing preference updated");
    }

    /// Drop any queued job from memory and durable state. Refused (returns
    /// `false`) while an execution is in flight — dispatched work runs to
    /// completion.
    pub async fn clear_current_job(&self) -> bool {
        let mut slot = self.ctx.slot.lock().await;
        if slot.executing() {
            return false;
        }
        if slot.current_job.take().is_some() {
            self.ctx.persist(&slot).await;
        }
        true
    }

    /// The job currently occupying the slot, if any.
    pub async fn current_job(&self) -> Option<Job> {
        self.ctx.slot.lock().await.current_job.clone()
    }

    /// The status the next heartbeat will report.
    pub async fn status(&self) -> DeviceStatus {
        let slot = self.ctx.slot.lock().await;
        DeviceStatus::resolve(slot.device_enabled, slot.current_job.is_some())
    }
}

/// One tick: sample → heartbeat → poll → dispatch. Metrics publication
/// always precedes the job poll.
async fn run_cycle(ctx: &Arc<RuntimeContext>, sampler: &mut MetricsSampler) {
    let status = {
        let slot = ctx.slot.lock().await;
        DeviceStatus::resolve(slot.device_enabled, slot.current_job.is_some())
    };
    let url = advertised_url(ctx.url_provider.as_ref(), ctx.config.local_port);
    let snapshot = sampler.sample(&ctx.user_id, &url, status);
    ctx.client.publish_metrics(&snapshot).await;

    if ctx.user_id.is_empty() {
        // Not registered yet — nothing to poll for.
        return;
    }

    match ctx.client.poll_for_job(&ctx.user_id).await {
        PollOutcome::Job(job) => dispatch_job(ctx, job).await,
        PollOutcome::NoJob => clear_idle_slot(ctx).await,
        PollOutcome::Unreachable => {
            // Not an authoritative answer — leave the slot alone and try
            // again next cycle.
            debug!("Coordinator unreachable this cycle");
        }
    }
}

/// Record a discovered job and hand it to the execution path — unless one
/// is already active, in which case the discovery is ignored and the
/// existing job keeps the slot.
async fn dispatch_job(ctx: &Arc<RuntimeContext>, job: Job) {
    let mut slot = ctx.slot.lock().await;
    if slot.executing() {
        debug!(job_id = %job.id, "Execution in progress; ignoring discovered job");
        return;
    }

    info!(
        job_id = %job.id,
        filename = %job.filename,
        language = %job.language,
        "Job discovered"
    );
    slot.current_job = Some(job.clone());
    ctx.persist(&slot).await;

    let exec_ctx = Arc::clone(ctx);
    slot.execution = Some(tokio::spawn(async move {
        execute_and_report(&exec_ctx, job).await;
    }));
}

/// The coordinator reports no pending work, so an idle slot empties out.
/// A slot backing a live execution is never cleared here.
async fn clear_idle_slot(ctx: &Arc<RuntimeContext>) {
    let mut slot = ctx.slot.lock().await;
    if slot.executing() {
        return;
    }
    if slot.current_job.take().is_some() {
        debug!("Coordinator reports no pending job; cleared current job");
        ctx.persist(&slot).await;
    }
}

/// The execution path: run the job, report the result, and clear the slot
/// only on an acknowledged report. On a failed report the job stays
/// current so the next delivery retries it (idempotent by job id).
async fn execute_and_report(ctx: &Arc<RuntimeContext>, job: Job) {
    let output = ctx.executor.execute(&job).await;
    let acked = ctx
        .client
        .report_result(&job.id, &output.stdout, &output.stderr)
        .await;

    if acked {
        let mut slot = ctx.slot.lock().await;
        slot.current_job = None;
        ctx.persist(&slot).await;
        info!(job_id = %job.id, "Job result acknowledged; slot cleared");
    } else {
        warn!(job_id = %job.id, "Result report not acknowledged; job stays current for retry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;
    use crate::tunnel::StaticUrl;

    fn sample_job() -> Job {
        serde_json::from_str(r#"{"id":"j1","lang":"python","code":"print(1)","filename":"a.py"}"#)
            .unwrap()
    }

    fn runtime_with(initial: AgentState, store: Arc<MemoryStore>) -> AgentRuntime {
        AgentRuntime::new(
            AgentConfig::default(),
            initial,
            store,
            Arc::new(StaticUrl::new(None)),
        )
    }

    #[tokio::test]
    async fn recovered_job_reports_busy_over_preference() {
        let initial = AgentState {
            user_id: "u1".to_string(),
            device_enabled: false,
            current_job: Some(sample_job()),
        };
        let runtime = runtime_with(initial.clone(), Arc::new(MemoryStore::new(initial)));

        assert_eq!(runtime.status().await, DeviceStatus::Busy);
        assert_eq!(runtime.current_job().await.unwrap().id, "j1");
    }

    #[tokio::test]
    async fn preference_toggle_persists() {
        let store = Arc::new(MemoryStore::default());
        let runtime = runtime_with(AgentState::default(), Arc::clone(&store));
        assert_eq!(runtime.status().await, DeviceStatus::Inactive);

        runtime.set_device_enabled(true).await;
        assert_eq!(runtime.status().await, DeviceStatus::Active);
        assert!(store.load().await.unwrap().device_enabled);

        runtime.set_device_enabled(false).await;
        assert_eq!(runtime.status().await, DeviceStatus::Inactive);
    }

    #[tokio::test]
    async fn clear_current_job_empties_durable_state() {
        let initial = AgentState {
            user_id: "u1".to_string(),
            device_enabled: true,
            current_job: Some(sample_job()),
        };
        let store = Arc::new(MemoryStore::new(initial.clone()));
        let runtime = runtime_with(initial, Arc::clone(&store));

        assert!(runtime.clear_current_job().await);
        assert!(runtime.current_job().await.is_none());
        assert!(store.load().await.unwrap().current_job.is_none());
        assert_eq!(runtime.status().await, DeviceStatus::Active);
    }
}
