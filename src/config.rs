//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration.
///
/// The defaults are the production cadence; tests shrink the intervals.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Coordinator base URL.
    pub api_base_url: String,
    /// Heartbeat + job-poll cadence.
    pub poll_interval: Duration,
    /// Per-request timeout for coordinator calls.
    pub request_timeout: Duration,
    /// Wall-clock deadline for one job execution.
    pub execution_deadline: Duration,
    /// How long `stop()` waits for an in-flight execution before giving up.
    pub shutdown_grace: Duration,
    /// Local listener port the tunnel forwards to; used for the fallback
    /// advertised URL when no tunnel is up.
    pub local_port: u16,
    /// Where durable agent state lives.
    pub state_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8787".to_string(),
            poll_interval: Duration::from_secs(20),
            request_timeout: Duration::from_secs(5),
            execution_deadline: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            local_port: 9000,
            state_path: PathBuf::from("./data/agent-state.json"),
        }
    }
}
