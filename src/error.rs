//! Error types for DevShare.

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Execution error: {0}")]
    Executor(#[from] ExecutorError),
}

/// Durable-state persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse state file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Job execution failures.
///
/// These never escape the executor — it converts them into a synthetic
/// stderr message — but the conversion points are typed so the message
/// always names what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("could not create scratch directory: {0}")]
    Scratch(std::io::Error),

    #[error("could not write source file: {0}")]
    WriteSource(std::io::Error),

    #[error("could not spawn {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        source: std::io::Error,
    },

    #[error("failed waiting on child process: {0}")]
    Wait(std::io::Error),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
