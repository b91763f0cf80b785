//! Job descriptor and execution output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interpreter a job runs under.
///
/// The coordinator is free to send languages this agent does not support;
/// they deserialize into `Other` so a single bad job cannot poison the
/// whole poll payload. The executor rejects them with a synthetic stderr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobLanguage {
    Python,
    Javascript,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for JobLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Javascript => write!(f, "javascript"),
            Self::Other(lang) => write!(f, "{lang}"),
        }
    }
}

/// The unit of remote work, as delivered by `GET /check-for-jobs`.
///
/// Wire shape: `{ "id": ..., "lang": ..., "code": ..., "filename": ... }`.
/// `discovered_at` is not part of the wire payload — it is stamped when the
/// poll first sees the job and carried along in durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(rename = "lang")]
    pub language: JobLanguage,
    #[serde(rename = "code")]
    pub source: String,
    pub filename: String,
    #[serde(default = "Utc::now")]
    pub discovered_at: DateTime<Utc>,
}

/// Captured output of one job execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    pub stdout: String,
    pub stderr: String,
}

impl JobOutput {
    /// An empty stdout paired with a synthetic error line.
    pub fn stderr_only(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
        }
    }
}
