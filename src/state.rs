//! Durable agent state behind a single load/save interface.
//!
//! The whole state is a typed struct saved in one shot — no per-field
//! read-modify-write of the backing file, so concurrent mutations cannot
//! lose each other's updates.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StateError;
use crate::job::Job;

/// Everything the agent persists between runs.
///
/// `current_job` is written on discovery and deleted only once the result
/// has been acknowledged by the coordinator, so a crash mid-execution never
/// silently loses a discovered job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Opaque identity assigned at signup. Empty until the operator
    /// registers the device.
    #[serde(default)]
    pub user_id: String,
    /// Operator preference — whether this device accepts work.
    #[serde(default)]
    pub device_enabled: bool,
    /// The single in-flight job, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job: Option<Job>,
}

/// Persistence boundary for [`AgentState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the stored state; a missing store yields the default state.
    async fn load(&self) -> Result<AgentState, StateError>;

    /// Replace the stored state.
    async fn save(&self, state: &AgentState) -> Result<(), StateError>;
}

/// JSON-file backed store — the real collaborator.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<AgentState, StateError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AgentState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &AgentState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state).map_err(StateError::Parse)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral (non-persisting) runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<AgentState>,
}

impl MemoryStore {
    pub fn new(state: AgentState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<AgentState, StateError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, state: &AgentState) -> Result<(), StateError> {
        *self.inner.lock().await = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobLanguage;

    fn sample_job() -> Job {
        serde_json::from_str(r#"{"id":"j1","lang":"python","code":"print(1)","filename":"a.py"}"#)
            .unwrap()
    }

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        let state = store.load().await.unwrap();
        assert_eq!(state, AgentState::default());
        assert!(state.current_job.is_none());
    }

    #[tokio::test]
    async fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/state.json"));

        let state = AgentState {
            user_id: "u1".to_string(),
            device_enabled: true,
            current_job: Some(sample_job()),
        };
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);
        assert_eq!(
            loaded.current_job.unwrap().language,
            JobLanguage::Python
        );
    }

    #[tokio::test]
    async fn clearing_job_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        let mut state = AgentState {
            user_id: "u1".to_string(),
            device_enabled: true,
            current_job: Some(sample_job()),
        };
        store.save(&state).await.unwrap();

        state.current_job = None;
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.current_job.is_none());
        assert_eq!(loaded.user_id, "u1");
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::default();
        let state = AgentState {
            user_id: "u2".to_string(),
            device_enabled: false,
            current_job: None,
        };
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
    }
}
