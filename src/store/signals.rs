//! Pass/fail signals: the verdicts the state machine runs on.
//!
//! One JSON file per signal type under `signals/`. Saving overwrites any
//! prior verdict for that type, which is the system's retry mechanism: a
//! reviewer that re-runs a failed step simply signals again. Like reports,
//! signals do not require task metadata to exist.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::{CoordinationError, Result};
use crate::paths::PathResolver;
use crate::task::{SignalStatus, StepType, TaskId};

use super::write_atomic;

/// One persisted verdict. Readers tolerate extra JSON fields, since hook
/// scripts attach auxiliary detail alongside the required three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub status: SignalStatus,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl SignalRecord {
    pub fn new(status: SignalStatus, summary: impl Into<String>) -> Self {
        SignalRecord {
            status,
            summary: summary.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalStore {
    paths: PathResolver,
}

impl SignalStore {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    /// Record a verdict for `signal_type`, overwriting any prior one.
    pub async fn save(
        &self,
        task_id: &TaskId,
        signal_type: StepType,
        status: SignalStatus,
        summary: &str,
    ) -> Result<PathBuf> {
        let record = SignalRecord::new(status, summary);
        let path = self.paths.signal_path(task_id, signal_type)?;
        let serialized =
            serde_json::to_string_pretty(&record).map_err(|e| CoordinationError::Corrupt {
                path: path.clone(),
                reason: format!("serialize: {e}"),
            })?;
        write_atomic(&path, &serialized).await?;
        info!(
            task_id = %task_id,
            signal_type = %signal_type,
            status = %status,
            "Signal saved"
        );
        Ok(path)
    }

    pub async fn get(&self, task_id: &TaskId, signal_type: StepType) -> Result<SignalRecord> {
        let path = self.paths.signal_path(task_id, signal_type)?;
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoordinationError::NotFound {
                    task_id: task_id.clone(),
                    artifact: format!("{signal_type} signal"),
                    path,
                });
            }
            Err(e) => return Err(CoordinationError::io(&path, e)),
        };
        serde_json::from_str(&contents).map_err(|e| CoordinationError::Corrupt {
            path,
            reason: e.to_string(),
        })
    }

    /// Whether a verdict file exists for `signal_type`. The waiter's poll
    /// predicate; presence only, the record is read later during aggregation.
    pub fn exists(&self, task_id: &TaskId, signal_type: StepType) -> Result<bool> {
        Ok(self.paths.signal_path(task_id, signal_type)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SignalStore {
        SignalStore::new(PathResolver::with_base(dir.path()))
    }

    #[tokio::test]
    async fn saves_and_reads_a_verdict() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id: TaskId = "t1".parse().unwrap();

        let path = store
            .save(&id, StepType::Plan, SignalStatus::Passed, "looks good")
            .await
            .unwrap();
        let record = store.get(&id, StepType::Plan).await.unwrap();

        assert_eq!(path, dir.path().join("t1").join("signals").join("plan.json"));
        assert_eq!(record.status, SignalStatus::Passed);
        assert_eq!(record.summary, "looks good");
    }

    #[tokio::test]
    async fn saving_again_replaces_the_verdict() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id: TaskId = "t1".parse().unwrap();

        store
            .save(&id, StepType::Security, SignalStatus::Failed, "CVE found")
            .await
            .unwrap();
        store
            .save(&id, StepType::Security, SignalStatus::Passed, "patched")
            .await
            .unwrap();

        let record = store.get(&id, StepType::Security).await.unwrap();
        assert_eq!(record.status, SignalStatus::Passed);
        assert_eq!(record.summary, "patched");
    }

    #[tokio::test]
    async fn exists_tracks_the_signal_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id: TaskId = "t1".parse().unwrap();

        assert!(!store.exists(&id, StepType::Plan).unwrap());
        store
            .save(&id, StepType::Plan, SignalStatus::Passed, "ok")
            .await
            .unwrap();
        assert!(store.exists(&id, StepType::Plan).unwrap());
        assert!(!store.exists(&id, StepType::Security).unwrap());
    }

    #[tokio::test]
    async fn missing_signal_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id: TaskId = "t1".parse().unwrap();

        let err = store.get(&id, StepType::CodeReview).await.unwrap_err();

        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("code-review signal"));
    }

    #[tokio::test]
    async fn extra_fields_from_hooks_are_tolerated() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id: TaskId = "t1".parse().unwrap();

        let signals_dir = dir.path().join("t1").join("signals");
        std::fs::create_dir_all(&signals_dir).unwrap();
        std::fs::write(
            signals_dir.join("plan.json"),
            r#"{"status":"failed","summary":"ERROR: boom","timestamp":"2025-01-01T00:00:00Z","session":"abc123"}"#,
        )
        .unwrap();

        let record = store.get(&id, StepType::Plan).await.unwrap();
        assert_eq!(record.status, SignalStatus::Failed);
    }

    #[tokio::test]
    async fn record_without_a_timestamp_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id: TaskId = "t1".parse().unwrap();

        let signals_dir = dir.path().join("t1").join("signals");
        std::fs::create_dir_all(&signals_dir).unwrap();
        std::fs::write(
            signals_dir.join("plan.json"),
            r#"{"status":"passed","summary":"ok"}"#,
        )
        .unwrap();

        assert_eq!(store.get(&id, StepType::Plan).await.unwrap_err().kind(), "corrupt");
    }

    #[test]
    fn wire_shape_uses_lowercase_status() {
        let record = SignalRecord::new(SignalStatus::Passed, "done");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], "passed");
        assert!(value["timestamp"].is_string());
    }
}
