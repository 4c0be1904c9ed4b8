//! Durable task state on the filesystem.
//!
//! Three stores share one directory layout: task metadata, markdown
//! reports, and pass/fail signals. Reports and signals do not require the
//! task's metadata to exist, so workers and reviewers can publish before
//! (or without) anyone registering the task.
//!
//! There is no locking. Every write goes through [`write_atomic`], so
//! readers observe either the old document or the new one, and concurrent
//! writers resolve last-write-wins. Callers that lose a race simply save
//! again.

mod metadata;
mod reports;
mod signals;

pub use metadata::{PositionChange, TaskMetadata, TaskMetadataStore};
pub use reports::ReportStore;
pub use signals::{SignalRecord, SignalStore};

use std::path::Path;

use tokio::fs;

use crate::error::{CoordinationError, Result};

/// Write `contents` to `path` via a sibling temp file and rename, creating
/// parent directories as needed. Readers never observe a partial document.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CoordinationError::io(parent, e))?;
    }
    let temp = format!("{}.tmp", path.display());
    fs::write(&temp, contents)
        .await
        .map_err(|e| CoordinationError::io(&temp, e))?;
    fs::rename(&temp, path)
        .await
        .map_err(|e| CoordinationError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("doc.json");

        write_atomic(&path, "{}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");

        write_atomic(&path, "old").await.unwrap();
        write_atomic(&path, "new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
