//! Markdown reports: detailed per-step worker output.
//!
//! Reports are documentation for humans and downstream workers. The state
//! machine never reads them, and saving one does not require the task's
//! metadata to exist.

use std::path::PathBuf;

use tokio::fs;
use tracing::info;

use crate::error::{CoordinationError, Result};
use crate::paths::PathResolver;
use crate::task::{StepType, TaskId};

use super::write_atomic;

#[derive(Debug, Clone)]
pub struct ReportStore {
    paths: PathResolver,
}

impl ReportStore {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    /// Write `content` verbatim to `reports/{type}.md`, creating directories
    /// as needed and overwriting any prior report of the same type.
    pub async fn save(
        &self,
        task_id: &TaskId,
        report_type: StepType,
        content: &str,
    ) -> Result<PathBuf> {
        let path = self.paths.report_path(task_id, report_type)?;
        write_atomic(&path, content).await?;
        info!(
            task_id = %task_id,
            report_type = %report_type,
            bytes = content.len(),
            "Report saved"
        );
        Ok(path)
    }

    /// The raw report content, exactly as saved.
    pub async fn get(&self, task_id: &TaskId, report_type: StepType) -> Result<String> {
        let path = self.paths.report_path(task_id, report_type)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoordinationError::NotFound {
                    task_id: task_id.clone(),
                    artifact: format!("{report_type} report"),
                    path,
                })
            }
            Err(e) => Err(CoordinationError::io(&path, e)),
        }
    }
}
