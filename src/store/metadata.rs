//! Task metadata: the step plan and the position a pipeline moves through.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{CoordinationError, Result};
use crate::paths::PathResolver;
use crate::task::{Step, TaskId};

use super::write_atomic;

/// The persistent record for one task.
///
/// Field names serialize in camelCase so every process reading
/// `metadata.json` sees the same wire shape regardless of language.
/// Invariants: the plan is non-empty and `current_step_index` stays in
/// `0..execution_steps.len()` even after completion (`completed_at` marks
/// the terminal state; the index keeps pointing at the final step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub task_id: TaskId,
    pub execution_steps: Vec<Step>,
    pub current_step_index: usize,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// What a signal-wait did to the task's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    /// All signals passed on a non-final step; the index moved forward.
    Advanced { to: usize },
    /// All signals passed on the final step; `completed_at` is now set.
    Completed,
    /// At least one signal failed; the index moved back, floored at zero.
    Regressed { to: usize },
    /// The task was already complete. Terminal states do not move.
    AlreadyComplete,
}

impl TaskMetadata {
    pub fn new(task_id: TaskId, execution_steps: Vec<Step>) -> Self {
        let now = Utc::now();
        TaskMetadata {
            task_id,
            execution_steps,
            current_step_index: 0,
            started_at: now,
            saved_at: now,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn total_steps(&self) -> usize {
        self.execution_steps.len()
    }

    /// The step at the current position, or `None` once the task completes.
    pub fn current_step(&self) -> Option<&Step> {
        if self.is_completed() {
            None
        } else {
            self.execution_steps.get(self.current_step_index)
        }
    }

    /// Apply one wait outcome to the position. Pure state transition; the
    /// caller decides whether to persist the result.
    ///
    /// A failure regresses the whole step by one index even when only one
    /// member of a parallel step failed.
    pub fn apply_wait_outcome(&mut self, all_passed: bool) -> PositionChange {
        if self.is_completed() {
            return PositionChange::AlreadyComplete;
        }
        let now = Utc::now();
        let change = if all_passed {
            if self.current_step_index + 1 >= self.execution_steps.len() {
                self.completed_at = Some(now);
                PositionChange::Completed
            } else {
                self.current_step_index += 1;
                PositionChange::Advanced {
                    to: self.current_step_index,
                }
            }
        } else {
            self.current_step_index = self.current_step_index.saturating_sub(1);
            PositionChange::Regressed {
                to: self.current_step_index,
            }
        };
        self.saved_at = now;
        change
    }

    fn check_invariants(&self, path: &Path) -> Result<()> {
        let corrupt = |reason: String| CoordinationError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        if self.execution_steps.is_empty() {
            return Err(corrupt("empty execution plan".to_string()));
        }
        for step in &self.execution_steps {
            step.validate().map_err(|e| corrupt(e.to_string()))?;
        }
        if self.current_step_index >= self.execution_steps.len() {
            return Err(corrupt(format!(
                "step index {} out of range for a {}-step plan",
                self.current_step_index,
                self.execution_steps.len()
            )));
        }
        Ok(())
    }
}

/// Creates and reads task metadata under the resolved base directory.
#[derive(Debug, Clone)]
pub struct TaskMetadataStore {
    paths: PathResolver,
}

impl TaskMetadataStore {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    /// Register a new task with the given plan at position zero.
    ///
    /// Validates the plan before touching disk and refuses to clobber an
    /// existing task. Use [`create_or_replace`](Self::create_or_replace) to
    /// restart a pipeline under the same id.
    pub async fn create(&self, task_id: &TaskId, steps: Vec<Step>) -> Result<PathBuf> {
        let path = self.paths.metadata_path(task_id)?;
        if path.exists() {
            return Err(CoordinationError::AlreadyExists {
                task_id: task_id.clone(),
                path,
            });
        }
        self.write_new(task_id, steps).await
    }

    /// Like [`create`](Self::create), but overwrites any existing metadata,
    /// resetting the position to zero. Reports and signals under the task
    /// directory are left in place.
    pub async fn create_or_replace(&self, task_id: &TaskId, steps: Vec<Step>) -> Result<PathBuf> {
        let path = self.paths.metadata_path(task_id)?;
        if path.exists() {
            info!(task_id = %task_id, "Replacing existing task metadata");
        }
        self.write_new(task_id, steps).await
    }

    async fn write_new(&self, task_id: &TaskId, steps: Vec<Step>) -> Result<PathBuf> {
        validate_plan(&steps)?;

        // Lay out reports/ and signals/ up front so workers can rely on the
        // directories existing once the task does.
        for dir in [self.paths.reports_dir(task_id)?, self.paths.signals_dir(task_id)?] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| CoordinationError::io(&dir, e))?;
        }

        let metadata = TaskMetadata::new(task_id.clone(), steps);
        let path = self.save(&metadata).await?;
        info!(
            task_id = %task_id,
            steps = metadata.total_steps(),
            path = %path.display(),
            "Task created"
        );
        Ok(path)
    }

    /// Read and parse the task's metadata, checking structural invariants.
    pub async fn get(&self, task_id: &TaskId) -> Result<TaskMetadata> {
        let path = self.paths.metadata_path(task_id)?;
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoordinationError::NotFound {
                    task_id: task_id.clone(),
                    artifact: "metadata".to_string(),
                    path,
                });
            }
            Err(e) => return Err(CoordinationError::io(&path, e)),
        };
        let metadata: TaskMetadata =
            serde_json::from_str(&contents).map_err(|e| CoordinationError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        metadata.check_invariants(&path)?;
        Ok(metadata)
    }

    /// Persist `metadata` atomically, overwriting the previous revision.
    /// Concurrent savers resolve last-write-wins.
    pub async fn save(&self, metadata: &TaskMetadata) -> Result<PathBuf> {
        let path = self.paths.metadata_path(&metadata.task_id)?;
        let serialized =
            serde_json::to_string_pretty(metadata).map_err(|e| CoordinationError::Corrupt {
                path: path.clone(),
                reason: format!("serialize: {e}"),
            })?;
        write_atomic(&path, &serialized).await?;
        debug!(
            task_id = %metadata.task_id,
            step_index = metadata.current_step_index,
            completed = metadata.is_completed(),
            "Task metadata saved"
        );
        Ok(path)
    }
}

fn validate_plan(steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(CoordinationError::validation(
            "execution plan must contain at least one step",
        ));
    }
    for step in steps {
        step.validate()?;
    }
    Ok(())
}
