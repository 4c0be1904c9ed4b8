//! Error taxonomy shared by every waymark operation.
//!
//! Each variant carries the task id, artifact, file path, or elapsed time a
//! caller needs to act on the failure without re-deriving context. The only
//! built-in retry in the crate is the signal waiter's poll loop; everything
//! else surfaces here on the first failure.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::task::{StepType, TaskId};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Errors that can occur while coordinating task state on the shared
/// filesystem.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// Malformed input rejected before any disk access.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// A read targeted metadata, a report, or a signal that does not exist.
    #[error("no {artifact} found for task '{task_id}' at {}", .path.display())]
    NotFound {
        task_id: TaskId,
        artifact: String,
        path: PathBuf,
    },

    /// `create` refused to clobber existing task metadata.
    #[error("task '{task_id}' already exists at {}", .path.display())]
    AlreadyExists { task_id: TaskId, path: PathBuf },

    /// A state file exists but cannot be parsed, or violates invariants.
    #[error("corrupt state file at {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The waiter's deadline expired with signals still missing.
    #[error(
        "timed out after {}s waiting on task '{task_id}': still missing [{}]",
        .waited.as_secs(),
        join_step_types(.missing)
    )]
    Timeout {
        task_id: TaskId,
        missing: Vec<StepType>,
        waited: Duration,
    },

    /// Filesystem failure other than plain absence.
    #[error("I/O failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoordinationError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        CoordinationError::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoordinationError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable category for this error, for callers that map
    /// outcomes to exit codes or wire payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinationError::Validation { .. } => "validation",
            CoordinationError::NotFound { .. } => "not_found",
            CoordinationError::AlreadyExists { .. } => "already_exists",
            CoordinationError::Corrupt { .. } => "corrupt",
            CoordinationError::Timeout { .. } => "timeout",
            CoordinationError::Io { .. } => "io",
        }
    }
}

fn join_step_types(types: &[StepType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
