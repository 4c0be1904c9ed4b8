//! Base-directory resolution and the on-disk layout.
//!
//! Every piece of task state lives under one base directory:
//!
//! ```text
//! {base}/{taskId}/metadata.json
//! {base}/{taskId}/reports/{type}.md
//! {base}/{taskId}/signals/{type}.json
//! ```
//!
//! Callers are independent, short-lived processes that may start from
//! different working directories, so the base is recomputed on every call
//! rather than cached.

use std::env;
use std::path::{Path, PathBuf};

use git2::Repository;

use crate::error::{CoordinationError, Result};
use crate::task::{StepType, TaskId};

/// Environment override for the base directory. Takes effect when set and
/// non-empty, letting unrelated processes agree on one location without
/// argument plumbing.
pub const BASE_DIR_ENV: &str = "TASK_REPORTS_BASE";

/// Directory created under the repository root (or working directory) when
/// no explicit base is configured.
pub const BASE_DIR_NAME: &str = ".task-reports";

const METADATA_FILE: &str = "metadata.json";
const REPORTS_DIR: &str = "reports";
const SIGNALS_DIR: &str = "signals";

/// Resolves the directory all task state lives under.
///
/// Precedence, highest first: an explicit override given at construction,
/// the [`BASE_DIR_ENV`] environment variable, the enclosing git repository's
/// work directory joined with [`BASE_DIR_NAME`], and finally the current
/// working directory joined with [`BASE_DIR_NAME`].
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    override_base: Option<PathBuf>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the base directory, bypassing environment and repository
    /// detection. Relative paths are anchored at the current working
    /// directory at resolve time.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        PathResolver {
            override_base: Some(base.into()),
        }
    }

    /// The absolute base directory, recomputed on every call.
    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(base) = &self.override_base {
            return absolute(base.clone());
        }
        if let Ok(base) = env::var(BASE_DIR_ENV) {
            if !base.trim().is_empty() {
                return absolute(PathBuf::from(base));
            }
        }
        let cwd = current_dir()?;
        Ok(Self::default_base_for(&cwd))
    }

    /// Default base for a process running in `dir`: the enclosing git work
    /// directory when there is one, otherwise `dir` itself.
    fn default_base_for(dir: &Path) -> PathBuf {
        let root = Repository::discover(dir)
            .ok()
            .and_then(|repo| repo.workdir().map(Path::to_path_buf))
            .unwrap_or_else(|| dir.to_path_buf());
        root.join(BASE_DIR_NAME)
    }

    pub fn task_dir(&self, task_id: &TaskId) -> Result<PathBuf> {
        Ok(self.resolve()?.join(task_id.as_str()))
    }

    pub fn metadata_path(&self, task_id: &TaskId) -> Result<PathBuf> {
        Ok(self.task_dir(task_id)?.join(METADATA_FILE))
    }

    pub fn reports_dir(&self, task_id: &TaskId) -> Result<PathBuf> {
        Ok(self.task_dir(task_id)?.join(REPORTS_DIR))
    }

    pub fn report_path(&self, task_id: &TaskId, report_type: StepType) -> Result<PathBuf> {
        Ok(self
            .reports_dir(task_id)?
            .join(format!("{}.md", report_type.as_str())))
    }

    pub fn signals_dir(&self, task_id: &TaskId) -> Result<PathBuf> {
        Ok(self.task_dir(task_id)?.join(SIGNALS_DIR))
    }

    pub fn signal_path(&self, task_id: &TaskId, signal_type: StepType) -> Result<PathBuf> {
        Ok(self
            .signals_dir(task_id)?
            .join(format!("{}.json", signal_type.as_str())))
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(current_dir()?.join(path))
    }
}

fn current_dir() -> Result<PathBuf> {
    env::current_dir().map_err(|e| CoordinationError::io(".", e))
}
