//! String-boundary facade over the stores, waiter, and sequencer.
//!
//! Task ids arrive from prompts, environment variables, and shell
//! arguments, so the facade takes `&str` and validates once; everything
//! past this boundary works with the typed [`TaskId`].

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::paths::PathResolver;
use crate::sequencer::{NextStep, StepSequencer};
use crate::store::{ReportStore, SignalStore, TaskMetadata, TaskMetadataStore};
use crate::task::{SignalStatus, Step, StepType, TaskId};
use crate::verdict::{self, Verdict};
use crate::waiter::{SignalWaiter, WaitOutcome};

/// One handle over every coordination operation, sharing a single base
/// directory resolution.
#[derive(Debug, Clone)]
pub struct Coordinator {
    tasks: TaskMetadataStore,
    reports: ReportStore,
    signals: SignalStore,
    waiter: SignalWaiter,
    sequencer: StepSequencer,
}

impl Coordinator {
    /// Coordinator over the default base directory (environment override,
    /// then git root, then the working directory).
    pub fn new() -> Self {
        Self::with_resolver(PathResolver::new())
    }

    /// Coordinator pinned to an explicit base directory.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self::with_resolver(PathResolver::with_base(base))
    }

    pub fn with_resolver(paths: PathResolver) -> Self {
        Self {
            tasks: TaskMetadataStore::new(paths.clone()),
            reports: ReportStore::new(paths.clone()),
            signals: SignalStore::new(paths.clone()),
            waiter: SignalWaiter::new(paths.clone()),
            sequencer: StepSequencer::new(paths),
        }
    }

    /// Shrink the waiter's poll interval, mainly for tests.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.waiter = self.waiter.with_poll_interval(poll_interval);
        self
    }

    pub async fn create_task(&self, task_id: &str, steps: &[Step]) -> Result<PathBuf> {
        let task_id: TaskId = task_id.parse()?;
        self.tasks.create(&task_id, steps.to_vec()).await
    }

    /// Restart a pipeline under an existing id, resetting its position.
    pub async fn create_or_replace_task(&self, task_id: &str, steps: &[Step]) -> Result<PathBuf> {
        let task_id: TaskId = task_id.parse()?;
        self.tasks.create_or_replace(&task_id, steps.to_vec()).await
    }

    pub async fn task(&self, task_id: &str) -> Result<TaskMetadata> {
        self.tasks.get(&task_id.parse()?).await
    }

    pub async fn save_report(
        &self,
        task_id: &str,
        report_type: StepType,
        content: &str,
    ) -> Result<PathBuf> {
        self.reports.save(&task_id.parse()?, report_type, content).await
    }

    pub async fn report(&self, task_id: &str, report_type: StepType) -> Result<String> {
        self.reports.get(&task_id.parse()?, report_type).await
    }

    pub async fn save_signal(
        &self,
        task_id: &str,
        signal_type: StepType,
        status: SignalStatus,
        summary: &str,
    ) -> Result<PathBuf> {
        self.signals
            .save(&task_id.parse()?, signal_type, status, summary)
            .await
    }

    /// Block until the step's signals arrive, then advance or regress the
    /// task. See [`SignalWaiter::wait`].
    pub async fn wait_for_signals(
        &self,
        task_id: &str,
        signal_types: &[StepType],
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        self.waiter.wait(&task_id.parse()?, signal_types, timeout).await
    }

    pub async fn next_step(&self, task_id: &str) -> Result<NextStep> {
        self.sequencer.next_step(&task_id.parse()?).await
    }

    /// Derive and persist artifacts for a worker that exited without
    /// saving its signal.
    ///
    /// When a signal for `step_type` already exists this does nothing and
    /// returns `None`. Otherwise the output's markdown body (if any) is
    /// saved as the step's report, the classified verdict is saved as its
    /// signal, and the verdict is returned.
    pub async fn backfill(
        &self,
        task_id: &str,
        step_type: StepType,
        output: &str,
    ) -> Result<Option<Verdict>> {
        let task_id: TaskId = task_id.parse()?;
        if self.signals.exists(&task_id, step_type)? {
            debug!(task_id = %task_id, signal_type = %step_type, "Signal already saved; nothing to backfill");
            return Ok(None);
        }

        let sections = verdict::report_sections(output);
        if !sections.is_empty() {
            self.reports.save(&task_id, step_type, &sections).await?;
        }

        let verdict = verdict::classify(output);
        self.signals
            .save(&task_id, step_type, verdict.status, &verdict.summary)
            .await?;
        info!(
            task_id = %task_id,
            signal_type = %step_type,
            status = %verdict.status,
            "Backfilled signal from worker output"
        );
        Ok(Some(verdict))
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
