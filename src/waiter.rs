//! Blocking rendezvous on signal files, and the position update that
//! follows.
//!
//! This is the system's only synchronization primitive. A coordinator calls
//! [`SignalWaiter::wait`] with the current step's signal types; the waiter
//! polls for the verdict files, aggregates pass/fail once all are present,
//! and moves the task's position. Polling is the sole retry mechanism in
//! the crate. It retries "has the verdict arrived yet", never the
//! underlying work.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::error::{CoordinationError, Result};
use crate::paths::PathResolver;
use crate::store::{PositionChange, SignalRecord, SignalStore, TaskMetadataStore};
use crate::task::{StepType, TaskId};

/// How long `wait` blocks before giving up when the caller does not say.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed delay between existence checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What a completed wait observed: every required verdict, in request
/// order, plus the wall-clock time spent blocked.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub signals: Vec<SignalRecord>,
    pub waited: Duration,
}

impl WaitOutcome {
    pub fn all_passed(&self) -> bool {
        self.signals.iter().all(|s| s.status.is_passed())
    }

    pub fn waited_ms(&self) -> u128 {
        self.waited.as_millis()
    }
}

/// Polls for a step's signal files, then advances or regresses the task.
#[derive(Debug, Clone)]
pub struct SignalWaiter {
    signals: SignalStore,
    tasks: TaskMetadataStore,
    poll_interval: Duration,
}

impl SignalWaiter {
    pub fn new(paths: PathResolver) -> Self {
        Self {
            signals: SignalStore::new(paths.clone()),
            tasks: TaskMetadataStore::new(paths),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Shrink the poll interval. Tests drive this; production callers keep
    /// the default.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Block until every type in `signal_types` has a verdict on disk, or
    /// `timeout` elapses.
    ///
    /// `signal_types` is one logical step: a single type for a sequential
    /// step, several for a parallel fan-in. Once all verdicts are present
    /// they are read in request order. If every status is `passed` the
    /// task advances (or completes on its final step); any failure
    /// regresses it one step, floored at zero. A wait for a task id with
    /// no metadata still succeeds and simply skips the position update, so
    /// processes can rendezvous on signals alone.
    ///
    /// The existence check runs before the first sleep; a wait whose
    /// signals are already on disk returns without suspending.
    pub async fn wait(
        &self,
        task_id: &TaskId,
        signal_types: &[StepType],
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        validate_signal_set(signal_types)?;

        let start = Instant::now();
        loop {
            let missing = self.missing_signals(task_id, signal_types)?;
            if missing.is_empty() {
                break;
            }
            let waited = start.elapsed();
            if waited >= timeout {
                warn!(
                    task_id = %task_id,
                    missing = ?missing,
                    waited_secs = waited.as_secs(),
                    "Timed out waiting for signals"
                );
                return Err(CoordinationError::Timeout {
                    task_id: task_id.clone(),
                    missing,
                    waited,
                });
            }
            debug!(task_id = %task_id, missing = ?missing, "Signals not ready yet");
            time::sleep(self.poll_interval).await;
        }

        let mut signals = Vec::with_capacity(signal_types.len());
        for &signal_type in signal_types {
            signals.push(self.signals.get(task_id, signal_type).await?);
        }
        let all_passed = signals.iter().all(|s| s.status.is_passed());
        self.update_position(task_id, all_passed).await?;

        let outcome = WaitOutcome {
            signals,
            waited: start.elapsed(),
        };
        info!(
            task_id = %task_id,
            signals = outcome.signals.len(),
            all_passed,
            waited_ms = outcome.waited_ms() as u64,
            "Signals collected"
        );
        Ok(outcome)
    }

    fn missing_signals(&self, task_id: &TaskId, signal_types: &[StepType]) -> Result<Vec<StepType>> {
        let mut missing = Vec::new();
        for &signal_type in signal_types {
            if !self.signals.exists(task_id, signal_type)? {
                missing.push(signal_type);
            }
        }
        Ok(missing)
    }

    /// Read-modify-write of the task position. Absent metadata is fine;
    /// a completed task is terminal and left untouched.
    async fn update_position(&self, task_id: &TaskId, all_passed: bool) -> Result<()> {
        let mut task = match self.tasks.get(task_id).await {
            Ok(task) => task,
            Err(CoordinationError::NotFound { .. }) => {
                debug!(task_id = %task_id, "No task metadata; skipping position update");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match task.apply_wait_outcome(all_passed) {
            PositionChange::AlreadyComplete => {
                debug!(task_id = %task_id, "Task already complete; position unchanged");
            }
            change => {
                self.tasks.save(&task).await?;
                info!(
                    task_id = %task_id,
                    change = ?change,
                    step_index = task.current_step_index,
                    "Task position updated"
                );
            }
        }
        Ok(())
    }
}

fn validate_signal_set(signal_types: &[StepType]) -> Result<()> {
    if signal_types.is_empty() {
        return Err(CoordinationError::validation(
            "wait requires at least one signal type",
        ));
    }
    for (i, signal_type) in signal_types.iter().enumerate() {
        if signal_types[..i].contains(signal_type) {
            return Err(CoordinationError::validation(format!(
                "wait set repeats signal type '{signal_type}'"
            )));
        }
    }
    Ok(())
}
