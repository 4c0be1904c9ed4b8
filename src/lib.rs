// Waymark - file-based coordination for pipelines of short-lived workers
// Tasks carry an ordered step plan; workers publish markdown reports and
// pass/fail signals under a shared directory; waiters block on signals and
// advance or regress the task's position. No server, broker, or database.

pub mod coordinator;
pub mod error;
pub mod paths;
pub mod sequencer;
pub mod store;
pub mod task;
pub mod verdict;
pub mod waiter;

// Re-export key types for easy access
pub use coordinator::Coordinator;
pub use error::{CoordinationError, Result};
pub use paths::{PathResolver, BASE_DIR_ENV, BASE_DIR_NAME};
pub use sequencer::{NextStep, StepSequencer};
pub use store::{
    PositionChange, ReportStore, SignalRecord, SignalStore, TaskMetadata, TaskMetadataStore,
};
pub use task::{SignalStatus, Step, StepType, TaskId};
pub use verdict::{classify, report_sections, Verdict};
pub use waiter::{SignalWaiter, WaitOutcome, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
