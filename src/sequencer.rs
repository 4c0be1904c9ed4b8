//! Read-only view of what a pipeline should run next.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::paths::PathResolver;
use crate::store::TaskMetadataStore;
use crate::task::{Step, TaskId};

/// Answer to "what do I run now": the current step with 1-based numbering,
/// or `complete = true` once the task has passed its final step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub step_number: usize,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    pub complete: bool,
}

/// Pure reader over task metadata; never mutates position.
#[derive(Debug, Clone)]
pub struct StepSequencer {
    tasks: TaskMetadataStore,
}

impl StepSequencer {
    pub fn new(paths: PathResolver) -> Self {
        Self {
            tasks: TaskMetadataStore::new(paths),
        }
    }

    pub async fn next_step(&self, task_id: &TaskId) -> Result<NextStep> {
        let task = self.tasks.get(task_id).await?;
        let next = NextStep {
            step_number: task.current_step_index + 1,
            total_steps: task.total_steps(),
            step: task.current_step().cloned(),
            complete: task.is_completed(),
        };
        debug!(
            task_id = %task_id,
            step_number = next.step_number,
            total_steps = next.total_steps,
            complete = next.complete,
            "Resolved next step"
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::StepType;
    use tempfile::TempDir;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    fn plan() -> Vec<Step> {
        vec![
            Step::single(StepType::Plan),
            Step::parallel([StepType::Performance, StepType::Security]),
            Step::single(StepType::Implementation),
        ]
    }

    #[tokio::test]
    async fn fresh_task_points_at_step_one() {
        let dir = TempDir::new().unwrap();
        let paths = PathResolver::with_base(dir.path());
        let tasks = TaskMetadataStore::new(paths.clone());
        let sequencer = StepSequencer::new(paths);
        tasks.create(&id("t1"), plan()).await.unwrap();

        let next = sequencer.next_step(&id("t1")).await.unwrap();

        assert_eq!(next.step_number, 1);
        assert_eq!(next.total_steps, 3);
        assert_eq!(next.step, Some(Step::single(StepType::Plan)));
        assert!(!next.complete);
    }

    #[tokio::test]
    async fn mid_task_exposes_the_parallel_step() {
        let dir = TempDir::new().unwrap();
        let paths = PathResolver::with_base(dir.path());
        let tasks = TaskMetadataStore::new(paths.clone());
        let sequencer = StepSequencer::new(paths);
        tasks.create(&id("t1"), plan()).await.unwrap();

        let mut task = tasks.get(&id("t1")).await.unwrap();
        task.apply_wait_outcome(true);
        tasks.save(&task).await.unwrap();

        let next = sequencer.next_step(&id("t1")).await.unwrap();

        assert_eq!(next.step_number, 2);
        assert_eq!(
            next.step,
            Some(Step::parallel([StepType::Performance, StepType::Security]))
        );
    }

    #[tokio::test]
    async fn completed_task_reports_complete_with_final_numbering() {
        let dir = TempDir::new().unwrap();
        let paths = PathResolver::with_base(dir.path());
        let tasks = TaskMetadataStore::new(paths.clone());
        let sequencer = StepSequencer::new(paths);
        tasks.create(&id("t1"), plan()).await.unwrap();

        let mut task = tasks.get(&id("t1")).await.unwrap();
        task.current_step_index = 2;
        task.apply_wait_outcome(true);
        tasks.save(&task).await.unwrap();

        let next = sequencer.next_step(&id("t1")).await.unwrap();

        assert!(next.complete);
        assert_eq!(next.step_number, 3);
        assert_eq!(next.total_steps, 3);
        assert_eq!(next.step, None);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let dir = TempDir::new().unwrap();
        let sequencer = StepSequencer::new(PathResolver::with_base(dir.path()));

        let err = sequencer.next_step(&id("ghost")).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn serializes_with_camel_case_and_omits_the_step_when_complete() {
        let running = NextStep {
            step_number: 2,
            total_steps: 3,
            step: Some(Step::parallel([StepType::Performance, StepType::Security])),
            complete: false,
        };
        let value = serde_json::to_value(&running).unwrap();
        assert_eq!(value["stepNumber"], 2);
        assert_eq!(value["totalSteps"], 3);
        assert_eq!(value["step"], serde_json::json!(["performance", "security"]));
        assert_eq!(value["complete"], false);

        let done = NextStep {
            step_number: 3,
            total_steps: 3,
            step: None,
            complete: true,
        };
        let value = serde_json::to_value(&done).unwrap();
        assert!(value.get("step").is_none());
        assert_eq!(value["complete"], true);
    }
}
