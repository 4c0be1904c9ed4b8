//! Task identity and the step vocabulary.
//!
//! Everything that crosses a file boundary is typed here once: task ids that
//! become directory names, the closed set of step types, the single/parallel
//! step shape, and the pass/fail signal status. Parsing these at the edge
//! means the stores never re-check strings ad hoc.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoordinationError, Result};

/// Longest accepted task id, in bytes. Ids become directory names and have
/// no business approaching filesystem limits.
const MAX_TASK_ID_LEN: usize = 128;

/// Caller-chosen identifier for one pipeline execution.
///
/// Ids are used verbatim as directory names, so construction rejects
/// anything that could escape the base directory or confuse a path:
/// only `[A-Za-z0-9._-]` is accepted, and `.` / `..` are refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoordinationError::validation("task id must not be empty"));
        }
        if id.len() > MAX_TASK_ID_LEN {
            return Err(CoordinationError::validation(format!(
                "task id exceeds {MAX_TASK_ID_LEN} bytes: '{id}'"
            )));
        }
        if id == "." || id == ".." {
            return Err(CoordinationError::validation(format!(
                "task id '{id}' is not a usable directory name"
            )));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(CoordinationError::validation(format!(
                "task id '{id}' contains unsupported character '{bad}' \
                 (allowed: letters, digits, '-', '_', '.')"
            )));
        }
        Ok(TaskId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TaskId {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self> {
        TaskId::new(s)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        TaskId::new(raw).map_err(serde::de::Error::custom)
    }
}

/// The closed vocabulary of pipeline step types.
///
/// Report and signal files are named after these, so the wire form is the
/// kebab-case string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepType {
    Requirements,
    CodebaseAnalysis,
    Plan,
    TestsDesign,
    TestsReview,
    Implementation,
    Stabilization,
    Acceptance,
    Performance,
    Security,
    Refactoring,
    CodeReview,
    Documentation,
    Finalize,
}

impl StepType {
    pub const ALL: [StepType; 14] = [
        StepType::Requirements,
        StepType::CodebaseAnalysis,
        StepType::Plan,
        StepType::TestsDesign,
        StepType::TestsReview,
        StepType::Implementation,
        StepType::Stabilization,
        StepType::Acceptance,
        StepType::Performance,
        StepType::Security,
        StepType::Refactoring,
        StepType::CodeReview,
        StepType::Documentation,
        StepType::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Requirements => "requirements",
            StepType::CodebaseAnalysis => "codebase-analysis",
            StepType::Plan => "plan",
            StepType::TestsDesign => "tests-design",
            StepType::TestsReview => "tests-review",
            StepType::Implementation => "implementation",
            StepType::Stabilization => "stabilization",
            StepType::Acceptance => "acceptance",
            StepType::Performance => "performance",
            StepType::Security => "security",
            StepType::Refactoring => "refactoring",
            StepType::CodeReview => "code-review",
            StepType::Documentation => "documentation",
            StepType::Finalize => "finalize",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self> {
        StepType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                CoordinationError::validation(format!("unrecognized step type '{s}'"))
            })
    }
}

/// One unit of pipeline progress: a single step type, or a set of types that
/// all must signal before the task may advance (fan-out requiring fan-in).
///
/// Serializes as a bare string for the sequential case and an array of
/// strings for the parallel case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Single(StepType),
    Parallel(Vec<StepType>),
}

impl Step {
    pub fn single(step_type: StepType) -> Self {
        Step::Single(step_type)
    }

    pub fn parallel(step_types: impl IntoIterator<Item = StepType>) -> Self {
        Step::Parallel(step_types.into_iter().collect())
    }

    /// The signal types this step requires before the task may advance.
    pub fn signal_types(&self) -> &[StepType] {
        match self {
            Step::Single(step_type) => std::slice::from_ref(step_type),
            Step::Parallel(step_types) => step_types,
        }
    }

    /// Structural validity: a parallel step is a non-empty set.
    pub fn validate(&self) -> Result<()> {
        let Step::Parallel(step_types) = self else {
            return Ok(());
        };
        if step_types.is_empty() {
            return Err(CoordinationError::validation(
                "parallel step must name at least one step type",
            ));
        }
        for (i, step_type) in step_types.iter().enumerate() {
            if step_types[..i].contains(step_type) {
                return Err(CoordinationError::validation(format!(
                    "parallel step repeats step type '{step_type}'"
                )));
            }
        }
        Ok(())
    }
}

impl From<StepType> for Step {
    fn from(step_type: StepType) -> Self {
        Step::Single(step_type)
    }
}

/// Terminal pass/fail verdict for one step type within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Passed,
    Failed,
}

impl SignalStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, SignalStatus::Passed)
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalStatus::Passed => "passed",
            SignalStatus::Failed => "failed",
        })
    }
}

impl FromStr for SignalStatus {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "passed" => Ok(SignalStatus::Passed),
            "failed" => Ok(SignalStatus::Failed),
            other => Err(CoordinationError::validation(format!(
                "signal status must be 'passed' or 'failed', got '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_type_round_trips_through_wire_form() {
        for step_type in StepType::ALL {
            let parsed: StepType = step_type.as_str().parse().unwrap();
            assert_eq!(parsed, step_type);

            let json = serde_json::to_string(&step_type).unwrap();
            assert_eq!(json, format!("\"{}\"", step_type.as_str()));
            let back: StepType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, step_type);
        }
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let err = "deploy".parse::<StepType>().unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("deploy"));
    }

    #[test]
    fn step_serializes_as_string_or_array() {
        let single = Step::single(StepType::Plan);
        assert_eq!(serde_json::to_string(&single).unwrap(), "\"plan\"");

        let parallel = Step::parallel([StepType::Performance, StepType::Security]);
        assert_eq!(
            serde_json::to_string(&parallel).unwrap(),
            "[\"performance\",\"security\"]"
        );

        let plan: Vec<Step> =
            serde_json::from_str(r#"["plan", ["performance", "security"]]"#).unwrap();
        assert_eq!(plan[0], single);
        assert_eq!(plan[1], parallel);
    }

    #[test]
    fn parallel_step_must_be_a_non_empty_set() {
        assert!(Step::parallel([]).validate().is_err());
        assert!(Step::parallel([StepType::Security, StepType::Security])
            .validate()
            .is_err());
        assert!(Step::parallel([StepType::Performance, StepType::Security])
            .validate()
            .is_ok());
        assert!(Step::single(StepType::Plan).validate().is_ok());
    }

    #[test]
    fn signal_types_exposes_fan_in_requirements() {
        assert_eq!(
            Step::single(StepType::Plan).signal_types(),
            &[StepType::Plan]
        );
        assert_eq!(
            Step::parallel([StepType::Performance, StepType::Security]).signal_types(),
            &[StepType::Performance, StepType::Security]
        );
    }

    #[test]
    fn task_id_accepts_directory_safe_names() {
        for ok in ["t1", "develop-feature-test-123", "a.b_c-d", "0"] {
            assert_eq!(TaskId::new(ok).unwrap().as_str(), ok);
        }
    }

    #[test]
    fn task_id_rejects_path_hazards() {
        for bad in ["", ".", "..", "a/b", "a\\b", "task id", "täsk", "a\0b"] {
            let err = TaskId::new(bad).unwrap_err();
            assert_eq!(err.kind(), "validation", "expected rejection of {bad:?}");
        }
        let long = "x".repeat(MAX_TASK_ID_LEN + 1);
        assert!(TaskId::new(long).is_err());
    }

    #[test]
    fn task_id_deserialization_revalidates() {
        let ok: TaskId = serde_json::from_str("\"t1\"").unwrap();
        assert_eq!(ok.as_str(), "t1");
        assert!(serde_json::from_str::<TaskId>("\"../escape\"").is_err());
    }

    #[test]
    fn signal_status_wire_form_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&SignalStatus::Passed).unwrap(),
            "\"passed\""
        );
        assert_eq!("failed".parse::<SignalStatus>().unwrap(), SignalStatus::Failed);
        assert!("PASSED".parse::<SignalStatus>().is_err());
        assert!("ok".parse::<SignalStatus>().is_err());
    }
}
