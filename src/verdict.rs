//! Deriving a verdict from raw worker output.
//!
//! Workers are supposed to save their own signal before exiting, but they
//! do not always manage to. Orchestrators use [`classify`] to turn a
//! worker's final output into a pass/fail verdict they can backfill through
//! the signal store, and [`report_sections`] to carve the markdown body out
//! of the surrounding chatter for the report store.
//!
//! An explicit `STATUS: PASSED` / `STATUS: FAILED` marker always wins over
//! heuristics, so a worker that recovered from an error mid-run can still
//! declare success.

use std::sync::OnceLock;

use regex::Regex;

use crate::task::SignalStatus;

/// A derived pass/fail plus a one-line summary suitable for a signal file.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: SignalStatus,
    pub summary: String,
}

const FAILURE_INDICATORS: [&str; 11] = [
    "error:",
    "failed:",
    "exception:",
    "traceback:",
    "could not",
    "unable to",
    "cannot find",
    "not found",
    "assertion error",
    "test failed",
    "tests failed",
];

const SUCCESS_INDICATORS: [&str; 9] = [
    "all tests pass",
    "tests passing",
    "completed successfully",
    "implementation complete",
    "review complete",
    "analysis complete",
    "no issues found",
    "requirements met",
    "approved",
];

const SUMMARY_LIMIT: usize = 100;

/// Matches a status marker anywhere in a line of output.
fn status_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"(?i)status\s*[:=]\s*(passed|failed)").unwrap())
}

/// Matches a line that is nothing but a status marker.
fn marker_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| Regex::new(r"(?i)^\s*status\s*[:=]\s*(passed|failed)\s*$").unwrap())
}

/// Derive a verdict from a worker's output.
///
/// The last explicit `STATUS` marker decides outright. Without one, any
/// failure indicator means `failed` with an `ERROR:` summary built from the
/// matching line; otherwise a success indicator, or plain completion,
/// means `passed`.
pub fn classify(output: &str) -> Verdict {
    if let Some(captures) = status_marker().captures_iter(output).last() {
        return if captures[1].eq_ignore_ascii_case("passed") {
            Verdict {
                status: SignalStatus::Passed,
                summary: "Completed successfully (explicit status)".to_string(),
            }
        } else {
            Verdict {
                status: SignalStatus::Failed,
                summary: failure_summary(output)
                    .unwrap_or_else(|| "ERROR: Explicit failed status".to_string()),
            }
        };
    }

    if let Some(summary) = failure_summary(output) {
        return Verdict {
            status: SignalStatus::Failed,
            summary,
        };
    }

    let lower = output.to_lowercase();
    for indicator in SUCCESS_INDICATORS {
        if lower.contains(indicator) {
            return Verdict {
                status: SignalStatus::Passed,
                summary: "Completed successfully (derived from output)".to_string(),
            };
        }
    }

    Verdict {
        status: SignalStatus::Passed,
        summary: "Completed (no explicit verdict in output)".to_string(),
    }
}

/// An `ERROR:` summary from the first line matching a failure indicator,
/// or `None` when the output shows no failure.
fn failure_summary(output: &str) -> Option<String> {
    let lower = output.to_lowercase();
    for indicator in FAILURE_INDICATORS {
        if !lower.contains(indicator) {
            continue;
        }
        // Match lines on the colon-stripped form so "Error occurred" still
        // yields a summary for the "error:" indicator.
        let bare = indicator.trim_end_matches(':');
        let summary = output
            .lines()
            .find(|line| line.to_lowercase().contains(bare))
            .map(|line| {
                let snippet: String = line.chars().take(SUMMARY_LIMIT).collect();
                format!("ERROR: {}", snippet.trim())
            })
            .unwrap_or_else(|| "ERROR: Worker output reported issues".to_string());
        return Some(summary);
    }
    None
}

/// The markdown body of a worker's output, for saving as a report.
///
/// Everything before the first `## ` heading is dropped, as are lines that
/// are nothing but a status marker. Output with no headings at all is
/// wrapped under a `## Agent Output` heading so the report is still valid
/// markdown. Empty output stays empty.
pub fn report_sections(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .filter(|line| !marker_line().is_match(line))
        .collect();

    if let Some(first) = lines.iter().position(|line| line.starts_with("## ")) {
        return lines[first..].join("\n").trim_end().to_string();
    }

    let body = lines.join("\n");
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!("## Agent Output\n\n{body}")
    }
}
