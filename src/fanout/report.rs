// ABOUTME: Per-endpoint execution results and the aggregated batch report.
// ABOUTME: Serializable for JSON output; elapsed times use humantime formatting.

use crate::ssh::CommandOutput;
use serde::Serialize;
use std::time::Duration;

/// Exit status recorded when no remote process ran.
pub const NO_EXIT_STATUS: i32 = -1;

/// Outcome for one endpoint token.
///
/// `succeeded` means the transport and session completed; a nonzero
/// `exit_status` is still a success in that sense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub token: String,
    pub succeeded: bool,
    pub output: String,
    pub exit_status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn completed(token: impl Into<String>, output: &CommandOutput, elapsed: Duration) -> Self {
        Self {
            token: token.into(),
            succeeded: true,
            output: output.combined(),
            exit_status: i32::try_from(output.exit_status).unwrap_or(i32::MAX),
            error: None,
            elapsed,
        }
    }

    pub fn failed(token: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            token: token.into(),
            succeeded: false,
            output: String::new(),
            exit_status: NO_EXIT_STATUS,
            error: Some(error.into()),
            elapsed,
        }
    }
}

/// All results of one batch, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct FanOutReport {
    pub results: Vec<ExecutionResult>,
    /// Group names referenced by the batch.
    pub groups: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl FanOutReport {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.succeeded)
    }

    /// Results ordered by token, for stable display.
    pub fn sorted(&self) -> Vec<&ExecutionResult> {
        let mut sorted: Vec<&ExecutionResult> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.token.cmp(&b.token));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_exit_is_still_a_completed_run() {
        let output = CommandOutput {
            exit_status: 2,
            stdout: "partial\n".to_string(),
            stderr: "boom\n".to_string(),
        };
        let result = ExecutionResult::completed("web1", &output, Duration::from_millis(5));
        assert!(result.succeeded);
        assert_eq!(result.exit_status, 2);
        assert_eq!(result.output, "partial\nboom\n");
        assert!(result.error.is_none());
    }

    #[test]
    fn report_counts_and_sorts() {
        let report = FanOutReport {
            results: vec![
                ExecutionResult::failed("db1", "connection refused", Duration::ZERO),
                ExecutionResult::completed(
                    "app1",
                    &CommandOutput {
                        exit_status: 0,
                        stdout: "ok".into(),
                        stderr: String::new(),
                    },
                    Duration::ZERO,
                ),
            ],
            groups: vec![],
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.all_succeeded());
        let order: Vec<&str> = report.sorted().iter().map(|r| r.token.as_str()).collect();
        assert_eq!(order, vec!["app1", "db1"]);
    }

    #[test]
    fn failed_result_serializes_error_and_elapsed() {
        let result = ExecutionResult::failed("h", "nope", Duration::from_millis(1500));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exit_status"], -1);
        assert_eq!(json["error"], "nope");
        assert_eq!(json["elapsed"], "1s 500ms");
    }
}
