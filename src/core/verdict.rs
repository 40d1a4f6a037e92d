use serde::Serialize;
use std::fmt;

/// Exit codes every manager treats as success (0, reboot initiated, reboot required)
pub const SUCCESS_EXIT_CODES: [i32; 3] = [0, 1641, 3010];

/// Exit code an elevator returns when its privilege prompt was dismissed
pub const ELEVATOR_CANCELED_EXIT_CODE: i32 = 999;
pub const ELEVATOR_CANCELED_LINE: &str = "Error: The operation was canceled by the user.";

/// Classification of an install/update/uninstall (or source) operation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationVerdict {
    Succeeded,
    Failed,
    /// Retry once; the verdict function has already adjusted the options
    AutoRetry,
    /// Never retried
    Canceled,
}

impl fmt::Display for OperationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationVerdict::Succeeded => "succeeded",
            OperationVerdict::Failed => "failed",
            OperationVerdict::AutoRetry => "auto-retry",
            OperationVerdict::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

pub fn is_success_exit_code(code: i32) -> bool {
    SUCCESS_EXIT_CODES.contains(&code)
}

/// True when the elevator reported that the user dismissed its prompt
pub fn is_elevator_cancel(exit_code: i32, output: &[String]) -> bool {
    exit_code == ELEVATOR_CANCELED_EXIT_CODE
        && output
            .iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .is_some_and(|line| line.trim() == ELEVATOR_CANCELED_LINE)
}

/// True if any captured line contains one of `markers`
pub fn output_contains_any(output: &[String], markers: &[&str]) -> bool {
    output
        .iter()
        .any(|line| markers.iter().any(|marker| line.contains(marker)))
}
