//! Stable exit codes for scriptpilot CLI commands.

use crate::core::types::TurnOutcome;

/// Command succeeded, or the turn ended in an answer.
pub const OK: i32 = 0;
/// Invalid config, I/O failure or other setup error.
pub const INVALID: i32 = 1;
/// `scriptpilot extract` found no fenced script.
pub const NO_SCRIPT: i32 = 2;
/// The user declined to run the proposed script.
pub const USER_REJECTED: i32 = 3;
/// Every corrective retry failed.
pub const RETRY_LIMIT_EXCEEDED: i32 = 4;
/// The sandbox could not run (interpreter missing, spawn failure).
pub const SANDBOX_FAULT: i32 = 5;
/// The model provider returned an error.
pub const PROVIDER_FAILURE: i32 = 6;
/// Interrupted by the user (matches the shell convention for SIGINT).
pub const CANCELLED: i32 = 130;

/// Exit code reported by `scriptpilot ask` for a turn outcome.
pub fn for_outcome(outcome: &TurnOutcome) -> i32 {
    match outcome {
        TurnOutcome::Answered { .. } => OK,
        TurnOutcome::UserRejected => USER_REJECTED,
        TurnOutcome::RetryLimitExceeded { .. } => RETRY_LIMIT_EXCEEDED,
        TurnOutcome::SandboxFault { .. } => SANDBOX_FAULT,
        TurnOutcome::ProviderFailure { .. } => PROVIDER_FAILURE,
        TurnOutcome::Cancelled => CANCELLED,
    }
}
