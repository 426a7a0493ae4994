//! Result Reporter
//!
//! Maps execution outcomes and pre-execution errors into the single response
//! shape the front end consumes.
//!
//! `success` is a transport-level flag: any run that completed, whatever its
//! exit code, is a success envelope. Timeouts, launch failures and rejections
//! are not. The tool-level result travels in `returncode` and `error`.

use crate::error::GatewayError;
use crate::tools::{ExecutionOutcome, OutcomeStatus};
use serde::{Deserialize, Serialize};

/// Uniform response body for `/api/run` and `/api/decrypt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub returncode: Option<i32>,
    pub status: OutcomeStatus,

    /// Resolved argv, echoed for templated runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl GatewayResponse {
    /// Attach the resolved argv
    pub fn with_command(mut self, argv: Vec<String>) -> Self {
        self.command = Some(argv);
        self
    }
}

/// Turn a finished (or refused) invocation into a response
pub fn report(outcome: ExecutionOutcome) -> GatewayResponse {
    let ExecutionOutcome {
        status,
        stdout,
        stderr,
        exit_code,
        message,
        ..
    } = outcome;

    let (success, error) = match status {
        OutcomeStatus::Completed => (true, None),
        OutcomeStatus::FailedNonzero => {
            let error = if stderr.trim().is_empty() {
                match exit_code {
                    Some(code) => GatewayError::NonZeroExit(code).to_string(),
                    None => "Process terminated by signal".to_string(),
                }
            } else {
                stderr
            };
            (true, Some(error))
        }
        OutcomeStatus::TimedOut | OutcomeStatus::LaunchError | OutcomeStatus::Rejected => {
            (false, Some(message.unwrap_or_else(|| status.to_string())))
        }
    };

    GatewayResponse {
        success,
        output: stdout,
        error,
        returncode: exit_code,
        status,
        command: None,
    }
}

/// Turn an error raised before launch into a response
pub fn report_error(err: &GatewayError) -> GatewayResponse {
    let outcome = match err {
        GatewayError::LaunchError { .. } => {
            ExecutionOutcome::launch_error(err.to_string(), Default::default())
        }
        _ => ExecutionOutcome::rejected(err.to_string()),
    };
    report(outcome)
}
