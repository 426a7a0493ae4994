//! Execution Outcomes
//!
//! The captured result of running, or failing to run, one invocation.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal status of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Completed,
    FailedNonzero,
    TimedOut,
    LaunchError,
    Rejected,
}

impl OutcomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::FailedNonzero => "failed-nonzero",
            Self::TimedOut => "timed-out",
            Self::LaunchError => "launch-error",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one invocation, consumed once by the reporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub status: OutcomeStatus,
    pub stdout: String,
    pub stderr: String,

    /// None when the process never ran or was killed
    pub exit_code: Option<i32>,

    /// Launch error text, rejection reason, or timeout description
    pub message: Option<String>,

    /// OS process id, when a process was started
    pub pid: Option<u32>,

    pub duration: Duration,
}

impl ExecutionOutcome {
    /// A process that ran to completion
    pub fn exited(
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        pid: Option<u32>,
        duration: Duration,
    ) -> Self {
        let status = if exit_code == Some(0) {
            OutcomeStatus::Completed
        } else {
            OutcomeStatus::FailedNonzero
        };
        Self {
            status,
            stdout,
            stderr,
            exit_code,
            message: None,
            pid,
            duration,
        }
    }

    /// A process killed at its deadline, with whatever it wrote before then
    pub fn timed_out(
        stdout: String,
        stderr: String,
        pid: Option<u32>,
        limit: Duration,
        duration: Duration,
    ) -> Self {
        Self {
            status: OutcomeStatus::TimedOut,
            stdout,
            stderr,
            exit_code: None,
            message: Some(GatewayError::Timeout(limit).to_string()),
            pid,
            duration,
        }
    }

    /// The OS refused to start the process
    pub fn launch_error(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: OutcomeStatus::LaunchError,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            message: Some(message.into()),
            pid: None,
            duration,
        }
    }

    /// Refused before anything was launched
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Rejected,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            message: Some(reason.into()),
            pid: None,
            duration: Duration::ZERO,
        }
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self.status {
            OutcomeStatus::TimedOut => format!("Timeout after {:.0?}", self.duration),
            OutcomeStatus::Completed | OutcomeStatus::FailedNonzero => format!(
                "{} (exit code: {:?}, {:.0?}, {} bytes output)",
                self.status,
                self.exit_code,
                self.duration,
                self.stdout.len()
            ),
            OutcomeStatus::LaunchError | OutcomeStatus::Rejected => format!(
                "{}: {}",
                self.status,
                self.message.as_deref().unwrap_or_default()
            ),
        }
    }
}
