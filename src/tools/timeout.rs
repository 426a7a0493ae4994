//! Execution Timeout Management
//!
//! Each tool class runs under its own fixed deadline.

use std::time::Duration;

/// Deadline class attached to every concrete invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolClass {
    /// tshark analysis runs (2 minutes)
    Analyzer,

    /// Webshell decryptor runs (3 minutes)
    Decryptor,

    /// Availability version probe (5 seconds)
    Probe,
}

impl ToolClass {
    /// The deadline for this class
    pub fn timeout(self) -> ExecutionTimeout {
        match self {
            Self::Analyzer => ExecutionTimeout::from_secs(120),
            Self::Decryptor => ExecutionTimeout::from_secs(180),
            Self::Probe => ExecutionTimeout::from_secs(5),
        }
    }
}

/// Execution timeout configuration
///
/// Timeouts are enforced to prevent commands from hanging indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use pcap_gateway::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl From<Duration> for ExecutionTimeout {
    fn from(duration: Duration) -> Self {
        Self::new(duration)
    }
}
