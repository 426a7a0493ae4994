//! Gateway Error Taxonomy
//!
//! Every failure a request can hit is one of these variants. None of them
//! escape the gateway: the reporter turns each into the uniform response.

use std::time::Duration;

/// Reasons the allow-list refuses an invocation before anything is launched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Unsupported tool: '{0}'")]
    UnknownTool(String),

    #[error("Tool '{0}' cannot be run as a decryptor")]
    NotADecryptor(String),

    #[error("Only tshark commands are allowed")]
    DisallowedCommand,
}

/// Errors surfaced by the gateway, mapped one-to-one onto response envelopes
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Rejected by policy: {0}")]
    RejectedByPolicy(#[from] PolicyViolation),

    #[error("Failed to launch '{program}': {message}")]
    LaunchError { program: String, message: String },

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Process exited with code {0}")]
    NonZeroExit(i32),

    #[error("Malformed request: {0}")]
    TransportError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for a malformed-request error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_names_identifier() {
        let err: GatewayError = PolicyViolation::UnknownTool("nmap".to_string()).into();
        let msg = err.to_string();
        assert!(msg.contains("nmap"));
        assert!(msg.starts_with("Rejected by policy"));
    }

    #[test]
    fn test_timeout_message_uses_seconds() {
        let err = GatewayError::Timeout(Duration::from_secs(120));
        assert_eq!(err.to_string(), "Command timed out after 120s");
    }
}
