//! Command Allow-List Validation
//!
//! This module decides whether an invocation is permitted before anything is
//! executed, and splits raw command lines into argv without a shell.

use super::descriptor::ToolName;
use crate::error::{GatewayError, PolicyViolation};

/// Token a raw command line must lead with
pub const RAW_TOOL_TOKEN: &str = "tshark";

/// Allow-list gate for raw and templated requests
///
/// Raw commands are admitted by prefix only. Argument content is never
/// inspected here; argv is always handed to the OS as discrete tokens.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    raw_token: String,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandValidator {
    pub fn new() -> Self {
        Self {
            raw_token: RAW_TOOL_TOKEN.to_string(),
        }
    }

    /// Validate a raw command line
    ///
    /// Admits the line when its trimmed form starts with the tshark token, or
    /// when it opens with a quote and mentions the token anywhere (quoted
    /// executable paths such as `"C:\Program Files\Wireshark\tshark.exe"`).
    ///
    /// # Example
    ///
    /// ```
    /// use pcap_gateway::tools::CommandValidator;
    ///
    /// let validator = CommandValidator::new();
    /// assert!(validator.validate_raw("tshark -r capture.pcap").is_ok());
    /// assert!(validator.validate_raw("cat /etc/passwd").is_err());
    /// ```
    pub fn validate_raw(&self, command: &str) -> Result<(), PolicyViolation> {
        let trimmed = command.trim();

        // TODO: the quoted branch admits any quoted line mentioning the token;
        // needs a security review before the service is exposed beyond localhost.
        let allowed = trimmed.starts_with(&self.raw_token)
            || (trimmed.starts_with('"') && command.contains(&self.raw_token));

        if allowed {
            Ok(())
        } else {
            Err(PolicyViolation::DisallowedCommand)
        }
    }

    /// Resolve the tool named by a decrypt request
    pub fn validate_decryptor(&self, tool: &str) -> Result<ToolName, PolicyViolation> {
        let name: ToolName = tool.parse()?;
        if !name.is_decryptor() {
            return Err(PolicyViolation::NotADecryptor(tool.to_string()));
        }
        Ok(name)
    }
}

/// Split a command line into argv tokens without shell interpretation
///
/// Whitespace separates tokens. Single quotes group literally. Double quotes
/// group, and inside them a backslash escapes `"` or `\`. Every other
/// character, including `;`, `|`, `$` and backticks, is ordinary text.
pub fn split_command_line(line: &str) -> Result<Vec<String>, GatewayError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => {
                            if matches!(chars.peek(), Some('"' | '\\')) {
                                current.extend(chars.next());
                            } else {
                                current.push('\\');
                            }
                        }
                        Some(other) => current.push(other),
                        None => {
                            return Err(GatewayError::transport("unterminated double quote"))
                        }
                    }
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(other) => current.push(other),
                        None => {
                            return Err(GatewayError::transport("unterminated single quote"))
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}
