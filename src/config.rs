// Configuration File Support
//
// TOML configuration for the gateway with environment variable overrides.
// Every field has a default, so a missing file is not an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pcap-gateway.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// HTTP server and filesystem layout
    pub server: ServerConfig,

    /// External tool locations and limits
    pub tools: ToolsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Listening port
    pub port: u16,

    /// Service install location; working directory for every tool run.
    /// Defaults to the process working directory.
    pub base_dir: Option<PathBuf>,

    /// Directory holding the decryptor checkouts (default: `<base_dir>/tools`)
    pub tools_dir: Option<PathBuf>,

    /// Front-end directory to serve, if any
    pub static_dir: Option<PathBuf>,

    /// Maximum accepted request body in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            base_dir: None,
            tools_dir: None,
            static_dir: None,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Packet inspector executable used by the availability probe
    pub tshark: String,

    /// Interpreter for the decryptor scripts
    pub python: String,

    /// Cap on captured bytes per output stream
    pub max_output_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tshark: "tshark".to_string(),
            python: "python3".to_string(),
            max_output_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

impl Config {
    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied on top of the file. The result is not
    /// validated here; callers validate once every override layer (including
    /// CLI flags) has been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed. If the config file does not exist, returns default configuration
    /// (with environment overrides).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?
        } else {
            Self::default()
        };

        Ok(config.apply_env_overrides())
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - PCAP_GATEWAY_HOST
    /// - PCAP_GATEWAY_PORT
    /// - PCAP_GATEWAY_BASE_DIR
    /// - PCAP_GATEWAY_TOOLS_DIR
    /// - PCAP_GATEWAY_TSHARK
    /// - PCAP_GATEWAY_PYTHON
    /// - PCAP_GATEWAY_LOG_LEVEL
    /// - PCAP_GATEWAY_LOG_FORMAT
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PCAP_GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PCAP_GATEWAY_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Some(dir) = lookup("PCAP_GATEWAY_BASE_DIR") {
            self.server.base_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("PCAP_GATEWAY_TOOLS_DIR") {
            self.server.tools_dir = Some(PathBuf::from(dir));
        }
        if let Some(tshark) = lookup("PCAP_GATEWAY_TSHARK") {
            self.tools.tshark = tshark;
        }
        if let Some(python) = lookup("PCAP_GATEWAY_PYTHON") {
            self.tools.python = python;
        }
        if let Some(level) = lookup("PCAP_GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PCAP_GATEWAY_LOG_FORMAT") {
            self.logging.format = format;
        }
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        self.server
            .host
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid bind host: {}", self.server.host))?;

        if self.server.max_body_bytes == 0 {
            anyhow::bail!("Request body limit must be > 0");
        }
        if self.tools.tshark.trim().is_empty() {
            anyhow::bail!("tshark executable must not be empty");
        }
        if self.tools.python.trim().is_empty() {
            anyhow::bail!("Python interpreter must not be empty");
        }
        if self.tools.max_output_bytes < 1024 {
            anyhow::bail!("Output cap must be at least 1024 bytes");
        }

        Ok(())
    }

    /// Resolved service base directory
    pub fn base_dir(&self) -> Result<PathBuf> {
        match &self.server.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to determine working directory"),
        }
    }

    /// Resolved tools directory
    pub fn tools_dir(&self) -> Result<PathBuf> {
        match &self.server.tools_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.base_dir()?.join("tools")),
        }
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid bind host: {}", self.server.host))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.tools.tshark, "tshark");
        assert_eq!(config.tools.python, "python3");
        assert_eq!(config.logging.level, "info");
        assert!(config.server.static_dir.is_none());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not-an-ip".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_small_output_cap() {
        let mut config = Config::default();
        config.tools.max_output_bytes = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, Config::default().server.port);
    }

    #[test]
    fn test_load_valid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[server]
host = "0.0.0.0"
port = 9000
base_dir = "/opt/tshark-gui"
static_dir = "/opt/tshark-gui"

[tools]
tshark = "/usr/local/bin/tshark"
python = "/usr/bin/python3.11"

[logging]
level = "debug"
format = "json"
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        let config: Config = toml::from_str(&content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.base_dir().unwrap(), PathBuf::from("/opt/tshark-gui"));
        assert_eq!(
            config.tools_dir().unwrap(),
            PathBuf::from("/opt/tshark-gui/tools")
        );
        assert_eq!(config.tools.tshark, "/usr/local/bin/tshark");
        assert_eq!(config.logging.format, "json");
        // Unset fields keep their defaults.
        assert_eq!(config.server.max_body_bytes, 64 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[server\nport = 1").unwrap();
        let result = Config::load_from_path(temp_file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_load_defers_validation() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging]\nlevel = \"loud\"\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "loud");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().apply_overrides(env(&[
            ("PCAP_GATEWAY_PORT", "9999"),
            ("PCAP_GATEWAY_TOOLS_DIR", "/srv/tools"),
            ("PCAP_GATEWAY_PYTHON", "python"),
            ("PCAP_GATEWAY_LOG_LEVEL", "warn"),
        ]));
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.tools_dir().unwrap(), PathBuf::from("/srv/tools"));
        assert_eq!(config.tools.python, "python");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_env_override_ignores_bad_port() {
        let config = Config::default().apply_overrides(env(&[("PCAP_GATEWAY_PORT", "http")]));
        assert_eq!(config.server.port, 8765);
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        assert_eq!(
            config.bind_addr().unwrap(),
            "127.0.0.1:8765".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_log_level() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_string();
        assert_eq!(config.logging.log_level().unwrap(), tracing::Level::DEBUG);
    }
}
