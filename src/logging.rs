//! Structured logging setup
//!
//! `RUST_LOG` takes precedence; the configured level is the default directive.

use crate::config::LoggingConfig;
use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Build the filter used by the global subscriber
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global tracing subscriber
///
/// `verbose` forces DEBUG regardless of the configured level.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(level));
    let installed = match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{debug, info};
    use tracing_subscriber::fmt;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// JSON output must be one parseable object per line
    #[test]
    fn test_json_output_format() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = fmt()
            .json()
            .with_max_level(Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            info!(tool = "decryptor-a", "Executing");
        });

        let text = capture.text();
        let line = text.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["fields"]["tool"], "decryptor-a");
    }

    #[test]
    fn test_log_level_filtering() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = fmt()
            .with_max_level(Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden");
            info!("shown");
        });

        let text = capture.text();
        assert!(text.contains("shown"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn test_init_rejects_bad_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            format: "compact".to_string(),
        };
        assert!(init(&config, false).is_err());
    }
}
