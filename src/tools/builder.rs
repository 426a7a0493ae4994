//! Command Builder
//!
//! Turns a tool descriptor plus caller options into a concrete invocation.
//! Every value becomes its own argv element; nothing is ever joined into a
//! shell string.

use super::descriptor::{ArgvShape, ArgvToken, ToolDescriptor, ToolName, ToolTable};
use super::timeout::{ExecutionTimeout, ToolClass};
use super::validator::RAW_TOOL_TOKEN;
use crate::error::GatewayError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Fully resolved argv, working directory and deadline, ready for launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteInvocation {
    /// argv[0] is the program
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: ExecutionTimeout,
}

impl ConcreteInvocation {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Short form for log lines
    pub fn summary(&self) -> String {
        if self.argv.len() > 3 {
            format!("{:?} ... ({} args)", self.program(), self.argv.len() - 1)
        } else {
            format!("{:?}", self.argv)
        }
    }
}

/// Builds concrete invocations against the shared descriptor table
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    table: Arc<ToolTable>,
    base_dir: PathBuf,
}

impl CommandBuilder {
    pub fn new(table: Arc<ToolTable>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            table,
            base_dir: base_dir.into(),
        }
    }

    pub fn table(&self) -> &ToolTable {
        &self.table
    }

    /// Build the invocation for a templated tool
    ///
    /// Options the descriptor does not recognize are dropped. Omitted options
    /// take the descriptor default.
    pub fn build(
        &self,
        tool: ToolName,
        capture: &str,
        options: &HashMap<String, String>,
    ) -> Result<ConcreteInvocation, GatewayError> {
        let descriptor = self.table.get(tool).ok_or_else(|| {
            GatewayError::Internal(format!("no descriptor registered for '{}'", tool))
        })?;

        let resolve = |key: &str| -> String {
            options
                .get(key)
                .cloned()
                .or_else(|| descriptor.option(key).map(|spec| spec.default.to_string()))
                .unwrap_or_default()
        };

        let template = match &descriptor.shape {
            ArgvShape::Fixed(tokens) => tokens,
            ArgvShape::Conditional {
                require,
                full,
                fallback,
            } => {
                if require.iter().all(|key| !resolve(*key).is_empty()) {
                    full
                } else {
                    fallback
                }
            }
        };

        let mut argv = Vec::with_capacity(template.len() + 1);
        argv.push(descriptor.program.to_string_lossy().into_owned());
        for token in template {
            argv.push(match token {
                ArgvToken::Literal(text) => (*text).to_string(),
                ArgvToken::Script => script_arg(descriptor)?,
                ArgvToken::Capture => capture.to_string(),
                ArgvToken::Option(key) => resolve(*key),
            });
        }

        Ok(ConcreteInvocation {
            argv,
            working_dir: self.base_dir.clone(),
            timeout: descriptor.class.timeout(),
        })
    }

    /// Wrap an already-tokenized raw command line
    ///
    /// A bare `tshark` in argv[0] is replaced with the configured packet
    /// inspector, so raw runs launch the same binary the availability probe
    /// checks. Explicit paths are launched as given.
    pub fn raw(&self, mut argv: Vec<String>) -> ConcreteInvocation {
        if argv.first().map(String::as_str) == Some(RAW_TOOL_TOKEN) {
            if let Some(inspector) = self.table.get(ToolName::PacketInspector) {
                argv[0] = inspector.program.to_string_lossy().into_owned();
            }
        }
        ConcreteInvocation {
            argv,
            working_dir: self.base_dir.clone(),
            timeout: ToolClass::Analyzer.timeout(),
        }
    }

    /// The availability probe for the packet inspector
    pub fn version_probe(&self) -> Result<ConcreteInvocation, GatewayError> {
        let mut invocation = self.build(ToolName::PacketInspector, "", &HashMap::new())?;
        invocation.timeout = ToolClass::Probe.timeout();
        Ok(invocation)
    }
}

fn script_arg(descriptor: &ToolDescriptor) -> Result<String, GatewayError> {
    descriptor
        .script
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned())
        .ok_or_else(|| {
            GatewayError::Internal(format!("descriptor '{}' has no script", descriptor.name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::Path;
    use std::time::Duration;

    fn builder() -> CommandBuilder {
        let table = ToolTable::new(Path::new("/srv/gw/tools"), "tshark", "python3");
        CommandBuilder::new(Arc::new(table), "/srv/gw")
    }

    fn opts(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_decryptor_a_uses_defaults() {
        let inv = builder()
            .build(ToolName::DecryptorA, "cap.pcap", &HashMap::new())
            .unwrap();
        assert_eq!(
            inv.argv,
            vec![
                "python3",
                "/srv/gw/tools/behinder-decryptor/Behinder-Decrypt.py",
                "-f",
                "cap.pcap",
                "-u",
                "/shell.php",
                "-t",
                "php",
                "-k",
                "e45e329feb5d925b",
            ]
        );
        assert_eq!(inv.working_dir, PathBuf::from("/srv/gw"));
        assert_eq!(inv.timeout.duration(), Duration::from_secs(180));
    }

    #[test]
    fn test_decryptor_a_caller_values_override_defaults() {
        let inv = builder()
            .build(
                ToolName::DecryptorA,
                "cap.pcap",
                &opts(&[("url", "/up.jsp"), ("type", "jsp"), ("key", "0011")]),
            )
            .unwrap();
        assert_eq!(&inv.argv[4..], ["-u", "/up.jsp", "-t", "jsp", "-k", "0011"]);
    }

    #[test]
    fn test_unrecognized_options_are_dropped() {
        let inv = builder()
            .build(
                ToolName::DecryptorA,
                "cap.pcap",
                &opts(&[("--exec", "id"), ("output", "/etc/passwd")]),
            )
            .unwrap();
        assert_eq!(inv.argv.len(), 10);
        assert!(!inv.argv.iter().any(|a| a == "id" || a == "/etc/passwd" || a == "--exec"));
    }

    #[test]
    fn test_decryptor_b_decrypt_mode() {
        let inv = builder()
            .build(
                ToolName::DecryptorB,
                "g.pcap",
                &opts(&[("serverIp", "10.0.0.5"), ("key", "3c6e0b8a9c15224a")]),
            )
            .unwrap();
        assert_eq!(
            inv.argv,
            vec![
                "python3",
                "/srv/gw/tools/WSTDecryptor/WSTDecryptor.py",
                "godzilla",
                "-p",
                "g.pcap",
                "-i",
                "10.0.0.5",
                "-k",
                "3c6e0b8a9c15224a",
            ]
        );
    }

    #[test]
    fn test_decryptor_b_discovery_mode() {
        let expected = vec![
            "python3",
            "/srv/gw/tools/WSTDecryptor/WSTDecryptor.py",
            "findshell",
            "-p",
            "g.pcap",
        ];
        let cases = [
            opts(&[]),
            opts(&[("serverIp", "10.0.0.5")]),
            opts(&[("key", "abc")]),
            opts(&[("serverIp", ""), ("key", "abc")]),
        ];
        for options in cases {
            let inv = builder()
                .build(ToolName::DecryptorB, "g.pcap", &options)
                .unwrap();
            assert_eq!(inv.argv, expected, "options: {:?}", options);
        }
    }

    #[test]
    fn test_metacharacters_stay_single_token() {
        let inv = builder()
            .build(
                ToolName::DecryptorA,
                "a b.pcap",
                &opts(&[("key", "a; rm -rf /")]),
            )
            .unwrap();
        assert_eq!(inv.argv[3], "a b.pcap");
        assert_eq!(inv.argv.last().unwrap(), "a; rm -rf /");
        assert_eq!(inv.argv.len(), 10);
    }

    #[test]
    fn test_raw_invocation_uses_analyzer_deadline() {
        let inv = builder().raw(vec!["tshark".into(), "-v".into()]);
        assert_eq!(inv.program(), "tshark");
        assert_eq!(inv.args(), ["-v"]);
        assert_eq!(inv.timeout.duration(), Duration::from_secs(120));
        assert_eq!(inv.working_dir, PathBuf::from("/srv/gw"));
    }

    #[test]
    fn test_raw_tshark_resolves_to_configured_binary() {
        let table = ToolTable::new(Path::new("/srv/gw/tools"), "/opt/wireshark/bin/tshark", "python3");
        let builder = CommandBuilder::new(Arc::new(table), "/srv/gw");

        let inv = builder.raw(vec!["tshark".into(), "-r".into(), "a.pcap".into()]);
        assert_eq!(inv.argv, vec!["/opt/wireshark/bin/tshark", "-r", "a.pcap"]);

        // Explicit paths and look-alike names are left untouched.
        let inv = builder.raw(vec!["/usr/bin/tshark".into(), "-v".into()]);
        assert_eq!(inv.program(), "/usr/bin/tshark");
        let inv = builder.raw(vec!["tshark-legacy".into()]);
        assert_eq!(inv.program(), "tshark-legacy");
    }

    #[test]
    fn test_version_probe() {
        let inv = builder().version_probe().unwrap();
        assert_eq!(inv.argv, vec!["tshark", "--version"]);
        assert_eq!(inv.timeout.duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_every_decryptor_is_buildable() {
        let builder = builder();
        for name in ToolName::ALL {
            assert!(builder.build(name, "x.pcap", &HashMap::new()).is_ok());
        }
    }

    #[test]
    fn test_summary_truncates_long_argv() {
        let inv = builder()
            .build(ToolName::DecryptorA, "x.pcap", &HashMap::new())
            .unwrap();
        assert_eq!(inv.summary(), "\"python3\" ... (9 args)");
    }

    proptest! {
        #[test]
        fn prop_option_values_reach_argv_verbatim(
            key in ".*",
            server in ".+",
        ) {
            let options = opts(&[("serverIp", server.as_str()), ("key", key.as_str())]);
            let inv = builder().build(ToolName::DecryptorB, "c.pcap", &options).unwrap();
            if key.is_empty() {
                prop_assert_eq!(inv.argv.len(), 5);
            } else {
                prop_assert_eq!(inv.argv.len(), 9);
                prop_assert_eq!(&inv.argv[6], &server);
                prop_assert_eq!(&inv.argv[8], &key);
            }
        }
    }
}
