//! Tool Descriptors
//!
//! Static, process-wide metadata for the closed set of templated tools. The
//! table is built once from configuration and is read-only afterwards.

use super::timeout::ToolClass;
use crate::error::PolicyViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Closed set of tools the gateway knows how to invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    /// tshark
    PacketInspector,

    /// Behinder traffic decryptor
    DecryptorA,

    /// WSTDecryptor (Godzilla traffic)
    DecryptorB,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::PacketInspector,
        ToolName::DecryptorA,
        ToolName::DecryptorB,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PacketInspector => "packet-inspector",
            Self::DecryptorA => "decryptor-a",
            Self::DecryptorB => "decryptor-b",
        }
    }

    pub fn is_decryptor(self) -> bool {
        matches!(self, Self::DecryptorA | Self::DecryptorB)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = PolicyViolation;

    /// Accepts the canonical names plus the identifiers older front ends send
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "packet-inspector" | "tshark" => Ok(Self::PacketInspector),
            "decryptor-a" | "behinder" => Ok(Self::DecryptorA),
            "decryptor-b" | "godzilla" => Ok(Self::DecryptorB),
            other => Err(PolicyViolation::UnknownTool(other.to_string())),
        }
    }
}

/// A recognized option key and the value used when the caller omits it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub default: &'static str,
}

impl OptionSpec {
    pub const fn new(key: &'static str, default: &'static str) -> Self {
        Self { key, default }
    }
}

/// One slot in an argv template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgvToken {
    /// Fixed text, e.g. a flag or subcommand
    Literal(&'static str),

    /// The descriptor's script path
    Script,

    /// The capture file supplied with the request
    Capture,

    /// The resolved value of an option key
    Option(&'static str),
}

/// How a descriptor's argv is laid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgvShape {
    Fixed(Vec<ArgvToken>),

    /// `full` when every option in `require` resolves non-empty, else `fallback`
    Conditional {
        require: Vec<&'static str>,
        full: Vec<ArgvToken>,
        fallback: Vec<ArgvToken>,
    },
}

/// Immutable description of how to invoke one named tool
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: ToolName,

    /// argv[0]
    pub program: PathBuf,

    /// Script passed to the interpreter, if the tool is script-based
    pub script: Option<PathBuf>,

    pub options: Vec<OptionSpec>,
    pub shape: ArgvShape,
    pub class: ToolClass,
}

impl ToolDescriptor {
    /// Whether the tool's script is present on disk right now
    ///
    /// Tools without a script are considered present; their availability is
    /// established by probing instead.
    pub fn script_exists(&self) -> bool {
        self.script.as_deref().map_or(true, Path::is_file)
    }

    pub fn option(&self, key: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.key == key)
    }
}

/// The full descriptor table
#[derive(Debug, Clone)]
pub struct ToolTable {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolTable {
    /// Build the standard table
    ///
    /// # Arguments
    ///
    /// * `tools_dir` - Directory holding the decryptor checkouts
    /// * `tshark` - Packet inspector executable
    /// * `python` - Interpreter used for the decryptor scripts
    pub fn new(tools_dir: &Path, tshark: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        use ArgvToken::*;

        let python = python.into();

        let packet_inspector = ToolDescriptor {
            name: ToolName::PacketInspector,
            program: tshark.into(),
            script: None,
            options: Vec::new(),
            shape: ArgvShape::Fixed(vec![Literal("--version")]),
            class: ToolClass::Analyzer,
        };

        let decryptor_a = ToolDescriptor {
            name: ToolName::DecryptorA,
            program: python.clone(),
            script: Some(tools_dir.join("behinder-decryptor").join("Behinder-Decrypt.py")),
            options: vec![
                OptionSpec::new("url", "/shell.php"),
                OptionSpec::new("type", "php"),
                OptionSpec::new("key", "e45e329feb5d925b"),
            ],
            shape: ArgvShape::Fixed(vec![
                Script,
                Literal("-f"),
                Capture,
                Literal("-u"),
                Option("url"),
                Literal("-t"),
                Option("type"),
                Literal("-k"),
                Option("key"),
            ]),
            class: ToolClass::Decryptor,
        };

        let decryptor_b = ToolDescriptor {
            name: ToolName::DecryptorB,
            program: python,
            script: Some(tools_dir.join("WSTDecryptor").join("WSTDecryptor.py")),
            options: vec![OptionSpec::new("serverIp", ""), OptionSpec::new("key", "")],
            shape: ArgvShape::Conditional {
                require: vec!["serverIp", "key"],
                full: vec![
                    Script,
                    Literal("godzilla"),
                    Literal("-p"),
                    Capture,
                    Literal("-i"),
                    Option("serverIp"),
                    Literal("-k"),
                    Option("key"),
                ],
                fallback: vec![Script, Literal("findshell"), Literal("-p"), Capture],
            },
            class: ToolClass::Decryptor,
        };

        Self {
            descriptors: vec![packet_inspector, decryptor_a, decryptor_b],
        }
    }

    pub fn get(&self, name: ToolName) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.descriptors.iter()
    }
}
