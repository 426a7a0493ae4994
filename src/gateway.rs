//! Gateway API
//!
//! The three operations the front end can ask for. Each one runs the same
//! pipeline: validate, build, run, report. Nothing here returns an error; every
//! path ends in a [`GatewayResponse`].

use crate::config::Config;
use crate::error::GatewayError;
use crate::metrics;
use crate::reporter::{report, report_error, GatewayResponse};
use crate::tools::{
    split_command_line, CommandBuilder, CommandValidator, ExecutionOutcome, ExecutorConfig,
    OutcomeStatus, ProcessRunner, TokioProcessRunner, ToolName, ToolTable,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Point-in-time view of which tools are usable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub server: String,
    pub tshark: bool,
    pub python: bool,
    pub tools: BTreeMap<ToolName, bool>,
}

/// Request-independent state shared by every handler
///
/// Immutable after construction; handlers hold it behind an `Arc`.
pub struct Gateway {
    validator: CommandValidator,
    builder: CommandBuilder,
    runner: Arc<dyn ProcessRunner>,
}

impl Gateway {
    /// Build the gateway described by a configuration, backed by real processes
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let base_dir = config.base_dir()?;
        let tools_dir = config.tools_dir()?;
        let table = ToolTable::new(&tools_dir, &config.tools.tshark, &config.tools.python);
        let runner = TokioProcessRunner::with_config(ExecutorConfig::with_max_output_size(
            config.tools.max_output_bytes,
        ));
        Ok(Self::new(table, base_dir, Arc::new(runner)))
    }

    pub fn new(table: ToolTable, base_dir: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            validator: CommandValidator::new(),
            builder: CommandBuilder::new(Arc::new(table), base_dir),
            runner,
        }
    }

    /// Run a raw tshark command line
    pub async fn run_analysis(&self, command: &str) -> GatewayResponse {
        let tool = ToolName::PacketInspector.as_str();

        if command.trim().is_empty() {
            return self.refuse(tool, GatewayError::transport("command must not be empty"));
        }
        if let Err(violation) = self.validator.validate_raw(command) {
            return self.refuse(tool, violation.into());
        }
        let argv = match split_command_line(command.trim()) {
            Ok(argv) => argv,
            Err(err) => return self.refuse(tool, err),
        };

        let invocation = self.builder.raw(argv);
        let outcome = self.runner.run(&invocation).await;
        metrics::record(tool, &outcome);
        report(outcome)
    }

    /// Run one of the named decryptors against a capture file
    pub async fn run_decryptor(
        &self,
        tool: &str,
        capture: &str,
        options: &HashMap<String, String>,
    ) -> GatewayResponse {
        let name = match self.validator.validate_decryptor(tool) {
            Ok(name) => name,
            Err(violation) => return self.refuse("unknown", violation.into()),
        };
        if capture.trim().is_empty() {
            return self.refuse(name.as_str(), GatewayError::transport("pcapFile must not be empty"));
        }

        let invocation = match self.builder.build(name, capture, options) {
            Ok(invocation) => invocation,
            Err(err) => return self.refuse(name.as_str(), err),
        };

        let argv = invocation.argv.clone();
        let outcome = self.runner.run(&invocation).await;
        metrics::record(name.as_str(), &outcome);
        report(outcome).with_command(argv)
    }

    /// Probe tshark and check the decryptor scripts on disk
    ///
    /// Recomputed on every call. The only process launched is the bounded
    /// tshark version probe.
    pub async fn availability(&self) -> Availability {
        let tshark = match self.builder.version_probe() {
            Ok(probe) => {
                let outcome = self.runner.run(&probe).await;
                debug!("tshark probe: {}", outcome.summary());
                outcome.status == OutcomeStatus::Completed
            }
            Err(err) => {
                warn!("tshark probe unavailable: {}", err);
                false
            }
        };

        let table = self.builder.table();
        let python = table
            .get(ToolName::DecryptorA)
            .map_or(false, |d| resolve_program(&d.program).is_some());

        let tools = table
            .iter()
            .filter(|d| d.name.is_decryptor())
            .map(|d| (d.name, d.script_exists()))
            .collect();

        Availability {
            server: "running".to_string(),
            tshark,
            python,
            tools,
        }
    }

    fn refuse(&self, tool: &str, err: GatewayError) -> GatewayResponse {
        warn!("Request refused: {}", err);
        metrics::record(tool, &ExecutionOutcome::rejected(err.to_string()));
        report_error(&err)
    }
}

/// Locate an executable without running it
///
/// Paths with a directory component are checked directly; bare names are
/// searched for on `PATH`.
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
