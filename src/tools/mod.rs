//! Tool Execution Subsystem
//!
//! This module is the security boundary between the HTTP API and process
//! execution on the host.
//!
//! # Security Features
//!
//! - **Allow-listing**: raw commands must lead with `tshark`; templated tools
//!   come from a closed set
//! - **List Invocation**: commands are executed as argv lists, never through a shell
//! - **Timeout Enforcement**: every invocation carries its tool-class deadline
//! - **Reaping**: timed-out process groups are killed and awaited
//!
//! # Architecture
//!
//! - `validator.rs`: allow-list checks and shell-free command-line splitting
//! - `descriptor.rs`: the static tool descriptor table
//! - `builder.rs`: descriptor + options → concrete invocation
//! - `executor.rs`: subprocess execution with timeout handling
//! - `outcome.rs`: captured execution results
//! - `timeout.rs`: per-class deadlines
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//! use std::sync::Arc;
//! use pcap_gateway::tools::{CommandBuilder, ProcessRunner, ToolName, ToolTable, TokioProcessRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let table = ToolTable::new(Path::new("./tools"), "tshark", "python3");
//!     let builder = CommandBuilder::new(Arc::new(table), ".");
//!
//!     let invocation = builder.build(ToolName::DecryptorA, "capture.pcap", &HashMap::new())?;
//!     let outcome = TokioProcessRunner::new().run(&invocation).await;
//!     println!("{}", outcome.summary());
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod descriptor;
mod executor;
mod outcome;
mod timeout;
mod validator;

pub use builder::{CommandBuilder, ConcreteInvocation};
pub use descriptor::{ArgvShape, ArgvToken, OptionSpec, ToolDescriptor, ToolName, ToolTable};
pub use executor::{ExecutorConfig, ProcessRunner, TokioProcessRunner};
pub use outcome::{ExecutionOutcome, OutcomeStatus};
pub use timeout::{ExecutionTimeout, ToolClass};
pub use validator::{split_command_line, CommandValidator, RAW_TOOL_TOKEN};
