//! pcap-gateway Library
//!
//! A local control-plane service that lets a browser front end run a fixed
//! set of trusted analysis tools (tshark and two webshell traffic decryptors)
//! and read back their output. The `tools` module is the security boundary
//! between the HTTP API and process execution on the host.

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod reporter;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{GatewayError, PolicyViolation};
pub use gateway::{Availability, Gateway};
pub use reporter::GatewayResponse;
