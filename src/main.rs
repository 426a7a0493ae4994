// pcap-gateway - Main Entry Point
//
// Loads configuration, installs logging and serves the gateway API.

use anyhow::{Context, Result};
use clap::Parser;
use pcap_gateway::config::{Config, DEFAULT_CONFIG_FILE};
use pcap_gateway::{logging, server};
use std::path::PathBuf;
use tracing::{debug, info};

/// pcap-gateway: local execution service for tshark and webshell decryptors
#[derive(Parser, Debug)]
#[command(name = "pcap-gateway")]
#[command(version)]
#[command(about = "Local execution gateway for packet capture analysis tools", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Address to bind (overrides config and environment)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and environment)
    #[arg(short, long)]
    port: Option<u16>,

    /// Service base directory (overrides config and environment)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Front-end directory to serve
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.base_dir {
            config.server.base_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.static_dir {
            config.server.static_dir = Some(dir.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = args.apply(Config::load_from_path(&args.config)?);
    config.validate().context("Invalid configuration")?;

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init(&config.logging, args.verbose)?;
    info!("pcap-gateway v{} starting...", env!("CARGO_PKG_VERSION"));
    if args.config.exists() {
        info!("Loaded configuration from {:?}", args.config);
    } else {
        debug!("Config file not found at {:?}, using defaults", args.config);
    }

    server::serve(&config).await
}
