//! VMess manager daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    VMESS MANAGER                      │
//!                      │                                                       │
//!   Web UI / clients   │  ┌─────────┐    ┌─────────┐    ┌──────────────┐       │
//!   ───────────────────┼─▶│  http   │───▶│ manager │───▶│    store     │──┐    │
//!                      │  │ server  │    │ (lock)  │    │ list/configs │  │    │
//!                      │  └─────────┘    └────┬────┘    └──────────────┘  │    │
//!                      │                      │                 running.json   │
//!                      │                      ▼                          │    │
//!                      │               ┌──────────────┐                  │    │
//!                      │               │  supervisor  │──── spawn ───────┘    │
//!                      │               │ stop / start │──────────────────────┼──▶ v2ray
//!                      │               └──────────────┘                       │
//!                      │                                                       │
//!                      │  config · observability · lifecycle                   │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use vmess_manager::config::load_config;
use vmess_manager::lifecycle::startup;
use vmess_manager::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "vmess-manager")]
#[command(about = "Manage VMess clients for a supervised V2Ray daemon", long_about = None)]
struct Args {
    /// Optional TOML configuration file.
    #[arg(short, long, env = "VMESS_MANAGER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding list.txt, running.json, settings.json and configs/.
    #[arg(short, long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref(), args.data_dir.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address(),
        vmess_port = config.vmess.port,
        daemon = %config.daemon.binary.display(),
        data_dir = %config.storage.data_dir.display(),
        "vmess-manager starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
