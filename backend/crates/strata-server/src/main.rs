// Strata server entrypoint
//!
//! Startup and shutdown live in [`strata_server::lifecycle`] so this file
//! remains a thin orchestrator.

use std::env;

use anyhow::Result;
use log::info;
use strata_commons::config::ServerConfig;
use strata_server::{lifecycle, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // First argument overrides the config path
    let config_path = env::args().nth(1).unwrap_or_else(|| "server.toml".to_string());
    let config = match ServerConfig::from_file(&config_path) {
        Ok(cfg) => {
            eprintln!(
                "✅ Loaded config from: {}",
                std::fs::canonicalize(&config_path)
                    .unwrap_or_else(|_| std::path::PathBuf::from(&config_path))
                    .display()
            );
            cfg
        }
        Err(e) => {
            eprintln!("❌ FATAL: Failed to load {}: {}", config_path, e);
            eprintln!("❌ Server cannot start without valid configuration");
            std::process::exit(1);
        }
    };

    // Logging before any other side effects
    logging::init_logging(&config.logging)?;

    info!("Strata Server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Node: {}  API: {}  RPC: {}",
        config.node.name, config.node.api_addr, config.cluster.rpc_addr
    );

    let components = lifecycle::bootstrap(&config).await?;
    lifecycle::run(components).await
}
