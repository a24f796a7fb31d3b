//! sealnetd - SealNet storage node daemon
//!
//! Serves protocol messages and content-addressed fragments over HTTPS.

use clap::Parser;
use sealnetd::config::{Config, LogFormat};
use sealnetd::node::Node;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(config: &Config) {
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sealnetd={0},sealnet_net={0}", default_level)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration
    let config = Config::parse();
    init_logging(&config);

    info!(
        "sealnetd v{} - SealNet storage node",
        env!("CARGO_PKG_VERSION")
    );

    let node = match Node::new(config) {
        Ok(node) => Arc::new(node),
        Err(e) => {
            error!("Failed to initialize node: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    {
        let node = node.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
                node.shutdown();
            }
        });
    }

    if let Err(e) = node.run().await {
        error!("Node error: {:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
