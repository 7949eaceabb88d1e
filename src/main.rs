// Miko - Live2D companion chat backend
// Main entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use miko::config::load_config;
use miko::mcp::client::McpClient;
use miko::mcp::registry::ServerRegistry;
use miko::server::{self, AppState, ServerConfig};
use miko::tools::executor::ToolExecutor;
use miko::tools::manager::ToolManager;

#[derive(Debug, Parser)]
#[command(name = "miko", version, about = "MCP tool-calling backend for Live2D chat clients")]
struct Args {
    /// Path to config file (default: ~/.miko/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address from the config
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let mut registry = ServerRegistry::new();
    for (name, server_config) in &config.mcp_servers {
        registry.register(name.clone(), server_config.clone());
    }

    let client = Arc::new(McpClient::new(Arc::new(registry)));

    let enabled = config.active_servers();
    tracing::info!("Starting with tool servers: {}", enabled.join(", "));
    let manager = Arc::new(ToolManager::build(&client, &enabled).await);
    tracing::info!("Tool index ready ({} tools)", manager.len());

    let executor = Arc::new(ToolExecutor::new(client.clone(), manager));
    let state = AppState::new(executor);

    let server_config = ServerConfig {
        bind_address: args.bind.unwrap_or(config.server.bind_address),
    };

    tokio::select! {
        result = server::serve(&server_config, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Drain every open tool-server session; log failures instead of exiting
    // non-zero over one stubborn child process.
    for failure in client.close().await {
        tracing::error!(
            "Session '{}' did not close cleanly: {}",
            failure.server,
            failure.error
        );
    }

    tracing::info!("Goodbye");
    Ok(())
}
