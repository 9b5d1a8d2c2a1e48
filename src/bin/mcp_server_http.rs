//! HTTP-based MCP Server for the Amplitude Analytics API
//!
//! Same tools and resources as the stdio server, served as JSON-RPC over
//! HTTP so it can be deployed remotely.
//!
//! Run: ./target/release/mcp_server_http --port 8080
//!
//! Environment variables: see `amplitude_mcp --help`.
//!
//! Endpoints:
//!   POST /mcp    - JSON-RPC requests
//!   GET  /health - Health check

use std::sync::Arc;

use amplitude_mcp::{
    api::AmplitudeClient,
    config::{AmplitudeArgs, Config},
    logging,
    mcp::{http::create_router, McpServer},
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "mcp_server_http")]
#[command(about = "HTTP-based MCP server for the Amplitude Analytics API", version)]
struct Args {
    #[command(flatten)]
    amplitude: AmplitudeArgs,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(&args.log_level)?;

    let config = Config::from_args(&args.amplitude).context("Invalid configuration")?;
    let client = AmplitudeClient::new(&config).context("Failed to create Amplitude client")?;
    let app = create_router(Arc::new(McpServer::new(client)));

    let addr = format!("{}:{}", args.host, args.port);
    info!(base_url = %config.base_url, "Amplitude MCP Server (HTTP) listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
