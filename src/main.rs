//! MCP server for the Amplitude Analytics API (stdio transport)
//!
//! Exposes Amplitude's Dashboard REST, Export and Chart APIs as MCP tools
//! and `amplitude://` resources.
//!
//! Run: ./target/release/amplitude_mcp --api-key KEY --secret-key SECRET
//!
//! Environment variables:
//!   AMPLITUDE_API_KEY      - Project API key
//!   AMPLITUDE_SECRET_KEY   - Project secret key
//!   AMPLITUDE_REGION       - us (default) or eu
//!   AMPLITUDE_BASE_URL     - Override the API host
//!   AMPLITUDE_TIMEOUT_SECS - Per-request timeout (default 300, 0 = none)
//!   RUST_LOG               - Log filter (logs go to stderr)
//!
//! Configure in Claude Desktop's settings as a stdio MCP server.

use amplitude_mcp::{
    api::AmplitudeClient,
    config::{AmplitudeArgs, Config},
    logging,
    mcp::McpServer,
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "amplitude_mcp")]
#[command(about = "MCP server for the Amplitude Analytics API (stdio)", version)]
struct Args {
    #[command(flatten)]
    amplitude: AmplitudeArgs,

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
    let server = McpServer::new(client);

    info!(base_url = %config.base_url, "Amplitude MCP server ready on stdio");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        // Only send a response if the line was not a notification
        if let Some(response) = server.handle_line(&line).await {
            let mut response_json = serde_json::to_string(&response)?;
            response_json.push('\n');
            stdout.write_all(response_json.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}
