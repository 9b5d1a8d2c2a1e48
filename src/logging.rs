//! Tracing setup.
//!
//! Logs always go to stderr: on the stdio transport stdout carries the
//! JSON-RPC stream and must stay clean.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "amplitude_mcp={0},mcp_server_http={0},warn",
            default_level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
