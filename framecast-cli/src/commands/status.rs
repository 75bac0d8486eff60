//! Query a running server's health endpoint

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use framecast_server::http::HealthResponse;
use tracing::debug;

use crate::config::DEFAULT_PORT;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl StatusArgs {
    fn health_url(&self) -> String {
        format!("http://{}:{}/api/health", self.host, self.port)
    }
}

/// Run the status command
pub async fn run(args: StatusArgs) -> Result<()> {
    let url = args.health_url();
    debug!(url = %url, "Checking server health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .context("Failed to create HTTP client")?;

    let health: HealthResponse = match client.get(&url).send().await {
        Ok(response) => response
            .error_for_status()
            .context("Health check failed")?
            .json()
            .await
            .context("Unexpected health response")?,
        Err(e) => {
            debug!("Health check failed: {}", e);
            println!("framecast server is not running on {}:{}", args.host, args.port);
            return Ok(());
        }
    };

    println!("framecast server is {}", health.status);
    println!("  Version:   {}", health.version);
    println!("  Uptime:    {}s", health.uptime_seconds);
    println!("  Sessions:  {}", health.active_sessions);
    println!("  Loops:     {}", health.active_loops);
    Ok(())
}
