//! Framecast serve command
//!
//! Runs the framecast server in the foreground. Settings come from the layered
//! configuration; flags given here win over every other layer.

use anyhow::Result;
use clap::Args;
use framecast_core::GeneratorKind;
use framecast_server::FramecastServer;
use tracing::info;

use crate::config::{ConfigLoader, FramecastConfig};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Maximum concurrent sessions (0 for unlimited)
    #[arg(long)]
    pub max_queue_size: Option<usize>,

    /// Idle seconds before a session is closed (0 to disable)
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Kernel applied to every frame
    #[arg(long)]
    pub kernel: Option<GeneratorKind>,
}

impl ServeArgs {
    /// Apply flags on top of the loaded configuration
    pub fn apply(&self, config: &mut FramecastConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max_queue_size) = self.max_queue_size {
            config.session.max_queue_size = max_queue_size;
        }
        if let Some(timeout) = self.timeout {
            config.session.timeout_secs = timeout;
        }
        if let Some(kernel) = self.kernel {
            config.transfer.kernel = kernel;
        }
    }
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    args.apply(&mut config);
    let server_config = config.to_server_config()?;

    info!(
        addr = %server_config.addr(),
        max_queue_size = server_config.max_queue_size,
        timeout = ?server_config.timeout,
        kernel = %server_config.kernel,
        "Starting framecast server"
    );

    let server = FramecastServer::new(server_config);
    server.run().await.map_err(Into::into)
}
