use std::path::PathBuf;

use anyhow::Context as _;
use eventstream::{start_server, types::DEFAULT_STORE_FILE, types::ServerOptions};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct ServeCommand {
    /// Host to bind to
    #[arg(long, env = "EVENTSTREAM_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to run the broker on
    #[arg(long, short = 'p', env = "EVENTSTREAM_PORT", default_value = "8080")]
    pub port: u16,

    /// File stream history is persisted to
    #[arg(long, env = "EVENTSTREAM_STORE_PATH", default_value = DEFAULT_STORE_FILE)]
    pub store_path: PathBuf,

    /// Keep stream history in memory only
    #[arg(long, conflicts_with = "store_path")]
    pub in_memory: bool,
}

impl ServeCommand {
    pub fn options(&self) -> ServerOptions {
        ServerOptions {
            host: self.host.clone(),
            port: self.port,
            store_path: (!self.in_memory).then(|| self.store_path.clone()),
        }
    }

    pub async fn execute(&self) -> anyhow::Result<()> {
        let options = self.options();
        match &options.store_path {
            Some(path) => info!(path = %path.display(), "Persisting streams"),
            None => info!("Running in memory, stream history will not be persisted"),
        }

        // A corrupt store must stop the broker from starting
        let addr = options.addr();
        start_server(options, shutdown_signal())
            .await
            .with_context(|| format!("Failed to start broker on {}", addr))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
