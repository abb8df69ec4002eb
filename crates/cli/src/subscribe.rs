use anyhow::Context as _;
use eventstream_sdk::{Client, SubscriptionMode};
use tracing::{debug, info};

/// Replay policy as spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Only messages published from now on
    New,
    /// Every previous message, then new ones
    All,
    /// Previous messages from position `--after-id` onward, then new ones
    After,
}

impl From<Mode> for SubscriptionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::New => SubscriptionMode::New,
            Mode::All => SubscriptionMode::All,
            Mode::After => SubscriptionMode::After,
        }
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct SubscribeCommand {
    /// Broker address
    #[arg(long, short = 'a', env = "EVENTSTREAM_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,

    /// Stream to subscribe to (repeatable)
    #[arg(long = "stream", short = 's', required = true)]
    pub streams: Vec<String>,

    /// Which history to replay before live messages
    #[arg(long, value_enum, default_value = "new")]
    pub mode: Mode,

    /// 0-based position to replay from (required with `--mode after`)
    #[arg(long, required_if_eq("mode", "after"))]
    pub after_id: Option<usize>,
}

impl SubscribeCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let mut client = Client::connect(&self.addr).await?;
        let mut listener = client
            .listener()
            .context("Connection listener was already taken")?;
        info!(peer = %client.peer_addr(), "Client connected successfully");

        for stream in &self.streams {
            client
                .subscribe(stream, self.mode.into(), self.after_id)
                .await
                .with_context(|| format!("Error subscribing to stream '{}'", stream))?;
        }

        loop {
            tokio::select! {
                message = listener.recv() => match message {
                    Some(message) => println!("{}", message),
                    None => {
                        info!("Connection closed by server");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        if let Err(e) = client.close().await {
            debug!(error = %e, "Failed to close connection");
        }
        Ok(())
    }
}
