use anyhow::Context as _;
use eventstream_sdk::Client;
use tracing::info;

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct PublishCommand {
    /// Broker address
    #[arg(long, short = 'a', env = "EVENTSTREAM_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,

    /// Stream to publish to
    #[arg(long, short = 's')]
    pub stream: String,

    /// Messages to publish, in order
    #[arg(required = true)]
    pub messages: Vec<String>,
}

impl PublishCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let mut client = Client::connect(&self.addr).await?;
        info!(peer = %client.peer_addr(), "Client connected successfully");

        for message in &self.messages {
            client
                .publish(&self.stream, message)
                .await
                .with_context(|| format!("Error publishing to stream '{}'", self.stream))?;
        }

        client.close().await?;
        info!(
            stream = %self.stream,
            count = self.messages.len(),
            "Published messages"
        );
        Ok(())
    }
}
