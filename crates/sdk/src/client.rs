use std::net::SocketAddr;

use eventstream_types::{Action, SubscriptionMode};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, tcp::OwnedWriteHalf},
};
use tracing::{debug, info};

use crate::{
    error::{ClientError, Result},
    listener::EventListener,
};

/// Connection to an eventstream broker.
///
/// # Example
///
/// ```ignore
/// use eventstream_sdk::{Client, SubscriptionMode};
///
/// let mut client = Client::connect("127.0.0.1:8080").await?;
/// let mut listener = client.listener().expect("listener already taken");
///
/// client.subscribe("orders", SubscriptionMode::After, Some(5)).await?;
/// client.publish("orders", "order-42 shipped").await?;
///
/// while let Some(message) = listener.recv().await {
///     println!("Received: {}", message);
/// }
/// ```
pub struct Client {
    writer: OwnedWriteHalf,
    listener: Option<EventListener>,
    peer: SocketAddr,
}

impl Client {
    /// Dial the broker at `addr`.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connection {
                addr: addr.to_string(),
                source,
            })?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        info!(peer = %peer, "Connected to broker");
        Ok(Self {
            writer,
            listener: Some(EventListener::spawn(reader)),
            peer,
        })
    }

    /// Address of the broker this client is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Take the receiver for this connection's deliveries. Returns `None` if
    /// it was already taken.
    pub fn listener(&mut self) -> Option<EventListener> {
        self.listener.take()
    }

    /// Append `message` to `stream`. The broker sends no acknowledgement.
    pub async fn publish(&mut self, stream: &str, message: &str) -> Result<()> {
        self.send(&Action::publish(stream, message)).await
    }

    /// Subscribe to `stream`.
    ///
    /// [`SubscriptionMode::After`] requires `after_id`; without it the request
    /// is rejected locally and nothing is sent.
    pub async fn subscribe(
        &mut self,
        stream: &str,
        mode: SubscriptionMode,
        after_id: Option<usize>,
    ) -> Result<()> {
        let action = Action::subscribe(stream, mode, after_id)?;
        self.send(&action).await
    }

    /// Close the write side; the broker then drops every subscription of
    /// this connection.
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, action: &Action) -> Result<()> {
        let mut line = action.encode()?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        debug!(action = action.action_type(), stream = %action.stream(), "Sent action");
        Ok(())
    }
}
