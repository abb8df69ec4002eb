use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, error, info};

/// Receives the messages the broker delivers on a connection.
///
/// A connection has a single reader: deliveries for every stream the client
/// subscribed to arrive here, in the order the broker sent them.
pub struct EventListener {
    rx: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<()>,
}

impl EventListener {
    pub(crate) fn spawn<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(reader, tx));
        Self { rx, task }
    }

    /// Next delivered message, or `None` once the broker closed the connection.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_loop<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(message)) => {
                debug!(bytes = message.len(), "Message received");
                if tx.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => {
                info!("Connection closed by server");
                break;
            }
            Err(e) => {
                error!(error = %e, "Error reading message");
                break;
            }
        }
    }
}
