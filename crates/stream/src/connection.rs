//! Per-connection request loop.
//!
//! Requests are newline-delimited JSON actions. A line that fails to decode is
//! dropped whole and reading resumes at the next line, so one bad request never
//! desynchronizes the connection. Unterminated JSON is not accepted: a
//! request is only dispatched once its trailing `\n` arrives.

use std::{fmt::Display, sync::Arc};

use eventstream_types::{Action, ActionError};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{event_system::EventSystem, types::ClientId};

/// Serve one client until it closes its side of the connection.
///
/// Registers the client, spawns its outbound writer, dispatches every decoded
/// action and finally disconnects it. Returns once all queued deliveries have
/// been written.
pub async fn handle_connection<R, W>(system: Arc<EventSystem>, reader: R, writer: W, peer: impl Display)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, queue) = mpsc::unbounded_channel();
    let client = system.connect(outbound);
    info!(client = %client, peer = %peer, "Accepted connection");

    let writer_task = tokio::spawn(write_loop(client, writer, queue));

    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                info!(client = %client, "Client closed the connection");
                break;
            }
            Ok(_) => {
                let frame = line.trim_ascii();
                if frame.is_empty() {
                    continue;
                }
                match Action::decode(frame) {
                    Ok(action) => dispatch(&system, client, action),
                    Err(ActionError::UnknownAction(action_type)) => {
                        warn!(client = %client, action_type = %action_type, "Unknown action")
                    }
                    Err(e) => warn!(client = %client, error = %e, "Dropping malformed action"),
                }
            }
            Err(e) => {
                warn!(client = %client, error = %e, "Failed to read from client");
                break;
            }
        }
    }

    // Dropping the registry entry closes the queue; the writer drains what is left.
    system.disconnect(client);
    if let Err(e) = writer_task.await {
        warn!(client = %client, error = %e, "Connection writer failed");
    }
}

fn dispatch(system: &EventSystem, client: ClientId, action: Action) {
    match action {
        Action::Publish(publish) => {
            info!(client = %client, stream = %publish.stream, "Received PUBLISH request");
            system.publish(&publish.stream, publish.message);
        }
        Action::Subscribe(subscribe) => match subscribe.start_at() {
            Ok(start_at) => {
                info!(client = %client, stream = %subscribe.stream, "Received SUBSCRIBE request");
                system.subscribe(client, &subscribe.stream, start_at);
            }
            Err(e) => warn!(client = %client, error = %e, "Rejected subscription"),
        },
    }
}

/// Write queued messages to the peer, one per line, until the queue closes.
/// A failed write is logged and the next message is still attempted.
async fn write_loop<W>(client: ClientId, mut writer: W, mut queue: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queue.recv().await {
        let mut line = message.into_bytes();
        line.push(b'\n');

        let written = async {
            writer.write_all(&line).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            warn!(client = %client, error = %e, "Failed to write to client");
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(client = %client, error = %e, "Failed to shut down connection writer");
    }
}
