//! TCP listener that hands every accepted connection to the event system.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    connection::handle_connection,
    event_system::EventSystem,
    store::StoreError,
    types::ServerOptions,
};

/// Back-off after a failed accept, so a persistent error (e.g. out of file
/// descriptors) does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to load persisted streams: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to bind listener: {0}")]
    Bind(#[from] io::Error),
}

pub struct Server {
    listener: TcpListener,
    system: Arc<EventSystem>,
}

impl Server {
    /// Bind to `options.host:options.port`.
    pub async fn bind(options: &ServerOptions, system: Arc<EventSystem>) -> io::Result<Self> {
        let listener = TcpListener::bind(options.addr()).await?;
        Ok(Self::from_listener(listener, system))
    }

    pub fn from_listener(listener: TcpListener, system: Arc<EventSystem>) -> Self {
        Self { listener, system }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves. Connections already
    /// accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = self.local_addr() {
            info!(addr = %addr, "Server listening");
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down listener");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let system = self.system.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = socket.into_split();
                            handle_connection(system, reader, writer, peer).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }
    }
}

/// Load persisted history, bind and serve until `shutdown` resolves.
pub async fn start_server<F>(options: ServerOptions, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()>,
{
    let system = EventSystem::from_options(&options)?;
    let server = Server::bind(&options, system).await?;
    server.run_until(shutdown).await;
    Ok(())
}
