//! The broker core: streams, subscribers and connected clients.
//!
//! All state lives behind one `RwLock`. Delivery never writes to a socket
//! while the lock is held: each client owns an unbounded queue that its
//! connection writer drains. Publish and subscribe push into those queues
//! under the lock, so every subscriber observes a stream in publish order and
//! a replay always precedes live events published after the subscription.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use eventstream_types::StartAt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    store::{StoreError, StreamStore},
    types::{ClientId, Event, ServerOptions, Snapshot, Stream},
};

/// Outbound half of a client's delivery queue. Each message is one line on the wire.
pub type Outbound = mpsc::UnboundedSender<String>;

struct Client {
    id: ClientId,
    outbound: Outbound,
}

impl Client {
    /// Queue `message` for the client's writer. Failures are logged, never raised.
    fn write(&self, message: &str) {
        if self.outbound.send(message.to_string()).is_err() {
            warn!(client = %self.id, "Failed to write to client: connection writer has stopped");
        }
    }
}

#[derive(Default)]
struct State {
    streams: HashMap<String, Stream>,
    clients: HashMap<ClientId, Client>,
    generation: u64,
}

impl State {
    fn snapshot(&mut self) -> Snapshot {
        self.generation += 1;
        Snapshot {
            generation: self.generation,
            streams: self
                .streams
                .iter()
                .map(|(name, stream)| (name.clone(), stream.events.clone()))
                .collect(),
        }
    }
}

/// Shared broker state. Construct once and hand an `Arc` to every connection.
pub struct EventSystem {
    state: RwLock<State>,
    next_client_id: AtomicU64,
    store: Option<Arc<StreamStore>>,
}

impl EventSystem {
    /// Load history from `store` and persist every subsequent publish to it.
    pub fn new(store: StreamStore) -> Result<Arc<Self>, StoreError> {
        let streams = store.load()?;
        Ok(Self::with_streams(streams, Some(Arc::new(store))))
    }

    /// A broker that keeps history in memory only.
    pub fn in_memory() -> Arc<Self> {
        Self::with_streams(HashMap::new(), None)
    }

    /// Build the broker described by `options.store_path`.
    pub fn from_options(options: &ServerOptions) -> Result<Arc<Self>, StoreError> {
        match &options.store_path {
            Some(path) => Self::new(StreamStore::new(path)),
            None => Ok(Self::in_memory()),
        }
    }

    fn with_streams(streams: HashMap<String, Stream>, store: Option<Arc<StreamStore>>) -> Arc<Self> {
        info!(streams = streams.len(), "Initialized event system");
        Arc::new(Self {
            state: RwLock::new(State {
                streams,
                ..Default::default()
            }),
            next_client_id: AtomicU64::new(1),
            store,
        })
    }

    /// Register a connection and return its id.
    pub fn connect(&self, outbound: Outbound) -> ClientId {
        let id = ClientId::new(self.next_client_id.fetch_add(1, Ordering::Relaxed));
        self.state.write().clients.insert(id, Client { id, outbound });
        debug!(client = %id, "Registered client");
        id
    }

    /// Append `message` to `stream` and deliver it to every current subscriber.
    ///
    /// The stream is created on first use. The new history is then persisted on
    /// a best-effort basis.
    pub fn publish(&self, stream: &str, message: impl Into<String>) -> Event {
        let (event, snapshot) = {
            let mut state = self.state.write();
            let State {
                streams, clients, ..
            } = &mut *state;

            let entry = streams.entry(stream.to_string()).or_default();
            let event = entry.append(message.into());

            for subscriber in &entry.subscribers {
                match clients.get(subscriber) {
                    Some(client) => client.write(&event.message),
                    None => warn!(client = %subscriber, stream = %stream, "Subscriber is not registered"),
                }
            }

            debug!(
                stream = %stream,
                id = event.id,
                subscribers = entry.subscribers.len(),
                "Published event"
            );

            let snapshot = self.store.as_ref().map(|_| state.snapshot());
            (event, snapshot)
        };

        if let Some(snapshot) = snapshot {
            self.persist(snapshot);
        }
        event
    }

    /// Register `client` on `stream` and replay the history selected by `start_at`.
    ///
    /// Subscribing twice to the same stream does not duplicate live delivery,
    /// but the requested replay is still sent.
    pub fn subscribe(&self, client: ClientId, stream: &str, start_at: StartAt) {
        let mut state = self.state.write();
        let State {
            streams, clients, ..
        } = &mut *state;

        let Some(registered) = clients.get(&client) else {
            warn!(client = %client, stream = %stream, "Ignoring subscription from unknown client");
            return;
        };

        let entry = streams.entry(stream.to_string()).or_default();
        if !entry.subscribers.insert(client) {
            debug!(client = %client, stream = %stream, "Client already subscribed");
        }

        let replay = entry.replay(start_at);
        for event in replay {
            registered.write(&event.message);
        }

        info!(
            client = %client,
            stream = %stream,
            mode = %start_at,
            replayed = replay.len(),
            "Registered subscriber"
        );
    }

    /// Remove `client` from every stream and from the registry. Idempotent.
    pub fn disconnect(&self, client: ClientId) {
        let mut state = self.state.write();
        for stream in state.streams.values_mut() {
            stream.subscribers.shift_remove(&client);
        }
        if state.clients.remove(&client).is_some() {
            info!(client = %client, "Removed client from event system");
        }
    }

    /// Names of all known streams, sorted.
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().streams.keys().cloned().collect();
        names.sort();
        names
    }

    /// History of `stream`, if it exists.
    pub fn events(&self, stream: &str) -> Option<Vec<Event>> {
        self.state.read().streams.get(stream).map(|s| s.events.clone())
    }

    /// Current subscribers of `stream` in registration order.
    pub fn subscribers(&self, stream: &str) -> Vec<ClientId> {
        self.state
            .read()
            .streams
            .get(stream)
            .map(|s| s.subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn client_count(&self) -> usize {
        self.state.read().clients.len()
    }

    pub fn is_connected(&self, client: ClientId) -> bool {
        self.state.read().clients.contains_key(&client)
    }

    /// Write `snapshot` to the store. Runs on the blocking pool when called
    /// from a runtime, inline otherwise.
    fn persist(&self, snapshot: Snapshot) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let save = move || match store.save(&snapshot) {
            Ok(true) => {}
            Ok(false) => debug!(generation = snapshot.generation, "Skipped stale snapshot"),
            Err(e) => error!(error = %e, "Failed to persist event streams"),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(save);
            }
            Err(_) => save(),
        }
    }
}
