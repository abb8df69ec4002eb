//! Core types for the stream broker.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use eventstream_types::StartAt;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// File the broker persists stream history to when none is configured.
pub const DEFAULT_STORE_FILE: &str = "event-streams.json";

/// One published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the stream, starting at 1
    pub id: u64,
    /// Opaque payload, never interpreted by the broker
    pub message: String,
}

/// Identifier handed out to a connection when it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named stream: its history and the clients currently listening to it.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    /// Append-only, insertion order is delivery order
    pub events: Vec<Event>,
    /// Registered subscribers in registration order
    pub subscribers: IndexSet<ClientId>,
}

impl Stream {
    /// Rebuild a stream from persisted history, with nobody subscribed.
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events,
            subscribers: IndexSet::new(),
        }
    }

    /// Append a message, stamping it with the next id.
    pub fn append(&mut self, message: String) -> Event {
        let event = Event {
            id: self.events.len() as u64 + 1,
            message,
        };
        self.events.push(event.clone());
        event
    }

    /// History a new subscriber should receive before live events.
    pub fn replay(&self, start_at: StartAt) -> &[Event] {
        match start_at {
            StartAt::New => &[],
            StartAt::All => self.events.as_slice(),
            StartAt::After(position) => self.events.get(position..).unwrap_or(&[]),
        }
    }
}

/// Point-in-time copy of every stream's history, ready to be written out.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Increases with every mutation; older snapshots must not overwrite newer ones
    pub generation: u64,
    pub streams: BTreeMap<String, Vec<Event>>,
}

/// Server configuration options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 for auto-assign)
    pub port: u16,
    /// Backing file for stream history (None for in-memory)
    pub store_path: Option<PathBuf>,
}

impl ServerOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            store_path: Some(PathBuf::from(DEFAULT_STORE_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(messages: &[&str]) -> Stream {
        let mut stream = Stream::default();
        for message in messages {
            stream.append(message.to_string());
        }
        stream
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let stream = stream_of(&["a", "b", "c"]);
        let ids: Vec<u64> = stream.events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_replay_slices() {
        let stream = stream_of(&["a", "b", "c"]);

        assert!(stream.replay(StartAt::New).is_empty());
        assert_eq!(stream.replay(StartAt::All).len(), 3);

        let after: Vec<&str> = stream
            .replay(StartAt::After(1))
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(after, vec!["b", "c"]);

        assert_eq!(stream.replay(StartAt::After(0)).len(), 3);
        assert!(stream.replay(StartAt::After(3)).is_empty());
        assert!(stream.replay(StartAt::After(42)).is_empty());
    }

    #[test]
    fn test_default_options() {
        let options = ServerOptions::default();
        assert_eq!(options.addr(), "127.0.0.1:8080");
        assert_eq!(options.store_path, Some(PathBuf::from(DEFAULT_STORE_FILE)));
    }
}
