//! File-backed stream history.
//!
//! The whole `name -> [Event]` map is rewritten as one JSON document on every
//! save. Writes land in a sibling temporary file that is synced and renamed
//! over the target, and the directory is synced after the rename, so a crash
//! leaves either the previous or the new snapshot on disk, never a torn one.
//! Subscribers are never persisted.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::types::{Event, Snapshot, Stream};

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize streams: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt stream file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Persists stream history to a single file.
pub struct StreamStore {
    path: PathBuf,
    /// Held for the duration of a load or save; tracks the newest generation on disk
    last_generation: Mutex<Option<u64>>,
}

impl StreamStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_generation: Mutex::new(None),
        }
    }

    /// Read every persisted stream.
    ///
    /// A missing or blank file is a first run and yields no streams. Content
    /// that does not parse, or whose event ids are not exactly `1..=N`, is
    /// reported as [`StoreError::Corrupt`].
    pub fn load(&self) -> Result<HashMap<String, Stream>, StoreError> {
        let _guard = self.last_generation.lock();
        info!(path = %self.path.display(), "Loading persisted streams");

        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No stream file found, starting empty");
                return Ok(HashMap::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }

        let persisted: BTreeMap<String, Vec<Event>> =
            serde_json::from_slice(&data).map_err(|e| self.corrupt(e.to_string()))?;

        let mut streams = HashMap::with_capacity(persisted.len());
        for (name, events) in persisted {
            for (position, event) in events.iter().enumerate() {
                let expected = position as u64 + 1;
                if event.id != expected {
                    return Err(self.corrupt(format!(
                        "stream '{}' has event id {} at position {}, expected {}",
                        name, event.id, position, expected
                    )));
                }
            }
            debug!(stream = %name, events = events.len(), "Restored stream");
            streams.insert(name, Stream::with_events(events));
        }

        info!(streams = streams.len(), "Loaded persisted streams");
        Ok(streams)
    }

    /// Replace the file contents with `snapshot`.
    ///
    /// Returns `Ok(false)` without touching the file when a snapshot of the
    /// same or a later generation has already been written.
    pub fn save(&self, snapshot: &Snapshot) -> Result<bool, StoreError> {
        let mut last_generation = self.last_generation.lock();
        if matches!(*last_generation, Some(last) if snapshot.generation <= last) {
            return Ok(false);
        }

        let data = serde_json::to_vec_pretty(&snapshot.streams)?;
        self.write_atomically(&data).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        *last_generation = Some(snapshot.generation);
        debug!(
            path = %self.path.display(),
            generation = snapshot.generation,
            "Persisted streams"
        );
        Ok(true)
    }

    fn write_atomically(&self, data: &[u8]) -> io::Result<()> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent)?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        sync_dir(parent)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Make a rename inside `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, message: &str) -> Event {
        Event {
            id,
            message: message.to_string(),
        }
    }

    fn snapshot(generation: u64, streams: &[(&str, Vec<Event>)]) -> Snapshot {
        Snapshot {
            generation,
            streams: streams
                .iter()
                .map(|(name, events)| (name.to_string(), events.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path().join("streams.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_blank_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        fs::write(&path, "").unwrap();
        assert!(StreamStore::new(&path).load().unwrap().is_empty());

        fs::write(&path, "  \n").unwrap();
        assert!(StreamStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        let store = StreamStore::new(&path);

        let written = store
            .save(&snapshot(
                1,
                &[
                    ("chat", vec![event(1, "Hello"), event(2, "World")]),
                    ("empty", vec![]),
                ],
            ))
            .unwrap();
        assert!(written);

        let streams = StreamStore::new(&path).load().unwrap();
        assert_eq!(streams.len(), 2);

        let chat = &streams["chat"];
        assert_eq!(chat.events, vec![event(1, "Hello"), event(2, "World")]);
        assert!(chat.subscribers.is_empty());
        assert!(streams["empty"].events.is_empty());
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        let store = StreamStore::new(&path);
        store
            .save(&snapshot(1, &[("chat", vec![event(1, "Hello")])]))
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "chat": [{ "id": 1, "message": "Hello" }] })
        );
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_stale_snapshot_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        let store = StreamStore::new(&path);

        let newer = snapshot(2, &[("chat", vec![event(1, "a"), event(2, "b")])]);
        let older = snapshot(1, &[("chat", vec![event(1, "a")])]);

        assert!(store.save(&newer).unwrap());
        assert!(!store.save(&older).unwrap());

        let streams = store.load().unwrap();
        assert_eq!(streams["chat"].events.len(), 2);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("streams.json");
        let store = StreamStore::new(&path);
        store.save(&snapshot(1, &[])).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        let bare = StreamStore::new("streams.json");
        assert_eq!(bare.parent_dir(), Path::new("."));

        let dir = tempfile::tempdir().unwrap();
        let nested = StreamStore::new(dir.path().join("streams.json"));
        assert_eq!(nested.parent_dir(), dir.path());
    }

    #[test]
    fn test_repeated_saves_replace_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        let store = StreamStore::new(&path);

        store.save(&snapshot(1, &[("chat", vec![event(1, "a")])])).unwrap();
        store
            .save(&snapshot(2, &[("chat", vec![event(1, "a"), event(2, "b")])]))
            .unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("streams.json")]);
        assert_eq!(StreamStore::new(&path).load().unwrap()["chat"].events.len(), 2);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        fs::write(&path, "{ not json").unwrap();

        let result = StreamStore::new(&path).load();
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_load_rejects_id_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streams.json");
        fs::write(
            &path,
            r#"{"chat":[{"id":1,"message":"a"},{"id":3,"message":"c"}]}"#,
        )
        .unwrap();

        match StreamStore::new(&path).load() {
            Err(StoreError::Corrupt { reason, .. }) => assert!(reason.contains("chat")),
            other => panic!("unexpected result {:?}", other.map(|s| s.len())),
        }
    }
}
