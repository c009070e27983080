//! Playlist persistence
//!
//! File-backed store for two small JSON documents living in the data directory:
//! - `played.json`: recently played songs and phrases, trimmed to a retention window
//! - `queue.json`: explicitly requested items, consumed first-in first-out
//!
//! Both files are rewritten whole on every change and guarded by independent
//! locks, so queue traffic never waits on played-item bookkeeping and vice versa.
//! Unreadable JSON is treated as an empty document; the next write replaces it.

use crate::error::Result;
use crate::time;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// File name of the played-items document inside the data directory
pub const PLAYED_FILE: &str = "played.json";

/// File name of the queue document inside the data directory
pub const QUEUE_FILE: &str = "queue.json";

/// Default retention window for played items
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Kind of content a playlist entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A sound file name relative to the sound directory
    Song,
    /// Text handed to speech synthesis
    Text,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Song => f.write_str("song"),
            ItemType::Text => f.write_str("text"),
        }
    }
}

/// A started or completed playback, kept to avoid repeats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayedItem {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub timestamp: DateTime<Utc>,
}

impl PlayedItem {
    /// Played item stamped with the current time
    pub fn now(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            item_type,
            timestamp: time::now(),
        }
    }
}

/// A pending, explicitly requested playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

impl QueueItem {
    pub fn song(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type: ItemType::Song,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            name: text.into(),
            item_type: ItemType::Text,
        }
    }
}

/// File-backed store for played items and the playback queue.
///
/// Created once at startup with [`PlaylistStore::init`] and shared by reference
/// (typically behind an `Arc`). The store is the sole writer of both files.
#[derive(Debug)]
pub struct PlaylistStore {
    data_dir: PathBuf,
    played_path: PathBuf,
    queue_path: PathBuf,
    played_lock: Mutex<()>,
    queue_lock: Mutex<()>,
}

impl PlaylistStore {
    /// Establish the data directory holding `played.json` and `queue.json`.
    ///
    /// The directory is created lazily on first write.
    pub fn init(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        debug!("Playlist store at {}", data_dir.display());
        Self {
            played_path: data_dir.join(PLAYED_FILE),
            queue_path: data_dir.join(QUEUE_FILE),
            data_dir,
            played_lock: Mutex::new(()),
            queue_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Currently retained played items.
    ///
    /// A missing or corrupt file yields an empty list.
    pub fn played_items(&self) -> Result<Vec<PlayedItem>> {
        let _guard = lock(&self.played_lock);
        read_list(&self.played_path)
    }

    /// Append `item`, drop everything older than `retention`, rewrite the file.
    pub fn add_played_item(&self, item: PlayedItem, retention: Duration) -> Result<()> {
        let _guard = lock(&self.played_lock);

        let mut items: Vec<PlayedItem> = read_list(&self.played_path)?;
        items.push(item);

        let cutoff = time::retention_cutoff(retention);
        items.retain(|played| played.timestamp > cutoff);

        write_list(&self.played_path, &items)
    }

    /// Names of `item_type` entries played strictly after `now - within`.
    pub fn recently_played(&self, item_type: ItemType, within: Duration) -> Result<HashSet<String>> {
        let cutoff = time::retention_cutoff(within);
        Ok(self
            .played_items()?
            .into_iter()
            .filter(|played| played.item_type == item_type && played.timestamp > cutoff)
            .map(|played| played.name)
            .collect())
    }

    /// Append an item to the end of the queue.
    pub fn add_to_queue(&self, item: QueueItem) -> Result<()> {
        let _guard = lock(&self.queue_lock);

        let mut queue: Vec<QueueItem> = read_list(&self.queue_path)?;
        queue.push(item);

        write_list(&self.queue_path, &queue)
    }

    /// Pop the head of the queue and persist the remainder.
    ///
    /// Returns `None` when the queue is empty (or its file is missing/corrupt).
    pub fn next_queue_item(&self) -> Result<Option<QueueItem>> {
        let _guard = lock(&self.queue_lock);

        let mut queue: Vec<QueueItem> = read_list(&self.queue_path)?;
        if queue.is_empty() {
            return Ok(None);
        }

        let item = queue.remove(0);
        write_list(&self.queue_path, &queue)?;
        Ok(Some(item))
    }

    /// Snapshot of the queue in playback order. Does not modify it.
    pub fn queue_items(&self) -> Result<Vec<QueueItem>> {
        let _guard = lock(&self.queue_lock);
        read_list(&self.queue_path)
    }
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    // The guarded data is (), so a panic elsewhere cannot leave it inconsistent
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    // `null` is what an empty list looked like in older files
    match serde_json::from_slice::<Option<Vec<T>>>(&data) {
        Ok(items) => Ok(items.unwrap_or_default()),
        Err(e) => {
            warn!("Ignoring corrupt playlist file {}: {}", path.display(), e);
            Ok(Vec::new())
        }
    }
}

fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let data = serde_json::to_vec_pretty(items)?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    std::fs::write(path, data)?;
    Ok(())
}
