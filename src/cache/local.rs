//! Durable local cache backed by JSON slot files.
//!
//! One file per named slot under a configurable directory. The cache is
//! best-effort, never authoritative: every failure is logged and
//! swallowed, a read degrades to "cold" (`None`), and a failed write
//! leaves the previous slot contents intact (writes go through a temp
//! file and rename).

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{LogEntry, Note, TrackedEvent};
use crate::error::SyncError;

/// Slot holding the cached events collection.
const EVENTS_SLOT: &str = "events";
/// Slot holding the cached logs collection.
const LOGS_SLOT: &str = "logs";
/// Slot holding the cached notes collection.
const NOTES_SLOT: &str = "notes";
/// Slot holding the last successful full-sync timestamp.
const LAST_SYNC_SLOT: &str = "last_sync";
/// Slot holding the position preference overlay.
pub(crate) const POSITIONS_SLOT: &str = "event_positions";
/// Slot holding the color preference overlay.
pub(crate) const COLORS_SLOT: &str = "event_colors";
/// Slot holding the chart-type preference overlay.
pub(crate) const CHARTS_SLOT: &str = "chart_kinds";

/// Every slot the cache manages, for [`LocalCache::clear_all`].
const ALL_SLOTS: [&str; 7] = [
    EVENTS_SLOT,
    LOGS_SLOT,
    NOTES_SLOT,
    LAST_SYNC_SLOT,
    POSITIONS_SLOT,
    COLORS_SLOT,
    CHARTS_SLOT,
];

/// A full snapshot of one entity collection plus the time it was taken.
///
/// At most one page per entity kind exists at a time; refreshes replace
/// the whole page rather than patching items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage<T> {
    /// The snapshot contents.
    pub data: Vec<T>,
    /// When the snapshot was written.
    pub timestamp: DateTime<Utc>,
}

/// Durable key-value store over the named cache slots.
///
/// `None` from a collection getter means the slot was never written
/// (cold cache), as distinct from `Some(vec![])`, an empty collection
/// that has been fetched.
#[derive(Debug)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Creates a cache rooted at `dir`. The directory is created lazily
    /// on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the cached events collection, `None` when cold.
    pub async fn events(&self) -> Option<Vec<TrackedEvent>> {
        self.read_page(EVENTS_SLOT).await
    }

    /// Replaces the cached events collection.
    pub async fn set_events(&self, events: &[TrackedEvent]) {
        self.write_page(EVENTS_SLOT, events).await;
    }

    /// Reads the cached logs collection, `None` when cold.
    pub async fn logs(&self) -> Option<Vec<LogEntry>> {
        self.read_page(LOGS_SLOT).await
    }

    /// Replaces the cached logs collection.
    pub async fn set_logs(&self, logs: &[LogEntry]) {
        self.write_page(LOGS_SLOT, logs).await;
    }

    /// Reads the cached notes collection, `None` when cold.
    pub async fn notes(&self) -> Option<Vec<Note>> {
        self.read_page(NOTES_SLOT).await
    }

    /// Replaces the cached notes collection.
    pub async fn set_notes(&self, notes: &[Note]) {
        self.write_page(NOTES_SLOT, notes).await;
    }

    /// Reads the last successful full-sync timestamp.
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.read_slot(LAST_SYNC_SLOT).await
    }

    /// Records the last successful full-sync timestamp.
    pub async fn set_last_sync(&self, at: DateTime<Utc>) {
        self.write_slot(LAST_SYNC_SLOT, &at).await;
    }

    /// Removes every slot, preference overlays included.
    ///
    /// Invoked on sign-out and on a detected user-identity change so
    /// accounts sharing a device never see each other's data.
    pub async fn clear_all(&self) {
        for slot in ALL_SLOTS {
            let path = self.slot_path(slot);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(slot, error = %e, "failed to clear cache slot"),
            }
        }
    }

    /// Reads a collection page, returning its data.
    async fn read_page<T: DeserializeOwned>(&self, slot: &str) -> Option<Vec<T>> {
        self.read_slot::<CachedPage<T>>(slot).await.map(|p| p.data)
    }

    /// Wraps a collection in a timestamped page and writes it.
    async fn write_page<T: Serialize + Clone>(&self, slot: &str, data: &[T]) {
        let page = CachedPage {
            data: data.to_vec(),
            timestamp: Utc::now(),
        };
        self.write_slot(slot, &page).await;
    }

    /// Reads and decodes a slot. Missing file means cold; any other
    /// failure is logged and treated as cold.
    pub(crate) async fn read_slot<T: DeserializeOwned>(&self, slot: &str) -> Option<T> {
        let path = self.slot_path(slot);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(slot, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(slot, error = %e, "cache slot corrupted, treating as cold");
                None
            }
        }
    }

    /// Encodes and writes a slot; failures are logged, never raised.
    pub(crate) async fn write_slot<T: Serialize>(&self, slot: &str, value: &T) {
        if let Err(e) = self.try_write_slot(slot, value).await {
            tracing::warn!(slot, error = %e, "cache write failed");
        }
    }

    async fn try_write_slot<T: Serialize>(&self, slot: &str, value: &T) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let bytes =
            serde_json::to_vec(value).map_err(|e| SyncError::Serialization(e.to_string()))?;

        // Temp-file + rename so a crash mid-write never corrupts the slot.
        let final_path = self.slot_path(slot);
        let tmp_path = self.dir.join(format!("{slot}.json.tmp"));
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        Ok(())
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}
