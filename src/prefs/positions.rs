//! Position preference overlay.
//!
//! Overrides an event's sort position locally. `swap_positions` writes
//! here first so reordering takes effect on the very next read; the
//! backend catches up through detached updates.

use std::collections::HashMap;
use std::sync::Arc;

use super::PrefSlot;
use crate::cache::LocalCache;
use crate::cache::local::POSITIONS_SLOT;
use crate::domain::EventId;

/// Locally-authoritative `EventId -> position` map.
#[derive(Debug)]
pub struct PositionPrefs {
    slot: PrefSlot<i32>,
}

impl PositionPrefs {
    /// Creates the overlay over the given cache.
    #[must_use]
    pub fn new(cache: Arc<LocalCache>) -> Self {
        Self {
            slot: PrefSlot::new(cache, POSITIONS_SLOT),
        }
    }

    /// Returns the overridden position for `id`, if one is set.
    pub async fn get(&self, id: EventId) -> Option<i32> {
        self.slot.get(id).await
    }

    /// Overrides the position for `id`. Durable before returning.
    pub async fn set(&self, id: EventId, position: i32) {
        self.slot.set(id, position).await;
    }

    /// Returns the whole overlay map.
    pub async fn get_all(&self) -> HashMap<EventId, i32> {
        self.slot.get_all().await
    }

    /// Replaces the whole overlay map (bulk renumbering).
    pub async fn set_all(&self, positions: &HashMap<EventId, i32>) {
        self.slot.set_all(positions).await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_prefs() -> (PositionPrefs, TempDir) {
        let Ok(dir) = TempDir::new() else {
            panic!("temp dir creation failed");
        };
        let cache = Arc::new(LocalCache::new(dir.path()));
        (PositionPrefs::new(cache), dir)
    }

    #[tokio::test]
    async fn unset_id_reads_none() {
        let (prefs, _dir) = temp_prefs();
        assert_eq!(prefs.get(EventId::new()).await, None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (prefs, _dir) = temp_prefs();
        let id = EventId::new();
        prefs.set(id, 7).await;
        assert_eq!(prefs.get(id).await, Some(7));
    }

    #[tokio::test]
    async fn set_all_replaces_the_map() {
        let (prefs, _dir) = temp_prefs();
        let stale = EventId::new();
        prefs.set(stale, 1).await;

        let fresh = EventId::new();
        prefs.set_all(&HashMap::from([(fresh, 0)])).await;

        assert_eq!(prefs.get(stale).await, None);
        assert_eq!(prefs.get(fresh).await, Some(0));
    }
}
