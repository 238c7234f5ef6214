//! Preference overlays: locally-authoritative per-event overrides.
//!
//! Each overlay is a small `EventId -> value` map persisted in its own
//! [`LocalCache`] slot. At read time the event repository composes
//! overlay values over the backend-sourced fields, so a preference set
//! locally is visible immediately, before (and regardless of) the
//! best-effort push to the backend.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::LocalCache;
use crate::domain::EventId;

pub mod charts;
pub mod colors;
pub mod positions;

pub use charts::{ChartKind, ChartPrefs};
pub use colors::{ColorPrefs, DEFAULT_COLOR, DEFAULT_COLORS};
pub use positions::PositionPrefs;

/// A typed overlay map stored in one cache slot.
///
/// `set` completes its durable write before returning, which is what
/// gives `swap_positions` its instant-local-effect guarantee.
#[derive(Debug)]
pub(crate) struct PrefSlot<V> {
    cache: Arc<LocalCache>,
    slot: &'static str,
    _marker: PhantomData<fn() -> V>,
}

impl<V> PrefSlot<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    pub(crate) fn new(cache: Arc<LocalCache>, slot: &'static str) -> Self {
        Self {
            cache,
            slot,
            _marker: PhantomData,
        }
    }

    pub(crate) async fn get(&self, id: EventId) -> Option<V> {
        self.load().await.remove(&id)
    }

    pub(crate) async fn set(&self, id: EventId, value: V) {
        let mut map = self.load().await;
        map.insert(id, value);
        self.store(&map).await;
    }

    pub(crate) async fn remove(&self, id: EventId) {
        let mut map = self.load().await;
        if map.remove(&id).is_some() {
            self.store(&map).await;
        }
    }

    pub(crate) async fn get_all(&self) -> HashMap<EventId, V> {
        self.load().await
    }

    pub(crate) async fn set_all(&self, map: &HashMap<EventId, V>) {
        self.store(map).await;
    }

    async fn load(&self) -> HashMap<EventId, V> {
        self.cache.read_slot(self.slot).await.unwrap_or_default()
    }

    async fn store(&self, map: &HashMap<EventId, V>) {
        self.cache.write_slot(self.slot, map).await;
    }
}
