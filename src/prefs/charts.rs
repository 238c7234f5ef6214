//! Chart-type preference overlay.
//!
//! Remembers how the user wants each event's history rendered. Pure
//! local preference, never pushed to the backend.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::PrefSlot;
use crate::cache::LocalCache;
use crate::cache::local::CHARTS_SLOT;
use crate::domain::EventId;

/// How an event's history chart is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Connected line chart.
    Line,
    /// Per-period bar chart.
    Bar,
}

/// Locally-authoritative `EventId -> chart kind` map.
#[derive(Debug)]
pub struct ChartPrefs {
    slot: PrefSlot<ChartKind>,
}

impl ChartPrefs {
    /// Creates the overlay over the given cache.
    #[must_use]
    pub fn new(cache: Arc<LocalCache>) -> Self {
        Self {
            slot: PrefSlot::new(cache, CHARTS_SLOT),
        }
    }

    /// Returns the preferred chart kind for `id`, if one is set.
    pub async fn get(&self, id: EventId) -> Option<ChartKind> {
        self.slot.get(id).await
    }

    /// Sets the preferred chart kind for `id`. Durable before returning.
    pub async fn set(&self, id: EventId, kind: ChartKind) {
        self.slot.set(id, kind).await;
    }

    /// Clears the preference for `id`, reverting to the UI default.
    pub async fn remove(&self, id: EventId) {
        self.slot.remove(id).await;
    }

    /// Returns the whole overlay map.
    pub async fn get_all(&self) -> HashMap<EventId, ChartKind> {
        self.slot.get_all().await
    }
}
