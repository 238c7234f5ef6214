//! Color preference overlay.
//!
//! Overrides an event's chart/list color locally and opportunistically
//! pushes the new color to the backend's `color` column through a
//! detached task; the local write never waits on the network.

use std::collections::HashMap;
use std::sync::Arc;

use super::PrefSlot;
use crate::cache::LocalCache;
use crate::cache::local::COLORS_SLOT;
use crate::domain::{EventId, EventPatch};
use crate::remote::RemoteStore;
use crate::session::Session;
use crate::tasks::TaskRunner;

/// Fallback color used when an event has no explicit color anywhere.
pub const DEFAULT_COLOR: &str = "#000000";

/// Picker palette offered by the UI; `DEFAULT_COLOR` comes first.
pub const DEFAULT_COLORS: [&str; 8] = [
    DEFAULT_COLOR,
    "#3B82F6", // blue
    "#10B981", // green
    "#F59E0B", // amber
    "#EF4444", // red
    "#8B5CF6", // purple
    "#EC4899", // pink
    "#06B6D4", // cyan
];

/// Locally-authoritative `EventId -> hex color` map with best-effort
/// backend push.
#[derive(Debug)]
pub struct ColorPrefs {
    slot: PrefSlot<String>,
    remote: Arc<dyn RemoteStore>,
    session: Session,
    tasks: TaskRunner,
}

impl ColorPrefs {
    /// Creates the overlay over the given cache and backend handles.
    #[must_use]
    pub fn new(
        cache: Arc<LocalCache>,
        remote: Arc<dyn RemoteStore>,
        session: Session,
        tasks: TaskRunner,
    ) -> Self {
        Self {
            slot: PrefSlot::new(cache, COLORS_SLOT),
            remote,
            session,
            tasks,
        }
    }

    /// Returns the overridden color for `id`, if one is set.
    pub async fn get(&self, id: EventId) -> Option<String> {
        self.slot.get(id).await
    }

    /// Overrides the color for `id`.
    ///
    /// The durable local write completes before this returns; the
    /// backend update runs detached and its failure is only logged.
    pub async fn set(&self, id: EventId, color: String) {
        self.slot.set(id, color.clone()).await;

        let remote = Arc::clone(&self.remote);
        let session = self.session.clone();
        self.tasks.spawn("colors.push", async move {
            let Some(user) = session.current_user() else {
                return Ok(());
            };
            remote
                .update_event(user, id, EventPatch::color(color))
                .await
                .map(|_| ())
        });
    }

    /// Returns the whole overlay map.
    pub async fn get_all(&self) -> HashMap<EventId, String> {
        self.slot.get_all().await
    }
}
