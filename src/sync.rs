//! Sync-core assembly and session orchestration.
//!
//! [`SyncCore`] wires the cache, change bus, task runner, preference
//! overlays, and the three repositories over one backend, and owns the
//! session transitions: sign-in preloads all collections, a user change
//! clears the cache first, sign-out clears everything.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::domain::{ChangeBus, UserId};
use crate::prefs::{ChartPrefs, ColorPrefs, PositionPrefs};
use crate::remote::RemoteStore;
use crate::repo::{EventRepo, LogRepo, NoteRepo, RepoHandles};
use crate::session::Session;
use crate::tasks::TaskRunner;

/// Fully wired sync core shared by every view of the application.
#[derive(Debug)]
pub struct SyncCore {
    /// Events repository.
    pub events: Arc<EventRepo>,
    /// Logs repository.
    pub logs: Arc<LogRepo>,
    /// Notes repository.
    pub notes: Arc<NoteRepo>,
    /// Position preference overlay.
    pub positions: Arc<PositionPrefs>,
    /// Color preference overlay.
    pub colors: Arc<ColorPrefs>,
    /// Chart-type preference overlay.
    pub charts: Arc<ChartPrefs>,
    /// Change-notification bus for views to subscribe to.
    pub bus: ChangeBus,
    /// Current-user session handle.
    pub session: Session,
    /// Detached-task runner shared by all components.
    pub tasks: TaskRunner,
    /// Durable local cache.
    pub cache: Arc<LocalCache>,
}

impl SyncCore {
    /// Wires a sync core over the given backend.
    #[must_use]
    pub fn new(config: &SyncConfig, remote: Arc<dyn RemoteStore>) -> Self {
        let cache = Arc::new(LocalCache::new(config.cache_dir.clone()));
        let session = Session::new();
        let bus = ChangeBus::new(config.change_bus_capacity);
        let tasks = TaskRunner::new();

        let positions = Arc::new(PositionPrefs::new(Arc::clone(&cache)));
        let colors = Arc::new(ColorPrefs::new(
            Arc::clone(&cache),
            Arc::clone(&remote),
            session.clone(),
            tasks.clone(),
        ));
        let charts = Arc::new(ChartPrefs::new(Arc::clone(&cache)));

        let handles = RepoHandles {
            remote,
            cache: Arc::clone(&cache),
            session: session.clone(),
            bus: bus.clone(),
            tasks: tasks.clone(),
        };

        let events = Arc::new(EventRepo::new(
            handles.clone(),
            Arc::clone(&positions),
            Arc::clone(&colors),
            config.refresh_cooldown,
        ));
        let logs = Arc::new(LogRepo::new(handles.clone(), config.refresh_cooldown));
        let notes = Arc::new(NoteRepo::new(handles, config.refresh_cooldown));

        Self {
            events,
            logs,
            notes,
            positions,
            colors,
            charts,
            bus,
            session,
            tasks,
            cache,
        }
    }

    /// Refreshes all three collections in parallel and records the
    /// sync timestamp when every fetch succeeds.
    ///
    /// Best-effort: failures are logged and the stale (or cold) cache
    /// remains; preloading never blocks sign-in on an error.
    pub async fn preload_all(&self) {
        let (events, logs, notes) = tokio::join!(
            self.events.refresh(),
            self.logs.refresh(),
            self.notes.refresh(),
        );

        let mut all_ok = true;
        for (collection, result) in [("events", &events), ("logs", &logs), ("notes", &notes)] {
            if let Err(e) = result {
                all_ok = false;
                tracing::warn!(collection, error = %e, "preload fetch failed");
            }
        }

        if all_ok {
            self.cache.set_last_sync(Utc::now()).await;
            tracing::info!("preload complete");
        }
    }

    /// Applies a session transition reported by the auth layer.
    ///
    /// Switching directly between two different users clears the cache
    /// before any repository runs again, so accounts sharing a device
    /// never see each other's data. Any sign-in triggers a blocking
    /// preload.
    pub async fn handle_session_change(&self, next: Option<UserId>) {
        let previous = self.session.replace(next);

        if let (Some(previous), Some(next)) = (previous, next) {
            if previous != next {
                tracing::info!("user changed, clearing local cache");
                self.cache.clear_all().await;
            }
        }

        if next.is_some() {
            self.preload_all().await;
        }
    }

    /// Signs out: drops the session identity and clears every cache
    /// slot.
    pub async fn sign_out(&self) {
        self.session.replace(None);
        self.cache.clear_all().await;
    }

    /// When the last successful full preload finished, if ever.
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.cache.last_sync().await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventDraft, EventKind, LogDraft};
    use crate::remote::InMemoryRemote;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> SyncConfig {
        SyncConfig {
            cache_dir: dir.path().to_path_buf(),
            database_url: String::new(),
            database_max_connections: 1,
            database_min_connections: 1,
            database_connect_timeout_secs: 1,
            refresh_cooldown: Duration::from_secs(10),
            change_bus_capacity: 16,
        }
    }

    fn core_with_remote() -> (SyncCore, Arc<InMemoryRemote>, TempDir) {
        let Ok(dir) = TempDir::new() else {
            panic!("temp dir creation failed");
        };
        let remote = Arc::new(InMemoryRemote::new());
        let core = SyncCore::new(&config(&dir), Arc::<InMemoryRemote>::clone(&remote));
        (core, remote, dir)
    }

    fn count_draft(name: &str) -> EventDraft {
        EventDraft {
            event_name: name.to_string(),
            event_type: EventKind::Count,
            scale_label: None,
            scale_max: None,
            position: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn preload_populates_every_slot_and_last_sync() {
        let (core, remote, _dir) = core_with_remote();
        let user = UserId::new();
        let Ok(event) = remote.insert_event(user, count_draft("Push-ups")).await else {
            panic!("insert failed");
        };
        let Ok(_) = remote
            .insert_log(
                user,
                LogDraft {
                    event_id: event.id,
                    event_name: event.event_name.clone(),
                    value: 1.0,
                    log_date: None,
                },
            )
            .await
        else {
            panic!("insert failed");
        };

        core.handle_session_change(Some(user)).await;

        assert_eq!(core.cache.events().await.map(|e| e.len()), Some(1));
        assert_eq!(core.cache.logs().await.map(|l| l.len()), Some(1));
        assert_eq!(core.cache.notes().await.map(|n| n.len()), Some(0));
        assert!(core.last_sync().await.is_some());
    }

    #[tokio::test]
    async fn failed_preload_skips_the_sync_timestamp() {
        let (core, remote, _dir) = core_with_remote();
        remote.set_fail_reads(true);

        core.handle_session_change(Some(UserId::new())).await;

        assert!(core.last_sync().await.is_none());
        assert!(core.cache.events().await.is_none());
    }

    #[tokio::test]
    async fn sign_out_forces_the_next_list_to_refetch() {
        let (core, remote, _dir) = core_with_remote();
        let user = UserId::new();
        core.handle_session_change(Some(user)).await;
        let preload_selects = remote.event_selects();

        core.sign_out().await;
        assert!(core.cache.events().await.is_none());

        // Signed out: the refresh no-ops, the read serves an empty view.
        let Ok(listed) = core.events.list().await else {
            panic!("list failed");
        };
        assert!(listed.is_empty());
        assert_eq!(remote.event_selects(), preload_selects);

        // Signing back in fetches fresh.
        core.handle_session_change(Some(user)).await;
        assert!(remote.event_selects() > preload_selects);
    }

    #[tokio::test]
    async fn switching_users_clears_the_previous_account() {
        let (core, remote, _dir) = core_with_remote();
        let alice = UserId::new();
        let Ok(_) = remote.insert_event(alice, count_draft("Alice's")).await else {
            panic!("insert failed");
        };
        core.handle_session_change(Some(alice)).await;
        assert_eq!(core.cache.events().await.map(|e| e.len()), Some(1));
        core.positions.set(crate::domain::EventId::new(), 3).await;

        let bob = UserId::new();
        core.handle_session_change(Some(bob)).await;

        // Bob sees his own (empty) data and none of Alice's overlays.
        assert_eq!(core.cache.events().await.map(|e| e.len()), Some(0));
        assert!(core.positions.get_all().await.is_empty());
    }
}
