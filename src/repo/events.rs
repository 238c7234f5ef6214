//! Event repository.
//!
//! Stale-while-revalidate reads over the cached events collection, with
//! the position/color preference overlays composed on every read and
//! write-through mutations. Renaming an event backfills the
//! denormalized `event_name` on its logs through a detached,
//! best-effort backend write.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::RepoHandles;
use super::merge::{remove_by_id, replace_by_id};
use super::refresh::RefreshCell;
use crate::domain::{EventDraft, EventId, EventPatch, TrackedEvent, UserId};
use crate::error::SyncError;
use crate::prefs::{ColorPrefs, PositionPrefs};

/// Repository for the events collection.
#[derive(Debug)]
pub struct EventRepo {
    handles: RepoHandles,
    positions: Arc<PositionPrefs>,
    colors: Arc<ColorPrefs>,
    refresh: RefreshCell,
}

impl EventRepo {
    /// Creates the repository with its own refresh state.
    #[must_use]
    pub fn new(
        handles: RepoHandles,
        positions: Arc<PositionPrefs>,
        colors: Arc<ColorPrefs>,
        cooldown: Duration,
    ) -> Self {
        Self {
            handles,
            positions,
            colors,
            refresh: RefreshCell::new(cooldown),
        }
    }

    /// Lists all events, overlay-composed and sorted by position.
    ///
    /// Warm cache: returns immediately, starting (or joining) a
    /// background refresh only when the cooldown has elapsed. Cold
    /// cache: awaits the coalesced refresh, then serves the populated
    /// cache.
    ///
    /// # Errors
    ///
    /// Only the cold-cache path can fail, when the awaited refresh
    /// fails with no snapshot to fall back on.
    pub async fn list(&self) -> Result<Vec<TrackedEvent>, SyncError> {
        if let Some(cached) = self.handles.cache.events().await {
            if self.refresh.cooldown_elapsed() {
                let refresh = self.refresh.join_or_start(|| self.refresh_future());
                self.handles.tasks.spawn("events.refresh", refresh);
            }
            return Ok(self.compose(cached).await);
        }

        self.refresh.join_or_start(|| self.refresh_future()).await?;
        let populated = self.handles.cache.events().await.unwrap_or_default();
        Ok(self.compose(populated).await)
    }

    /// Forces a full refresh, joining any refresh already in flight.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the fetch fails; the previous
    /// cached snapshot stays intact.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.refresh.join_or_start(|| self.refresh_future()).await
    }

    /// Fetches a single event by id directly from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error.
    pub async fn get_by_id(&self, id: EventId) -> Result<Option<TrackedEvent>, SyncError> {
        let user = self.require_user()?;
        self.handles.remote.fetch_event(user, id).await
    }

    /// Fetches a single event by exact name directly from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<TrackedEvent>, SyncError> {
        let user = self.require_user()?;
        self.handles.remote.fetch_event_by_name(user, name).await
    }

    /// Creates an event: backend write first, then cache append.
    ///
    /// A cold cache is left cold; the next `list()` fetches fresh.
    ///
    /// # Errors
    ///
    /// Returns validation or backend errors; on failure no local state
    /// is mutated.
    pub async fn create(&self, draft: EventDraft) -> Result<TrackedEvent, SyncError> {
        draft.validate()?;
        let user = self.require_user()?;
        let created = self.handles.remote.insert_event(user, draft).await?;

        if let Some(mut cached) = self.handles.cache.events().await {
            cached.push(created.clone());
            self.handles.cache.set_events(&cached).await;
        }
        self.handles.bus.notify();
        tracing::info!(event = %created.id, name = %created.event_name, "event created");
        Ok(created)
    }

    /// Updates an event: backend write first, then cache replace.
    ///
    /// When the patch renames the event, the denormalized `event_name`
    /// on its logs is backfilled through a detached backend write whose
    /// failure is logged, never raised. The logs cache is allowed to
    /// lag until its next refresh.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn update(&self, id: EventId, patch: EventPatch) -> Result<TrackedEvent, SyncError> {
        let user = self.require_user()?;
        let previous = self.handles.remote.fetch_event(user, id).await?;
        let updated = self.handles.remote.update_event(user, id, patch).await?;

        if let Some(previous) = previous {
            if previous.event_name != updated.event_name {
                let remote = Arc::clone(&self.handles.remote);
                let new_name = updated.event_name.clone();
                self.handles.tasks.spawn("events.rename-backfill", async move {
                    let touched = remote.rename_log_events(user, id, &new_name).await?;
                    tracing::debug!(event = %id, touched, "backfilled event_name on logs");
                    Ok(())
                });
            }
        }

        if let Some(mut cached) = self.handles.cache.events().await {
            replace_by_id(&mut cached, updated.clone());
            self.handles.cache.set_events(&cached).await;
        }
        self.handles.bus.notify();
        Ok(updated)
    }

    /// Deletes an event: backend write first, then cache removal.
    ///
    /// Logs and notes referencing the event are left untouched, in the
    /// cache and the backend alike.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn delete(&self, id: EventId) -> Result<(), SyncError> {
        let user = self.require_user()?;
        self.handles.remote.delete_event(user, id).await?;

        if let Some(mut cached) = self.handles.cache.events().await {
            remove_by_id(&mut cached, id);
            self.handles.cache.set_events(&cached).await;
        }
        self.handles.bus.notify();
        tracing::info!(event = %id, "event deleted");
        Ok(())
    }

    /// Swaps the composed positions of two events.
    ///
    /// The swapped values land in the position overlay before this
    /// returns, so the very next read reflects the new order; two
    /// detached backend updates persist the swap eventually. The change
    /// notification fires immediately after the overlay write.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EventNotFound`] when either id is missing
    /// from the cached collection.
    pub async fn swap_positions(&self, a: EventId, b: EventId) -> Result<(), SyncError> {
        let cached = self.handles.cache.events().await.unwrap_or_default();
        let composed = self.compose(cached).await;
        let position_of = |id: EventId| {
            composed
                .iter()
                .find(|e| e.id == id)
                .map(|e| e.position)
                .ok_or(SyncError::EventNotFound(id))
        };
        let pos_a = position_of(a)?;
        let pos_b = position_of(b)?;

        self.positions.set(a, pos_b).await;
        self.positions.set(b, pos_a).await;

        self.spawn_position_push(a, pos_b);
        self.spawn_position_push(b, pos_a);

        self.handles.bus.notify();
        Ok(())
    }

    /// Moves the event at `index` one place up in `ordered`.
    /// No-op at the top of the list.
    ///
    /// # Errors
    ///
    /// Propagates [`swap_positions`](Self::swap_positions) errors.
    pub async fn move_up(
        &self,
        ordered: &[TrackedEvent],
        index: usize,
    ) -> Result<(), SyncError> {
        if index == 0 {
            return Ok(());
        }
        let (Some(current), Some(above)) = (ordered.get(index), ordered.get(index - 1)) else {
            return Ok(());
        };
        self.swap_positions(current.id, above.id).await
    }

    /// Moves the event at `index` one place down in `ordered`.
    /// No-op at the bottom of the list.
    ///
    /// # Errors
    ///
    /// Propagates [`swap_positions`](Self::swap_positions) errors.
    pub async fn move_down(
        &self,
        ordered: &[TrackedEvent],
        index: usize,
    ) -> Result<(), SyncError> {
        let Some(below_index) = index.checked_add(1) else {
            return Ok(());
        };
        let (Some(current), Some(below)) = (ordered.get(index), ordered.get(below_index)) else {
            return Ok(());
        };
        self.swap_positions(current.id, below.id).await
    }

    /// Pushes the whole position overlay to the backend.
    ///
    /// Best-effort: per-item failures are logged and skipped, never
    /// raised, never retried.
    pub async fn sync_positions_to_database(&self) {
        let Some(user) = self.handles.session.current_user() else {
            return;
        };
        for (id, position) in self.positions.get_all().await {
            if let Err(e) = self
                .handles
                .remote
                .update_event(user, id, EventPatch::position(position))
                .await
            {
                tracing::warn!(event = %id, error = %e, "position sync failed");
            }
        }
    }

    /// Builds the owned full-refresh future: fetch the user's events,
    /// replace the cached snapshot, notify. No-op without a session.
    fn refresh_future(&self) -> impl Future<Output = Result<(), SyncError>> + Send + 'static {
        let remote = Arc::clone(&self.handles.remote);
        let cache = Arc::clone(&self.handles.cache);
        let session = self.handles.session.clone();
        let bus = self.handles.bus.clone();
        async move {
            let Some(user) = session.current_user() else {
                return Ok(());
            };
            let fresh = remote.select_events(user).await?;
            cache.set_events(&fresh).await;
            bus.notify();
            Ok(())
        }
    }

    /// Applies the position/color overlays and re-sorts by the composed
    /// position. Runs on every read so a local preference is visible
    /// before the backend push completes.
    async fn compose(&self, mut events: Vec<TrackedEvent>) -> Vec<TrackedEvent> {
        let positions = self.positions.get_all().await;
        let colors = self.colors.get_all().await;
        for event in &mut events {
            if let Some(position) = positions.get(&event.id) {
                event.position = *position;
            }
            if let Some(color) = colors.get(&event.id) {
                event.color.clone_from(color);
            }
        }
        events.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        events
    }

    fn spawn_position_push(&self, id: EventId, position: i32) {
        let remote = Arc::clone(&self.handles.remote);
        let session = self.handles.session.clone();
        self.handles.tasks.spawn("events.position-sync", async move {
            let Some(user) = session.current_user() else {
                return Ok(());
            };
            remote
                .update_event(user, id, EventPatch::position(position))
                .await
                .map(|_| ())
        });
    }

    fn require_user(&self) -> Result<UserId, SyncError> {
        self.handles
            .session
            .current_user()
            .ok_or(SyncError::NotSignedIn)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use crate::domain::{ChangeBus, EventKind, LogDraft};
    use crate::remote::{InMemoryRemote, RemoteStore};
    use crate::session::Session;
    use crate::tasks::TaskRunner;
    use tempfile::TempDir;

    struct Rig {
        repo: EventRepo,
        remote: Arc<InMemoryRemote>,
        cache: Arc<LocalCache>,
        tasks: TaskRunner,
        session: Session,
        user: crate::domain::UserId,
        _dir: TempDir,
    }

    fn rig() -> Rig {
        let Ok(dir) = TempDir::new() else {
            panic!("temp dir creation failed");
        };
        let cache = Arc::new(LocalCache::new(dir.path()));
        let remote = Arc::new(InMemoryRemote::new());
        let user = crate::domain::UserId::new();
        let session = Session::signed_in(user);
        let tasks = TaskRunner::new();
        let bus = ChangeBus::new(16);
        let positions = Arc::new(PositionPrefs::new(Arc::clone(&cache)));
        let colors = Arc::new(ColorPrefs::new(
            Arc::clone(&cache),
            Arc::<InMemoryRemote>::clone(&remote),
            session.clone(),
            tasks.clone(),
        ));
        let handles = RepoHandles {
            remote: Arc::<InMemoryRemote>::clone(&remote),
            cache: Arc::clone(&cache),
            session: session.clone(),
            bus,
            tasks: tasks.clone(),
        };
        let repo = EventRepo::new(handles, positions, colors, Duration::from_secs(10));
        Rig {
            repo,
            remote,
            cache,
            tasks,
            session,
            user,
            _dir: dir,
        }
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
    async fn create_then_list_returns_the_created_event() {
        let r = rig();
        let Ok(created) = r.repo.create(count_draft("Push-ups")).await else {
            panic!("create failed");
        };

        let Ok(listed) = r.repo.list().await else {
            panic!("list failed");
        };
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.first().map(|e| e.id), Some(created.id));
    }

    #[tokio::test]
    async fn warm_cache_within_cooldown_issues_no_fetch() {
        let r = rig();
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };
        assert_eq!(r.remote.event_selects(), 1);

        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };
        r.tasks.drain().await;
        assert_eq!(r.remote.event_selects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_cooldown_refreshes_in_the_background() {
        let r = rig();
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };
        assert_eq!(r.remote.event_selects(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };
        r.tasks.drain().await;
        assert_eq!(r.remote.event_selects(), 2);
    }

    #[tokio::test]
    async fn concurrent_cold_lists_share_one_fetch() {
        let r = rig();
        r.remote.set_latency(Some(Duration::from_millis(50)));

        let (a, b) = tokio::join!(r.repo.list(), r.repo.list());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(r.remote.event_selects(), 1);
    }

    #[tokio::test]
    async fn overlays_override_backend_values_and_resort() {
        let r = rig();
        let Ok(first) = r.repo.create(count_draft("Push-ups")).await else {
            panic!("create failed");
        };
        let Ok(second) = r.repo.create(count_draft("Sleep")).await else {
            panic!("create failed");
        };

        // Push the first event below the second locally only.
        r.repo.positions.set(first.id, 99).await;
        r.repo.colors.set(first.id, "#EF4444".to_string()).await;

        let Ok(listed) = r.repo.list().await else {
            panic!("list failed");
        };
        assert_eq!(
            listed.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        let Some(composed_first) = listed.iter().find(|e| e.id == first.id) else {
            panic!("first event missing");
        };
        assert_eq!(composed_first.position, 99);
        assert_eq!(composed_first.color, "#EF4444");
    }

    #[tokio::test]
    async fn swap_positions_is_visible_before_the_backend_write() {
        let r = rig();
        let Ok(first) = r.repo.create(count_draft("Push-ups")).await else {
            panic!("create failed");
        };
        let Ok(second) = r.repo.create(count_draft("Sleep")).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        // Stall the backend so the detached position pushes cannot land.
        r.remote.set_fail_writes(true);
        let Ok(()) = r.repo.swap_positions(first.id, second.id).await else {
            panic!("swap failed");
        };

        let Ok(listed) = r.repo.list().await else {
            panic!("list failed");
        };
        assert_eq!(
            listed.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        // Once the backend recovers, a later swap persists both rows.
        r.tasks.drain().await;
        r.remote.set_fail_writes(false);
        let Ok(()) = r.repo.swap_positions(first.id, second.id).await else {
            panic!("swap failed");
        };
        r.tasks.drain().await;
        let mut backend = r.remote.events_snapshot();
        backend.sort_by_key(|e| e.position);
        assert_eq!(
            backend.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }

    #[tokio::test]
    async fn move_up_at_top_and_move_down_at_bottom_are_noops() {
        let r = rig();
        let Ok(_) = r.repo.create(count_draft("Push-ups")).await else {
            panic!("create failed");
        };
        let Ok(ordered) = r.repo.list().await else {
            panic!("list failed");
        };

        let Ok(()) = r.repo.move_up(&ordered, 0).await else {
            panic!("move_up failed");
        };
        let Ok(()) = r.repo.move_down(&ordered, ordered.len() - 1).await else {
            panic!("move_down failed");
        };
        assert!(r.repo.positions.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn rename_backfills_denormalized_log_names() {
        let r = rig();
        let Ok(event) = r.repo.create(count_draft("Run")).await else {
            panic!("create failed");
        };
        for _ in 0..2 {
            let Ok(_) = r
                .remote
                .insert_log(
                    r.user,
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
        }

        let patch = EventPatch {
            event_name: Some("Jog".to_string()),
            ..EventPatch::default()
        };
        let Ok(_) = r.repo.update(event.id, patch).await else {
            panic!("update failed");
        };
        r.tasks.drain().await;

        assert!(
            r.remote
                .logs_snapshot()
                .iter()
                .all(|l| l.event_name == "Jog")
        );
    }

    #[tokio::test]
    async fn delete_leaves_dependent_logs_in_place() {
        let r = rig();
        let Ok(event) = r.repo.create(count_draft("Run")).await else {
            panic!("create failed");
        };
        let Ok(log) = r
            .remote
            .insert_log(
                r.user,
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
        r.cache.set_logs(&[log.clone()]).await;

        let Ok(()) = r.repo.delete(event.id).await else {
            panic!("delete failed");
        };

        assert_eq!(r.remote.logs_snapshot(), vec![log.clone()]);
        assert_eq!(r.cache.logs().await, Some(vec![log]));
    }

    #[tokio::test]
    async fn cold_cache_with_failing_backend_surfaces_the_error() {
        let r = rig();
        r.remote.set_fail_reads(true);
        assert!(r.repo.list().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_background_refresh_keeps_the_stale_snapshot() {
        let r = rig();
        let Ok(created) = r.repo.create(count_draft("Push-ups")).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        tokio::time::advance(Duration::from_secs(10)).await;
        r.remote.set_fail_reads(true);
        let Ok(listed) = r.repo.list().await else {
            panic!("list failed");
        };
        r.tasks.drain().await;

        assert_eq!(listed.first().map(|e| e.id), Some(created.id));
        assert_eq!(
            r.cache.events().await.map(|events| events.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn failed_create_mutates_nothing_locally() {
        let r = rig();
        let Ok(_) = r.repo.create(count_draft("Push-ups")).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        r.remote.set_fail_writes(true);
        assert!(r.repo.create(count_draft("Sleep")).await.is_err());
        assert_eq!(
            r.cache.events().await.map(|events| events.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn mutations_require_a_session() {
        let r = rig();
        r.session.replace(None);
        assert_eq!(
            r.repo.create(count_draft("Push-ups")).await,
            Err(SyncError::NotSignedIn)
        );
    }

    #[tokio::test]
    async fn sync_positions_pushes_the_whole_overlay() {
        let r = rig();
        let Ok(event) = r.repo.create(count_draft("Push-ups")).await else {
            panic!("create failed");
        };
        r.repo.positions.set(event.id, 42).await;

        r.repo.sync_positions_to_database().await;

        let positions: Vec<i32> = r
            .remote
            .events_snapshot()
            .into_iter()
            .map(|e| e.position)
            .collect();
        assert_eq!(positions, vec![42]);
    }

    #[tokio::test]
    async fn get_by_name_misses_return_none() {
        let r = rig();
        let Ok(found) = r.repo.get_by_name("Nope").await else {
            panic!("get_by_name failed");
        };
        assert!(found.is_none());
    }
}
