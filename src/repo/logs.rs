//! Log repository.
//!
//! Stale-while-revalidate reads over the cached logs collection, plus
//! filtered reads that answer from the cache immediately and reconcile
//! a narrower backend query into it by id in the background.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::RepoHandles;
use super::merge::{merge_by_id, remove_by_id, replace_by_id, sort_newest_first};
use super::refresh::RefreshCell;
use crate::domain::{EventId, LogDraft, LogEntry, LogId, LogPatch, LogQuery, UserId};
use crate::error::SyncError;

/// Repository for the logs collection.
#[derive(Debug)]
pub struct LogRepo {
    handles: RepoHandles,
    refresh: RefreshCell,
}

impl LogRepo {
    /// Creates the repository with its own refresh state.
    #[must_use]
    pub fn new(handles: RepoHandles, cooldown: Duration) -> Self {
        Self {
            handles,
            refresh: RefreshCell::new(cooldown),
        }
    }

    /// Lists all logs, newest first.
    ///
    /// Warm cache: returns immediately, refreshing in the background
    /// when the cooldown has elapsed. Cold cache: awaits the coalesced
    /// refresh.
    ///
    /// # Errors
    ///
    /// Only the cold-cache path can fail, when the awaited refresh
    /// fails with no snapshot to fall back on.
    pub async fn list(&self) -> Result<Vec<LogEntry>, SyncError> {
        if let Some(cached) = self.handles.cache.logs().await {
            if self.refresh.cooldown_elapsed() {
                let refresh = self.refresh.join_or_start(|| self.refresh_future());
                self.handles.tasks.spawn("logs.refresh", refresh);
            }
            return Ok(cached);
        }

        self.refresh.join_or_start(|| self.refresh_future()).await?;
        Ok(self.handles.cache.logs().await.unwrap_or_default())
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

    /// Lists the logs of one event.
    ///
    /// # Errors
    ///
    /// Propagates [`list`](Self::list) cold-cache errors.
    pub async fn list_by_event(&self, event_id: EventId) -> Result<Vec<LogEntry>, SyncError> {
        self.filtered_list(LogQuery::ForEvent(event_id)).await
    }

    /// Lists logs created inside the inclusive timestamp range.
    ///
    /// # Errors
    ///
    /// Propagates [`list`](Self::list) cold-cache errors.
    pub async fn list_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>, SyncError> {
        self.filtered_list(LogQuery::DateRange { start, end }).await
    }

    /// Lists logs whose denormalized event name matches exactly.
    ///
    /// # Errors
    ///
    /// Propagates [`list`](Self::list) cold-cache errors.
    pub async fn list_by_event_name(&self, name: &str) -> Result<Vec<LogEntry>, SyncError> {
        self.filtered_list(LogQuery::ForEventName(name.to_string()))
            .await
    }

    /// Creates a log entry: backend write first, then cache append.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn create(&self, draft: LogDraft) -> Result<LogEntry, SyncError> {
        let user = self.require_user()?;
        let created = self.handles.remote.insert_log(user, draft).await?;

        if let Some(mut cached) = self.handles.cache.logs().await {
            cached.push(created.clone());
            sort_newest_first(&mut cached);
            self.handles.cache.set_logs(&cached).await;
        }
        self.handles.bus.notify();
        Ok(created)
    }

    /// Updates a log entry: backend write first, then cache replace.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn update(&self, id: LogId, patch: LogPatch) -> Result<LogEntry, SyncError> {
        let user = self.require_user()?;
        let updated = self.handles.remote.update_log(user, id, patch).await?;

        if let Some(mut cached) = self.handles.cache.logs().await {
            replace_by_id(&mut cached, updated.clone());
            self.handles.cache.set_logs(&cached).await;
        }
        self.handles.bus.notify();
        Ok(updated)
    }

    /// Deletes a log entry: backend write first, then cache removal.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn delete(&self, id: LogId) -> Result<(), SyncError> {
        let user = self.require_user()?;
        self.handles.remote.delete_log(user, id).await?;

        if let Some(mut cached) = self.handles.cache.logs().await {
            remove_by_id(&mut cached, id);
            self.handles.cache.set_logs(&cached).await;
        }
        self.handles.bus.notify();
        Ok(())
    }

    /// Serves `query` from the cached snapshot and spawns a narrow
    /// backend query that merges into the cache by id. The narrow
    /// refresh is not coalesced with the full one.
    async fn filtered_list(&self, query: LogQuery) -> Result<Vec<LogEntry>, SyncError> {
        let snapshot = self.list().await?;
        self.spawn_filtered_refresh(query.clone());
        Ok(snapshot
            .into_iter()
            .filter(|entry| query.matches(entry))
            .collect())
    }

    fn spawn_filtered_refresh(&self, query: LogQuery) {
        let remote = Arc::clone(&self.handles.remote);
        let cache = Arc::clone(&self.handles.cache);
        let session = self.handles.session.clone();
        let bus = self.handles.bus.clone();
        self.handles.tasks.spawn("logs.filtered-refresh", async move {
            let Some(user) = session.current_user() else {
                return Ok(());
            };
            let incoming = remote.select_logs(user, &query).await?;
            let existing = cache.logs().await.unwrap_or_default();
            let merged = merge_by_id(existing, incoming);
            cache.set_logs(&merged).await;
            bus.notify();
            Ok(())
        });
    }

    /// Builds the owned full-refresh future: fetch the user's logs,
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
            let fresh = remote.select_logs(user, &LogQuery::All).await?;
            cache.set_logs(&fresh).await;
            bus.notify();
            Ok(())
        }
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
    use crate::domain::ChangeBus;
    use crate::remote::{InMemoryRemote, RemoteStore};
    use crate::session::Session;
    use crate::tasks::TaskRunner;
    use tempfile::TempDir;

    struct Rig {
        repo: LogRepo,
        remote: Arc<InMemoryRemote>,
        cache: Arc<LocalCache>,
        tasks: TaskRunner,
        user: UserId,
        _dir: TempDir,
    }

    fn rig() -> Rig {
        let Ok(dir) = TempDir::new() else {
            panic!("temp dir creation failed");
        };
        let cache = Arc::new(LocalCache::new(dir.path()));
        let remote = Arc::new(InMemoryRemote::new());
        let user = UserId::new();
        let tasks = TaskRunner::new();
        let handles = RepoHandles {
            remote: Arc::<InMemoryRemote>::clone(&remote),
            cache: Arc::clone(&cache),
            session: Session::signed_in(user),
            bus: ChangeBus::new(16),
            tasks: tasks.clone(),
        };
        let repo = LogRepo::new(handles, Duration::from_secs(10));
        Rig {
            repo,
            remote,
            cache,
            tasks,
            user,
            _dir: dir,
        }
    }

    fn draft(event_id: EventId, name: &str, value: f64) -> LogDraft {
        LogDraft {
            event_id,
            event_name: name.to_string(),
            value,
            log_date: None,
        }
    }

    #[tokio::test]
    async fn create_appends_to_the_warm_cache() {
        let r = rig();
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        let event_id = EventId::new();
        let Ok(created) = r.repo.create(draft(event_id, "Push-ups", 1.0)).await else {
            panic!("create failed");
        };

        assert_eq!(r.cache.logs().await, Some(vec![created]));
    }

    #[tokio::test]
    async fn filtered_read_serves_the_cache_and_merges_the_narrow_query() {
        let r = rig();
        let mine = EventId::new();
        let other = EventId::new();
        let Ok(wanted) = r.repo.create(draft(mine, "Run", 1.0)).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.create(draft(other, "Swim", 1.0)).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        // A row created elsewhere (another device) is invisible until
        // the narrow refresh merges it in.
        let Ok(elsewhere) = r.remote.insert_log(r.user, draft(mine, "Run", 2.0)).await else {
            panic!("insert failed");
        };

        let Ok(filtered) = r.repo.list_by_event(mine).await else {
            panic!("list_by_event failed");
        };
        assert_eq!(
            filtered.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![wanted.id]
        );

        r.tasks.drain().await;
        let Some(cached) = r.cache.logs().await else {
            panic!("cache is cold");
        };
        assert!(cached.iter().any(|l| l.id == elsewhere.id));
        // The unrelated event's log was not purged by the narrow merge.
        assert_eq!(cached.len(), 3);
    }

    #[tokio::test]
    async fn filtered_refresh_never_deletes_cache_entries() {
        let r = rig();
        let event_id = EventId::new();
        let Ok(created) = r.repo.create(draft(event_id, "Run", 1.0)).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        // Hard-delete server-side, bypassing the repository.
        let Ok(()) = r.remote.delete_log(r.user, created.id).await else {
            panic!("delete failed");
        };

        let Ok(_) = r.repo.list_by_event(event_id).await else {
            panic!("list_by_event failed");
        };
        r.tasks.drain().await;

        // Still cached: filtered merges are additive only.
        let Some(cached) = r.cache.logs().await else {
            panic!("cache is cold");
        };
        assert!(cached.iter().any(|l| l.id == created.id));
    }

    #[tokio::test]
    async fn list_by_date_range_filters_inclusively() {
        let r = rig();
        let event_id = EventId::new();
        let Ok(created) = r.repo.create(draft(event_id, "Run", 1.0)).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        let Ok(hits) = r
            .repo
            .list_by_date_range(created.created_at, created.created_at)
            .await
        else {
            panic!("list_by_date_range failed");
        };
        assert_eq!(hits.len(), 1);

        let Ok(misses) = r
            .repo
            .list_by_date_range(
                created.created_at + chrono::Duration::hours(1),
                created.created_at + chrono::Duration::hours(2),
            )
            .await
        else {
            panic!("list_by_date_range failed");
        };
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_the_cached_entry() {
        let r = rig();
        let event_id = EventId::new();
        let Ok(created) = r.repo.create(draft(event_id, "Run", 1.0)).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        let patch = LogPatch {
            value: Some(3.0),
            ..LogPatch::default()
        };
        let Ok(updated) = r.repo.update(created.id, patch).await else {
            panic!("update failed");
        };
        assert_eq!(updated.value, 3.0);

        let Some(cached) = r.cache.logs().await else {
            panic!("cache is cold");
        };
        assert_eq!(cached.iter().map(|l| l.value).collect::<Vec<_>>(), vec![3.0]);
    }

    #[tokio::test]
    async fn delete_removes_from_backend_and_cache() {
        let r = rig();
        let event_id = EventId::new();
        let Ok(created) = r.repo.create(draft(event_id, "Run", 1.0)).await else {
            panic!("create failed");
        };
        let Ok(_) = r.repo.list().await else {
            panic!("list failed");
        };

        let Ok(()) = r.repo.delete(created.id).await else {
            panic!("delete failed");
        };

        assert!(r.remote.logs_snapshot().is_empty());
        assert_eq!(r.cache.logs().await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn list_is_ordered_newest_first() {
        let r = rig();
        let event_id = EventId::new();
        let Ok(first) = r.repo.create(draft(event_id, "Run", 1.0)).await else {
            panic!("create failed");
        };
        // Later-created rows sort ahead of earlier ones.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let Ok(second) = r.repo.create(draft(event_id, "Run", 2.0)).await else {
            panic!("create failed");
        };

        let Ok(listed) = r.repo.list().await else {
            panic!("list failed");
        };
        assert_eq!(
            listed.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }
}
