//! Note repository.
//!
//! Same stale-while-revalidate shape as the other repositories, over
//! the chart-annotation notes collection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::RepoHandles;
use super::merge::{merge_by_id, remove_by_id, replace_by_id, sort_newest_first};
use super::refresh::RefreshCell;
use crate::domain::{EventId, Note, NoteDraft, NoteId, NotePatch, NoteQuery, UserId};
use crate::error::SyncError;

/// Repository for the notes collection.
#[derive(Debug)]
pub struct NoteRepo {
    handles: RepoHandles,
    refresh: RefreshCell,
}

impl NoteRepo {
    /// Creates the repository with its own refresh state.
    #[must_use]
    pub fn new(handles: RepoHandles, cooldown: Duration) -> Self {
        Self {
            handles,
            refresh: RefreshCell::new(cooldown),
        }
    }

    /// Lists all notes, newest first.
    ///
    /// Warm cache: returns immediately, refreshing in the background
    /// when the cooldown has elapsed. Cold cache: awaits the coalesced
    /// refresh.
    ///
    /// # Errors
    ///
    /// Only the cold-cache path can fail, when the awaited refresh
    /// fails with no snapshot to fall back on.
    pub async fn list(&self) -> Result<Vec<Note>, SyncError> {
        if let Some(cached) = self.handles.cache.notes().await {
            if self.refresh.cooldown_elapsed() {
                let refresh = self.refresh.join_or_start(|| self.refresh_future());
                self.handles.tasks.spawn("notes.refresh", refresh);
            }
            return Ok(cached);
        }

        self.refresh.join_or_start(|| self.refresh_future()).await?;
        Ok(self.handles.cache.notes().await.unwrap_or_default())
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

    /// Lists the notes annotating one event.
    ///
    /// # Errors
    ///
    /// Propagates [`list`](Self::list) cold-cache errors.
    pub async fn list_by_event(&self, event_id: EventId) -> Result<Vec<Note>, SyncError> {
        let query = NoteQuery::ForEvent(event_id);
        let snapshot = self.list().await?;
        self.spawn_filtered_refresh(query);
        Ok(snapshot
            .into_iter()
            .filter(|note| query.matches(note))
            .collect())
    }

    /// Fetches a single note by id directly from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error.
    pub async fn get_by_id(&self, id: NoteId) -> Result<Option<Note>, SyncError> {
        let user = self.require_user()?;
        self.handles.remote.fetch_note(user, id).await
    }

    /// Creates a note: backend write first, then cache append.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn create(&self, draft: NoteDraft) -> Result<Note, SyncError> {
        let user = self.require_user()?;
        let created = self.handles.remote.insert_note(user, draft).await?;

        if let Some(mut cached) = self.handles.cache.notes().await {
            cached.push(created.clone());
            sort_newest_first(&mut cached);
            self.handles.cache.set_notes(&cached).await;
        }
        self.handles.bus.notify();
        Ok(created)
    }

    /// Updates a note: backend write first, then cache replace.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn update(&self, id: NoteId, patch: NotePatch) -> Result<Note, SyncError> {
        let user = self.require_user()?;
        let updated = self.handles.remote.update_note(user, id, patch).await?;

        if let Some(mut cached) = self.handles.cache.notes().await {
            replace_by_id(&mut cached, updated.clone());
            self.handles.cache.set_notes(&cached).await;
        }
        self.handles.bus.notify();
        Ok(updated)
    }

    /// Deletes a note: backend write first, then cache removal.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] without a session, or the
    /// backend error; on failure no local state is mutated.
    pub async fn delete(&self, id: NoteId) -> Result<(), SyncError> {
        let user = self.require_user()?;
        self.handles.remote.delete_note(user, id).await?;

        if let Some(mut cached) = self.handles.cache.notes().await {
            remove_by_id(&mut cached, id);
            self.handles.cache.set_notes(&cached).await;
        }
        self.handles.bus.notify();
        Ok(())
    }

    fn spawn_filtered_refresh(&self, query: NoteQuery) {
        let remote = Arc::clone(&self.handles.remote);
        let cache = Arc::clone(&self.handles.cache);
        let session = self.handles.session.clone();
        let bus = self.handles.bus.clone();
        self.handles
            .tasks
            .spawn("notes.filtered-refresh", async move {
                let Some(user) = session.current_user() else {
                    return Ok(());
                };
                let incoming = remote.select_notes(user, &query).await?;
                let existing = cache.notes().await.unwrap_or_default();
                let merged = merge_by_id(existing, incoming);
                cache.set_notes(&merged).await;
                bus.notify();
                Ok(())
            });
    }

    /// Builds the owned full-refresh future: fetch the user's notes,
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
            let fresh = remote.select_notes(user, &NoteQuery::All).await?;
            cache.set_notes(&fresh).await;
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
