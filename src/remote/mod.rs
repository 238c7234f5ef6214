//! Remote data source: the authenticated backend query interface.
//!
//! [`RemoteStore`] is the narrow surface the sync core consumes: per
//! table: list/filter, insert, patch-update, delete, all scoped to one
//! user. The backend is authoritative for ids, timestamps, and
//! last-writer-wins conflict resolution. Two implementations ship:
//! [`PostgresRemote`](postgres::PostgresRemote) for production and
//! [`InMemoryRemote`](memory::InMemoryRemote) for tests.

use std::fmt;

use async_trait::async_trait;

use crate::domain::{
    EventDraft, EventId, EventPatch, LogDraft, LogEntry, LogId, LogPatch, LogQuery, Note,
    NoteDraft, NoteId, NotePatch, NoteQuery, TrackedEvent, UserId,
};
use crate::error::SyncError;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRemote;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRemote;

/// Authenticated backend CRUD surface over the three tables.
///
/// Implementations must enforce per-user row isolation: every operation
/// receives the acting [`UserId`] and may only touch that user's rows.
/// A failed write is never silently dropped.
///
/// # Errors
///
/// Every operation returns [`SyncError::Backend`] when the backend
/// rejects or cannot serve the request; reads of a missing row return
/// `Ok(None)` rather than an error.
#[async_trait]
pub trait RemoteStore: fmt::Debug + Send + Sync {
    /// Lists all events for `user`, ordered by `position` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] on backend failure.
    async fn select_events(&self, user: UserId) -> Result<Vec<TrackedEvent>, SyncError>;

    /// Fetches a single event by id, `None` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] on backend failure.
    async fn fetch_event(
        &self,
        user: UserId,
        id: EventId,
    ) -> Result<Option<TrackedEvent>, SyncError>;

    /// Fetches a single event by exact name, `None` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] on backend failure.
    async fn fetch_event_by_name(
        &self,
        user: UserId,
        name: &str,
    ) -> Result<Option<TrackedEvent>, SyncError>;

    /// Inserts a new event, returning the stored row with its
    /// backend-assigned id, timestamp, and defaulted position/color.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the write is rejected.
    async fn insert_event(
        &self,
        user: UserId,
        draft: EventDraft,
    ) -> Result<TrackedEvent, SyncError>;

    /// Applies a patch to an event, returning the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the row is missing or the
    /// write is rejected.
    async fn update_event(
        &self,
        user: UserId,
        id: EventId,
        patch: EventPatch,
    ) -> Result<TrackedEvent, SyncError>;

    /// Deletes an event. Logs and notes referencing it are left in
    /// place; deletion never cascades.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the write is rejected.
    async fn delete_event(&self, user: UserId, id: EventId) -> Result<(), SyncError>;

    /// Rewrites the denormalized `event_name` on every log referencing
    /// `event_id`, returning the number of rows touched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the write is rejected.
    async fn rename_log_events(
        &self,
        user: UserId,
        event_id: EventId,
        new_name: &str,
    ) -> Result<u64, SyncError>;

    /// Lists logs matching `query`, ordered by `created_at` descending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] on backend failure.
    async fn select_logs(&self, user: UserId, query: &LogQuery)
    -> Result<Vec<LogEntry>, SyncError>;

    /// Inserts a new log entry, returning the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the write is rejected.
    async fn insert_log(&self, user: UserId, draft: LogDraft) -> Result<LogEntry, SyncError>;

    /// Applies a patch to a log entry, returning the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the row is missing or the
    /// write is rejected.
    async fn update_log(
        &self,
        user: UserId,
        id: LogId,
        patch: LogPatch,
    ) -> Result<LogEntry, SyncError>;

    /// Deletes a log entry.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the write is rejected.
    async fn delete_log(&self, user: UserId, id: LogId) -> Result<(), SyncError>;

    /// Lists notes matching `query`, ordered by `created_at` descending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] on backend failure.
    async fn select_notes(&self, user: UserId, query: &NoteQuery) -> Result<Vec<Note>, SyncError>;

    /// Fetches a single note by id, `None` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] on backend failure.
    async fn fetch_note(&self, user: UserId, id: NoteId) -> Result<Option<Note>, SyncError>;

    /// Inserts a new note, returning the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the write is rejected.
    async fn insert_note(&self, user: UserId, draft: NoteDraft) -> Result<Note, SyncError>;

    /// Applies a patch to a note, returning the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the row is missing or the
    /// write is rejected.
    async fn update_note(
        &self,
        user: UserId,
        id: NoteId,
        patch: NotePatch,
    ) -> Result<Note, SyncError>;

    /// Deletes a note.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the write is rejected.
    async fn delete_note(&self, user: UserId, id: NoteId) -> Result<(), SyncError>;
}
