//! PostgreSQL implementation of the remote data source.
//!
//! Thin CRUD over the three hosted tables using `sqlx::PgPool`. The
//! backend is authoritative: ids, timestamps, and defaulted
//! position/color values are assigned server-side, and every statement
//! is scoped by `user_id`. Patch updates use `COALESCE` so `None`
//! fields leave the stored column unchanged.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::RemoteStore;
use crate::config::SyncConfig;
use crate::domain::{
    EventDraft, EventId, EventPatch, LogDraft, LogEntry, LogId, LogPatch, LogQuery, Note,
    NoteDraft, NoteId, NotePatch, NoteQuery, TrackedEvent, UserId,
};
use crate::error::SyncError;
use crate::prefs::colors::DEFAULT_COLOR;

/// Raw `events` row tuple in column order.
type EventRow = (
    Uuid,
    DateTime<Utc>,
    String,
    String,
    Option<String>,
    Option<i32>,
    i32,
    String,
    Uuid,
);

/// Raw `logs` row tuple in column order.
type LogRow = (
    Uuid,
    DateTime<Utc>,
    DateTime<Utc>,
    Uuid,
    String,
    f64,
    Option<NaiveDate>,
    Uuid,
);

/// Raw `notes` row tuple in column order.
type NoteRow = (
    Uuid,
    DateTime<Utc>,
    DateTime<Utc>,
    String,
    Option<String>,
    Uuid,
    DateTime<Utc>,
    Uuid,
);

const EVENT_COLUMNS: &str =
    "id, created_at, event_name, event_type, scale_label, scale_max, position, color, user_id";
const LOG_COLUMNS: &str =
    "id, created_at, updated_at, event_id, event_name, value, log_date, user_id";
const NOTE_COLUMNS: &str =
    "id, created_at, updated_at, title, description, event_id, start_date, user_id";

/// PostgreSQL-backed [`RemoteStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresRemote {
    pool: PgPool,
}

impl PostgresRemote {
    /// Creates a remote store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool using the crate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backend`] when the pool cannot be
    /// established.
    pub async fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| SyncError::Backend(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

fn event_from_row(row: EventRow) -> Result<TrackedEvent, SyncError> {
    let (id, created_at, event_name, event_type, scale_label, scale_max, position, color, user_id) =
        row;
    Ok(TrackedEvent {
        id: EventId::from_uuid(id),
        created_at,
        event_name,
        event_type: event_type.parse()?,
        scale_label,
        scale_max,
        position,
        color,
        user_id: UserId::from_uuid(user_id),
    })
}

fn log_from_row(row: LogRow) -> LogEntry {
    let (id, created_at, updated_at, event_id, event_name, value, log_date, user_id) = row;
    LogEntry {
        id: LogId::from_uuid(id),
        created_at,
        updated_at,
        event_id: EventId::from_uuid(event_id),
        event_name,
        value,
        log_date,
        user_id: UserId::from_uuid(user_id),
    }
}

fn note_from_row(row: NoteRow) -> Note {
    let (id, created_at, updated_at, title, description, event_id, start_date, user_id) = row;
    Note {
        id: NoteId::from_uuid(id),
        created_at,
        updated_at,
        title,
        description,
        event_id: EventId::from_uuid(event_id),
        start_date,
        user_id: UserId::from_uuid(user_id),
    }
}

fn backend_err(e: sqlx::Error) -> SyncError {
    SyncError::Backend(e.to_string())
}

#[async_trait]
impl RemoteStore for PostgresRemote {
    async fn select_events(&self, user: UserId) -> Result<Vec<TrackedEvent>, SyncError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = $1 ORDER BY position ASC",
        ))
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(event_from_row).collect()
    }

    async fn fetch_event(
        &self,
        user: UserId,
        id: EventId,
    ) -> Result<Option<TrackedEvent>, SyncError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = $1 AND id = $2",
        ))
        .bind(user.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(event_from_row).transpose()
    }

    async fn fetch_event_by_name(
        &self,
        user: UserId,
        name: &str,
    ) -> Result<Option<TrackedEvent>, SyncError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = $1 AND event_name = $2 LIMIT 1",
        ))
        .bind(user.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(event_from_row).transpose()
    }

    async fn insert_event(
        &self,
        user: UserId,
        draft: EventDraft,
    ) -> Result<TrackedEvent, SyncError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "INSERT INTO events (event_name, event_type, scale_label, scale_max, position, color, user_id) \
             VALUES ($1, $2, $3, $4, \
                     COALESCE($5, (SELECT COALESCE(MAX(position) + 1, 0) FROM events WHERE user_id = $7)), \
                     COALESCE($6, $8), $7) \
             RETURNING {EVENT_COLUMNS}",
        ))
        .bind(&draft.event_name)
        .bind(draft.event_type.as_str())
        .bind(&draft.scale_label)
        .bind(draft.scale_max)
        .bind(draft.position)
        .bind(&draft.color)
        .bind(user.as_uuid())
        .bind(DEFAULT_COLOR)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        event_from_row(row)
    }

    async fn update_event(
        &self,
        user: UserId,
        id: EventId,
        patch: EventPatch,
    ) -> Result<TrackedEvent, SyncError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "UPDATE events SET \
               event_name = COALESCE($3, event_name), \
               event_type = COALESCE($4, event_type), \
               scale_label = COALESCE($5, scale_label), \
               scale_max = COALESCE($6, scale_max), \
               position = COALESCE($7, position), \
               color = COALESCE($8, color) \
             WHERE user_id = $1 AND id = $2 \
             RETURNING {EVENT_COLUMNS}",
        ))
        .bind(user.as_uuid())
        .bind(id.as_uuid())
        .bind(&patch.event_name)
        .bind(patch.event_type.map(|k| k.as_str()))
        .bind(&patch.scale_label)
        .bind(patch.scale_max)
        .bind(patch.position)
        .bind(&patch.color)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        event_from_row(row)
    }

    async fn delete_event(&self, user: UserId, id: EventId) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM events WHERE user_id = $1 AND id = $2")
            .bind(user.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn rename_log_events(
        &self,
        user: UserId,
        event_id: EventId,
        new_name: &str,
    ) -> Result<u64, SyncError> {
        let result = sqlx::query(
            "UPDATE logs SET event_name = $3, updated_at = NOW() \
             WHERE user_id = $1 AND event_id = $2",
        )
        .bind(user.as_uuid())
        .bind(event_id.as_uuid())
        .bind(new_name)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(result.rows_affected())
    }

    async fn select_logs(
        &self,
        user: UserId,
        query: &LogQuery,
    ) -> Result<Vec<LogEntry>, SyncError> {
        let rows = match query {
            LogQuery::All => {
                sqlx::query_as::<_, LogRow>(&format!(
                    "SELECT {LOG_COLUMNS} FROM logs WHERE user_id = $1 \
                     ORDER BY created_at DESC",
                ))
                .bind(user.as_uuid())
                .fetch_all(&self.pool)
                .await
            }
            LogQuery::ForEvent(event_id) => {
                sqlx::query_as::<_, LogRow>(&format!(
                    "SELECT {LOG_COLUMNS} FROM logs WHERE user_id = $1 AND event_id = $2 \
                     ORDER BY created_at DESC",
                ))
                .bind(user.as_uuid())
                .bind(event_id.as_uuid())
                .fetch_all(&self.pool)
                .await
            }
            LogQuery::DateRange { start, end } => {
                sqlx::query_as::<_, LogRow>(&format!(
                    "SELECT {LOG_COLUMNS} FROM logs \
                     WHERE user_id = $1 AND created_at >= $2 AND created_at <= $3 \
                     ORDER BY created_at DESC",
                ))
                .bind(user.as_uuid())
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await
            }
            LogQuery::ForEventName(name) => {
                sqlx::query_as::<_, LogRow>(&format!(
                    "SELECT {LOG_COLUMNS} FROM logs WHERE user_id = $1 AND event_name = $2 \
                     ORDER BY created_at DESC",
                ))
                .bind(user.as_uuid())
                .bind(name)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend_err)?;

        Ok(rows.into_iter().map(log_from_row).collect())
    }

    async fn insert_log(&self, user: UserId, draft: LogDraft) -> Result<LogEntry, SyncError> {
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "INSERT INTO logs (event_id, event_name, value, log_date, user_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {LOG_COLUMNS}",
        ))
        .bind(draft.event_id.as_uuid())
        .bind(&draft.event_name)
        .bind(draft.value)
        .bind(draft.log_date)
        .bind(user.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(log_from_row(row))
    }

    async fn update_log(
        &self,
        user: UserId,
        id: LogId,
        patch: LogPatch,
    ) -> Result<LogEntry, SyncError> {
        let row = sqlx::query_as::<_, LogRow>(&format!(
            "UPDATE logs SET \
               event_id = COALESCE($3, event_id), \
               event_name = COALESCE($4, event_name), \
               value = COALESCE($5, value), \
               log_date = COALESCE($6, log_date), \
               updated_at = NOW() \
             WHERE user_id = $1 AND id = $2 \
             RETURNING {LOG_COLUMNS}",
        ))
        .bind(user.as_uuid())
        .bind(id.as_uuid())
        .bind(patch.event_id.map(|e| *e.as_uuid()))
        .bind(&patch.event_name)
        .bind(patch.value)
        .bind(patch.log_date)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(log_from_row(row))
    }

    async fn delete_log(&self, user: UserId, id: LogId) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM logs WHERE user_id = $1 AND id = $2")
            .bind(user.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn select_notes(&self, user: UserId, query: &NoteQuery) -> Result<Vec<Note>, SyncError> {
        let rows = match query {
            NoteQuery::All => {
                sqlx::query_as::<_, NoteRow>(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = $1 \
                     ORDER BY created_at DESC",
                ))
                .bind(user.as_uuid())
                .fetch_all(&self.pool)
                .await
            }
            NoteQuery::ForEvent(event_id) => {
                sqlx::query_as::<_, NoteRow>(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = $1 AND event_id = $2 \
                     ORDER BY created_at DESC",
                ))
                .bind(user.as_uuid())
                .bind(event_id.as_uuid())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend_err)?;

        Ok(rows.into_iter().map(note_from_row).collect())
    }

    async fn fetch_note(&self, user: UserId, id: NoteId) -> Result<Option<Note>, SyncError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = $1 AND id = $2",
        ))
        .bind(user.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(row.map(note_from_row))
    }

    async fn insert_note(&self, user: UserId, draft: NoteDraft) -> Result<Note, SyncError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "INSERT INTO notes (title, description, event_id, start_date, user_id) \
             VALUES ($1, $2, $3, COALESCE($4, NOW()), $5) \
             RETURNING {NOTE_COLUMNS}",
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.event_id.as_uuid())
        .bind(draft.start_date)
        .bind(user.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(note_from_row(row))
    }

    async fn update_note(
        &self,
        user: UserId,
        id: NoteId,
        patch: NotePatch,
    ) -> Result<Note, SyncError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "UPDATE notes SET \
               title = COALESCE($3, title), \
               description = COALESCE($4, description), \
               event_id = COALESCE($5, event_id), \
               start_date = COALESCE($6, start_date), \
               updated_at = NOW() \
             WHERE user_id = $1 AND id = $2 \
             RETURNING {NOTE_COLUMNS}",
        ))
        .bind(user.as_uuid())
        .bind(id.as_uuid())
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.event_id.map(|e| *e.as_uuid()))
        .bind(patch.start_date)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(note_from_row(row))
    }

    async fn delete_note(&self, user: UserId, id: NoteId) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM notes WHERE user_id = $1 AND id = $2")
            .bind(user.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }
}
