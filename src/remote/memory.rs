//! In-memory [`RemoteStore`] implementation.
//!
//! Deterministic stand-in for the hosted backend: tables live in a
//! mutex, ids are v4 uuids, timestamps are assigned on write. Call
//! counters, injectable failures, and optional artificial latency make
//! the repository layer's network behavior (stale-while-revalidate,
//! coalescing) assertable in tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::RemoteStore;
use crate::domain::{
    EventDraft, EventId, EventPatch, LogDraft, LogEntry, LogId, LogPatch, LogQuery, Note,
    NoteDraft, NoteId, NotePatch, NoteQuery, TrackedEvent, UserId,
};
use crate::error::SyncError;
use crate::prefs::colors::DEFAULT_COLOR;

#[derive(Debug, Default)]
struct Tables {
    events: Vec<TrackedEvent>,
    logs: Vec<LogEntry>,
    notes: Vec<Note>,
}

/// Mutex-held backend tables with per-user scoping.
///
/// Counters record how many select round-trips each table served;
/// `fail_reads`/`fail_writes` inject structured backend errors.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    tables: Mutex<Tables>,
    latency: Mutex<Option<Duration>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    event_selects: AtomicUsize,
    log_selects: AtomicUsize,
    note_selects: AtomicUsize,
}

impl InMemoryRemote {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial delay to every operation, so concurrent
    /// callers genuinely overlap in tests.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock_opt(&self.latency) = latency;
    }

    /// Makes every read fail with a backend error until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write fail with a backend error until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of event select round-trips served.
    #[must_use]
    pub fn event_selects(&self) -> usize {
        self.event_selects.load(Ordering::SeqCst)
    }

    /// Number of log select round-trips served.
    #[must_use]
    pub fn log_selects(&self) -> usize {
        self.log_selects.load(Ordering::SeqCst)
    }

    /// Number of note select round-trips served.
    #[must_use]
    pub fn note_selects(&self) -> usize {
        self.note_selects.load(Ordering::SeqCst)
    }

    /// Current backend contents of the `events` table (test assertions).
    #[must_use]
    pub fn events_snapshot(&self) -> Vec<TrackedEvent> {
        lock(&self.tables).events.clone()
    }

    /// Current backend contents of the `logs` table (test assertions).
    #[must_use]
    pub fn logs_snapshot(&self) -> Vec<LogEntry> {
        lock(&self.tables).logs.clone()
    }

    /// Current backend contents of the `notes` table (test assertions).
    #[must_use]
    pub fn notes_snapshot(&self) -> Vec<Note> {
        lock(&self.tables).notes.clone()
    }

    async fn simulate_latency(&self) {
        let latency = *lock_opt(&self.latency);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_read(&self) -> Result<(), SyncError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Backend("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), SyncError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }
}

fn lock(tables: &Mutex<Tables>) -> std::sync::MutexGuard<'_, Tables> {
    match tables.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock_opt(latency: &Mutex<Option<Duration>>) -> std::sync::MutexGuard<'_, Option<Duration>> {
    match latency.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn missing_row(table: &str, id: impl std::fmt::Display) -> SyncError {
    SyncError::Backend(format!("no {table} row with id {id}"))
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn select_events(&self, user: UserId) -> Result<Vec<TrackedEvent>, SyncError> {
        self.simulate_latency().await;
        self.check_read()?;
        self.event_selects.fetch_add(1, Ordering::SeqCst);
        let tables = lock(&self.tables);
        let mut rows: Vec<TrackedEvent> = tables
            .events
            .iter()
            .filter(|e| e.user_id == user)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.position);
        Ok(rows)
    }

    async fn fetch_event(
        &self,
        user: UserId,
        id: EventId,
    ) -> Result<Option<TrackedEvent>, SyncError> {
        self.simulate_latency().await;
        self.check_read()?;
        let tables = lock(&self.tables);
        Ok(tables
            .events
            .iter()
            .find(|e| e.user_id == user && e.id == id)
            .cloned())
    }

    async fn fetch_event_by_name(
        &self,
        user: UserId,
        name: &str,
    ) -> Result<Option<TrackedEvent>, SyncError> {
        self.simulate_latency().await;
        self.check_read()?;
        let tables = lock(&self.tables);
        Ok(tables
            .events
            .iter()
            .find(|e| e.user_id == user && e.event_name == name)
            .cloned())
    }

    async fn insert_event(
        &self,
        user: UserId,
        draft: EventDraft,
    ) -> Result<TrackedEvent, SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut tables = lock(&self.tables);
        let next_position = tables
            .events
            .iter()
            .filter(|e| e.user_id == user)
            .map(|e| e.position + 1)
            .max()
            .unwrap_or(0);
        let event = TrackedEvent {
            id: EventId::new(),
            created_at: Utc::now(),
            event_name: draft.event_name,
            event_type: draft.event_type,
            scale_label: draft.scale_label,
            scale_max: draft.scale_max,
            position: draft.position.unwrap_or(next_position),
            color: draft.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            user_id: user,
        };
        tables.events.push(event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        user: UserId,
        id: EventId,
        patch: EventPatch,
    ) -> Result<TrackedEvent, SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut tables = lock(&self.tables);
        let Some(event) = tables
            .events
            .iter_mut()
            .find(|e| e.user_id == user && e.id == id)
        else {
            return Err(missing_row("events", id));
        };
        if let Some(name) = patch.event_name {
            event.event_name = name;
        }
        if let Some(kind) = patch.event_type {
            event.event_type = kind;
        }
        if let Some(label) = patch.scale_label {
            event.scale_label = Some(label);
        }
        if let Some(max) = patch.scale_max {
            event.scale_max = Some(max);
        }
        if let Some(position) = patch.position {
            event.position = position;
        }
        if let Some(color) = patch.color {
            event.color = color;
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, user: UserId, id: EventId) -> Result<(), SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut tables = lock(&self.tables);
        tables.events.retain(|e| !(e.user_id == user && e.id == id));
        Ok(())
    }

    async fn rename_log_events(
        &self,
        user: UserId,
        event_id: EventId,
        new_name: &str,
    ) -> Result<u64, SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let now = Utc::now();
        let mut tables = lock(&self.tables);
        let mut touched = 0;
        for log in tables
            .logs
            .iter_mut()
            .filter(|l| l.user_id == user && l.event_id == event_id)
        {
            log.event_name = new_name.to_string();
            log.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn select_logs(
        &self,
        user: UserId,
        query: &LogQuery,
    ) -> Result<Vec<LogEntry>, SyncError> {
        self.simulate_latency().await;
        self.check_read()?;
        self.log_selects.fetch_add(1, Ordering::SeqCst);
        let tables = lock(&self.tables);
        let mut rows: Vec<LogEntry> = tables
            .logs
            .iter()
            .filter(|l| l.user_id == user && query.matches(l))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_log(&self, user: UserId, draft: LogDraft) -> Result<LogEntry, SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let now = Utc::now();
        let log = LogEntry {
            id: LogId::new(),
            created_at: now,
            updated_at: now,
            event_id: draft.event_id,
            event_name: draft.event_name,
            value: draft.value,
            log_date: draft.log_date,
            user_id: user,
        };
        lock(&self.tables).logs.push(log.clone());
        Ok(log)
    }

    async fn update_log(
        &self,
        user: UserId,
        id: LogId,
        patch: LogPatch,
    ) -> Result<LogEntry, SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut tables = lock(&self.tables);
        let Some(log) = tables
            .logs
            .iter_mut()
            .find(|l| l.user_id == user && l.id == id)
        else {
            return Err(missing_row("logs", id));
        };
        if let Some(event_id) = patch.event_id {
            log.event_id = event_id;
        }
        if let Some(name) = patch.event_name {
            log.event_name = name;
        }
        if let Some(value) = patch.value {
            log.value = value;
        }
        if let Some(date) = patch.log_date {
            log.log_date = Some(date);
        }
        log.updated_at = Utc::now();
        Ok(log.clone())
    }

    async fn delete_log(&self, user: UserId, id: LogId) -> Result<(), SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut tables = lock(&self.tables);
        tables.logs.retain(|l| !(l.user_id == user && l.id == id));
        Ok(())
    }

    async fn select_notes(&self, user: UserId, query: &NoteQuery) -> Result<Vec<Note>, SyncError> {
        self.simulate_latency().await;
        self.check_read()?;
        self.note_selects.fetch_add(1, Ordering::SeqCst);
        let tables = lock(&self.tables);
        let mut rows: Vec<Note> = tables
            .notes
            .iter()
            .filter(|n| n.user_id == user && query.matches(n))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn fetch_note(&self, user: UserId, id: NoteId) -> Result<Option<Note>, SyncError> {
        self.simulate_latency().await;
        self.check_read()?;
        let tables = lock(&self.tables);
        Ok(tables
            .notes
            .iter()
            .find(|n| n.user_id == user && n.id == id)
            .cloned())
    }

    async fn insert_note(&self, user: UserId, draft: NoteDraft) -> Result<Note, SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let now = Utc::now();
        let note = Note {
            id: NoteId::new(),
            created_at: now,
            updated_at: now,
            title: draft.title,
            description: draft.description,
            event_id: draft.event_id,
            start_date: draft.start_date.unwrap_or(now),
            user_id: user,
        };
        lock(&self.tables).notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(
        &self,
        user: UserId,
        id: NoteId,
        patch: NotePatch,
    ) -> Result<Note, SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut tables = lock(&self.tables);
        let Some(note) = tables
            .notes
            .iter_mut()
            .find(|n| n.user_id == user && n.id == id)
        else {
            return Err(missing_row("notes", id));
        };
        if let Some(title) = patch.title {
            note.title = title;
        }
        if let Some(description) = patch.description {
            note.description = Some(description);
        }
        if let Some(event_id) = patch.event_id {
            note.event_id = event_id;
        }
        if let Some(start_date) = patch.start_date {
            note.start_date = start_date;
        }
        note.updated_at = Utc::now();
        Ok(note.clone())
    }

    async fn delete_note(&self, user: UserId, id: NoteId) -> Result<(), SyncError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut tables = lock(&self.tables);
        tables.notes.retain(|n| !(n.user_id == user && n.id == id));
        Ok(())
    }
}
