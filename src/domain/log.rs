//! Logged occurrences and values.
//!
//! A [`LogEntry`] records one occurrence of (or value for) an event.
//! `event_name` is a denormalized snapshot of the parent event's name,
//! kept for display and name-based filtering; the event repository
//! backfills it when an event is renamed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EventId, LogId, UserId};

/// A logged occurrence/value as stored by the backend.
///
/// `value` is interpreted through the parent event's kind: `Count` logs
/// always carry 1, `Scale` logs an integer in `1..=scale_max`, `Metric`
/// logs an arbitrary decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier (backend-assigned).
    pub id: LogId,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Server-side last-update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Parent event.
    pub event_id: EventId,
    /// Denormalized snapshot of the parent event's name.
    pub event_name: String,
    /// Logged value; interpretation depends on the event kind.
    pub value: f64,
    /// Optional explicit date, distinct from `created_at`, for
    /// backdated entries.
    pub log_date: Option<NaiveDate>,
    /// Owning user.
    pub user_id: UserId,
}

/// Input for creating a new log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDraft {
    /// Parent event.
    pub event_id: EventId,
    /// Denormalized event name at logging time.
    pub event_name: String,
    /// Logged value.
    pub value: f64,
    /// Optional explicit date for backdated entries.
    pub log_date: Option<NaiveDate>,
}

/// Partial update for a log entry. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPatch {
    /// Re-associate the log with a different event.
    pub event_id: Option<EventId>,
    /// New denormalized event name.
    pub event_name: Option<String>,
    /// New value.
    pub value: Option<f64>,
    /// New explicit date.
    pub log_date: Option<NaiveDate>,
}

/// Server-side filter for log queries.
///
/// Mirrors the narrow reads the UI issues; each variant maps to one
/// backend predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum LogQuery {
    /// The full collection for the user.
    All,
    /// Logs referencing the given event id.
    ForEvent(EventId),
    /// Logs created inside the inclusive timestamp range.
    DateRange {
        /// Inclusive lower bound on `created_at`.
        start: DateTime<Utc>,
        /// Inclusive upper bound on `created_at`.
        end: DateTime<Utc>,
    },
    /// Logs whose denormalized name matches exactly.
    ForEventName(String),
}

impl LogQuery {
    /// Applies this filter to a single entry (the client-side mirror of
    /// the backend predicate).
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            Self::All => true,
            Self::ForEvent(id) => entry.event_id == *id,
            Self::DateRange { start, end } => {
                entry.created_at >= *start && entry.created_at <= *end
            }
            Self::ForEventName(name) => entry.event_name == *name,
        }
    }
}
