//! Chart annotation notes.
//!
//! A [`Note`] annotates an event's history at a point in time ("started
//! new program"). Notes are always associated with exactly one event;
//! deleting the event leaves its notes in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EventId, NoteId, UserId};

/// A note as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier (backend-assigned).
    pub id: NoteId,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Server-side last-update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Short title shown on the chart marker.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Annotated event.
    pub event_id: EventId,
    /// Point in time the note annotates.
    pub start_date: DateTime<Utc>,
    /// Owning user.
    pub user_id: UserId,
}

/// Input for creating a new note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    /// Short title shown on the chart marker.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Annotated event.
    pub event_id: EventId,
    /// Point in time the note annotates; backend defaults to "now"
    /// when omitted.
    pub start_date: Option<DateTime<Utc>>,
}

/// Partial update for a note. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Re-associate the note with a different event.
    pub event_id: Option<EventId>,
    /// New annotated point in time.
    pub start_date: Option<DateTime<Utc>>,
}

/// Server-side filter for note queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteQuery {
    /// The full collection for the user.
    All,
    /// Notes annotating the given event.
    ForEvent(EventId),
}

impl NoteQuery {
    /// Applies this filter to a single note.
    #[must_use]
    pub fn matches(&self, note: &Note) -> bool {
        match self {
            Self::All => true,
            Self::ForEvent(id) => note.event_id == *id,
        }
    }
}
