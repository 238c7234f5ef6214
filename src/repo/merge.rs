//! Reconciliation helpers shared by the three repositories.
//!
//! A filtered backend response is merged into the full cached
//! collection by id: incoming items overwrite existing ones, unmatched
//! items are appended, nothing is ever removed. Deletions only reach
//! the cache through a full refresh or an explicit local delete.

use chrono::{DateTime, Utc};

use crate::domain::{EventId, LogEntry, LogId, Note, NoteId, TrackedEvent};

/// A cacheable row: identity plus creation time for newest-first order.
pub trait Record {
    /// Identifier type used as the merge key.
    type Id: Copy + PartialEq;

    /// The merge key.
    fn record_id(&self) -> Self::Id;

    /// Server-side creation timestamp.
    fn recorded_at(&self) -> DateTime<Utc>;
}

impl Record for TrackedEvent {
    type Id = EventId;

    fn record_id(&self) -> EventId {
        self.id
    }

    fn recorded_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Record for LogEntry {
    type Id = LogId;

    fn record_id(&self) -> LogId {
        self.id
    }

    fn recorded_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Record for Note {
    type Id = NoteId;

    fn record_id(&self) -> NoteId {
        self.id
    }

    fn recorded_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Unions `incoming` into `existing` keyed by id (incoming wins on
/// collision, nothing is deleted) and re-sorts newest-first.
///
/// Applying the same `incoming` twice is a no-op after the first time.
#[must_use]
pub fn merge_by_id<T: Record>(mut existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    for item in incoming {
        match existing
            .iter_mut()
            .find(|e| e.record_id() == item.record_id())
        {
            Some(slot) => *slot = item,
            None => existing.push(item),
        }
    }
    sort_newest_first(&mut existing);
    existing
}

/// Sorts by `created_at` descending (stable, so equal timestamps keep
/// their relative order).
pub fn sort_newest_first<T: Record>(items: &mut [T]) {
    items.sort_by(|a, b| b.recorded_at().cmp(&a.recorded_at()));
}

/// Replaces the item with `updated`'s id in place. Returns whether a
/// match was found; an absent id leaves the slice untouched.
pub fn replace_by_id<T: Record>(items: &mut [T], updated: T) -> bool {
    match items
        .iter_mut()
        .find(|item| item.record_id() == updated.record_id())
    {
        Some(slot) => {
            *slot = updated;
            true
        }
        None => false,
    }
}

/// Removes the item with the given id, if present.
pub fn remove_by_id<T: Record>(items: &mut Vec<T>, id: T::Id) {
    items.retain(|item| item.record_id() != id);
}
