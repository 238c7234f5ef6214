//! Trackable event definitions.
//!
//! A [`TrackedEvent`] is the thing a user tracks (push-ups, sleep
//! quality, weight). Its `position` and `color` fields carry the
//! backend-sourced values; the preference overlays may override both at
//! read time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EventId, UserId};
use crate::error::SyncError;

/// How values logged against an event are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Occurrence counting; every log has value 1.
    Count,
    /// Integer rating in `1..=scale_max`.
    Scale,
    /// Arbitrary decimal measurement (weight, distance, ...).
    Metric,
}

impl EventKind {
    /// Returns the canonical string stored in the backend.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Scale => "Scale",
            Self::Metric => "Metric",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Count" => Ok(Self::Count),
            "Scale" => Ok(Self::Scale),
            "Metric" => Ok(Self::Metric),
            other => Err(SyncError::Serialization(format!(
                "unknown event type: {other}"
            ))),
        }
    }
}

/// A trackable event definition as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Unique identifier (backend-assigned, immutable).
    pub id: EventId,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Display name; denormalized onto logs for display and filtering.
    pub event_name: String,
    /// Value interpretation for logs against this event.
    pub event_type: EventKind,
    /// Label shown alongside scale/metric values.
    pub scale_label: Option<String>,
    /// Upper bound of the rating scale; present only for [`EventKind::Scale`].
    pub scale_max: Option<i32>,
    /// Sort order for list rendering. Need not be contiguous.
    pub position: i32,
    /// Chart/list color as a hex string.
    pub color: String,
    /// Owning user.
    pub user_id: UserId,
}

/// Input for creating a new event. The backend assigns `id`,
/// `created_at`, and, when omitted here, `position` and `color`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Display name.
    pub event_name: String,
    /// Value interpretation.
    pub event_type: EventKind,
    /// Label shown alongside scale/metric values.
    pub scale_label: Option<String>,
    /// Upper bound of the rating scale (2..=10), required for `Scale`.
    pub scale_max: Option<i32>,
    /// Explicit sort position; defaults to end-of-list when `None`.
    pub position: Option<i32>,
    /// Explicit color; defaults to the first palette color when `None`.
    pub color: Option<String>,
}

impl EventDraft {
    /// Checks the scale-field invariants for the draft's kind.
    ///
    /// `Scale` requires `scale_max` in `2..=10`; `Count` forbids both
    /// scale fields; `Metric` allows only `scale_label`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidRequest`] when a field is present for
    /// a kind that forbids it, missing where required, or out of range.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self.event_type {
            EventKind::Count => {
                if self.scale_label.is_some() || self.scale_max.is_some() {
                    return Err(SyncError::InvalidRequest(
                        "count events carry no scale fields".to_string(),
                    ));
                }
            }
            EventKind::Scale => match self.scale_max {
                Some(max) if (2..=10).contains(&max) => {}
                Some(max) => {
                    return Err(SyncError::InvalidRequest(format!(
                        "scale_max must be in 2..=10, got {max}"
                    )));
                }
                None => {
                    return Err(SyncError::InvalidRequest(
                        "scale events require scale_max".to_string(),
                    ));
                }
            },
            EventKind::Metric => {
                if self.scale_max.is_some() {
                    return Err(SyncError::InvalidRequest(
                        "metric events carry no scale_max".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Partial update for an event. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    /// New display name. Changing it triggers the log backfill.
    pub event_name: Option<String>,
    /// New value interpretation.
    pub event_type: Option<EventKind>,
    /// New scale label.
    pub scale_label: Option<String>,
    /// New scale upper bound.
    pub scale_max: Option<i32>,
    /// New sort position.
    pub position: Option<i32>,
    /// New color hex string.
    pub color: Option<String>,
}

impl EventPatch {
    /// A patch setting only `position`.
    #[must_use]
    pub fn position(position: i32) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// A patch setting only `color`.
    #[must_use]
    pub fn color(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn draft(kind: EventKind) -> EventDraft {
        EventDraft {
            event_name: "Push-ups".to_string(),
            event_type: kind,
            scale_label: None,
            scale_max: None,
            position: None,
            color: None,
        }
    }

    #[test]
    fn count_draft_is_valid_without_scale_fields() {
        assert!(draft(EventKind::Count).validate().is_ok());
    }

    #[test]
    fn count_draft_rejects_scale_max() {
        let mut d = draft(EventKind::Count);
        d.scale_max = Some(5);
        assert!(d.validate().is_err());
    }

    #[test]
    fn scale_draft_requires_scale_max_in_range() {
        let mut d = draft(EventKind::Scale);
        assert!(d.validate().is_err());

        d.scale_max = Some(1);
        assert!(d.validate().is_err());

        d.scale_max = Some(11);
        assert!(d.validate().is_err());

        d.scale_max = Some(10);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn metric_draft_allows_label_only() {
        let mut d = draft(EventKind::Metric);
        d.scale_label = Some("kg".to_string());
        assert!(d.validate().is_ok());

        d.scale_max = Some(5);
        assert!(d.validate().is_err());
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [EventKind::Count, EventKind::Scale, EventKind::Metric] {
            assert_eq!(EventKind::from_str(kind.as_str()).ok(), Some(kind));
        }
        assert!(EventKind::from_str("Yes-No").is_err());
    }
}
