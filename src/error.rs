//! Sync-core error types.
//!
//! [`SyncError`] is the central error type for the crate. It is `Clone`
//! because a coalesced background refresh hands the same outcome to every
//! caller that joined it; backend and storage failures are therefore
//! captured as strings at the edge where they occur.

use crate::domain::EventId;

/// Error type for all repository, cache, and backend operations.
///
/// # Error surfaces
///
/// | Variant | Raised by | Reaches the caller? |
/// |---|---|---|
/// | `NotSignedIn` | mutations without a session | yes |
/// | `EventNotFound` | `swap_positions` on unknown ids | yes |
/// | `InvalidRequest` | draft validation | yes |
/// | `Backend` | remote reads/writes | writes always; reads only on a cold cache |
/// | `Storage` | local cache I/O | no (logged and swallowed) |
/// | `Serialization` | row/slot decoding | as `Backend`/`Storage` context |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// No authenticated user is present in the session.
    #[error("not signed in")]
    NotSignedIn,

    /// Event with the given ID is not in the cached collection.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Remote backend failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Local durable-storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}
