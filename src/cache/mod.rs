//! Persistent local cache: durable, best-effort slot storage.
//!
//! [`LocalCache`] holds full-collection snapshots for the three entity
//! kinds, the last-sync timestamp, and the preference overlay maps.
//! Pure storage; refresh policy lives in the repositories.

pub mod local;

pub use local::{CachedPage, LocalCache};
