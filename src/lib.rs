//! # track-anything-core
//!
//! Offline cache and background sync core for the Track Anything
//! habit/metric tracker.
//!
//! The crate sits between the UI and the hosted backend for three
//! entity collections (events, logs, notes). Reads are
//! stale-while-revalidate: the cached snapshot is served immediately
//! while a cooldown-gated background refresh reconciles with the
//! backend, and concurrent refreshes coalesce onto a single in-flight
//! operation. Mutations write through the backend first, then update
//! the cache and broadcast a payload-free change signal that views
//! answer by re-querying. Position, color, and chart-type preferences
//! are locally-authoritative overlays composed over backend data at
//! read time.
//!
//! ## Architecture
//!
//! ```text
//! Views (subscribe to ChangeBus, re-query on signal)
//!     │
//!     ├── EventRepo / LogRepo / NoteRepo (repo/)
//!     │       ├── RefreshCell: coalescing + cooldown
//!     │       └── merge helpers: merge-by-id reconciliation
//!     │
//!     ├── Preference overlays (prefs/)
//!     ├── ChangeBus (domain/)
//!     ├── TaskRunner: detached best-effort writes
//!     │
//!     ├── LocalCache (cache/): durable JSON slots
//!     └── RemoteStore (remote/): PostgreSQL / in-memory
//! ```

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod prefs;
pub mod remote;
pub mod repo;
pub mod session;
pub mod sync;
pub mod tasks;
