//! Entity repositories: stale-while-revalidate reads over the three
//! cached collections.
//!
//! Each repository follows the same pattern: `list()` serves the cached
//! snapshot immediately and (cooldown permitting) refreshes in the
//! background, coalescing concurrent refreshes onto one in-flight
//! operation; mutations write through the backend first, then update
//! the cache and notify subscribers. [`EventRepo`] additionally
//! composes the preference overlays over every read.

use std::sync::Arc;

use crate::cache::LocalCache;
use crate::domain::ChangeBus;
use crate::remote::RemoteStore;
use crate::session::Session;
use crate::tasks::TaskRunner;

pub mod events;
pub mod logs;
pub mod merge;
pub mod notes;
pub mod refresh;

pub use events::EventRepo;
pub use logs::LogRepo;
pub use merge::{Record, merge_by_id, remove_by_id, replace_by_id, sort_newest_first};
pub use notes::NoteRepo;
pub use refresh::{RefreshCell, SharedRefresh};

/// Shared handles threaded through every repository.
///
/// All repositories of one [`SyncCore`](crate::sync::SyncCore) share
/// the same instances; cloning clones the handles, not the state.
#[derive(Debug, Clone)]
pub struct RepoHandles {
    /// The authenticated backend.
    pub remote: Arc<dyn RemoteStore>,
    /// The durable local cache.
    pub cache: Arc<LocalCache>,
    /// Current-user session handle.
    pub session: Session,
    /// Change-notification bus.
    pub bus: ChangeBus,
    /// Detached-task runner for fire-and-forget work.
    pub tasks: TaskRunner,
}
