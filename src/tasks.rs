//! Detached background task submission.
//!
//! Fire-and-forget work (background refreshes, position/color pushes,
//! the log rename backfill) goes through [`TaskRunner`] instead of bare
//! `tokio::spawn` so that failures reach one injectable handler and
//! tests can await completion deterministically via [`TaskRunner::drain`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use crate::error::SyncError;

/// Handler invoked with the task label and error when a detached task
/// fails.
pub type FailureHandler = Arc<dyn Fn(&'static str, &SyncError) + Send + Sync>;

/// Submits detached tasks and tracks their handles.
///
/// Cloning is cheap; all clones share the same handle set and failure
/// handler. Errors returned by submitted futures are routed to the
/// failure handler and never propagate; callers that need the result
/// must await the work directly instead.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<Inner>,
}

struct Inner {
    handles: Mutex<Vec<JoinHandle<()>>>,
    on_failure: FailureHandler,
}

impl TaskRunner {
    /// Creates a runner that logs failures through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_failure_handler(Arc::new(|label, err| {
            tracing::warn!(task = label, error = %err, "background task failed");
        }))
    }

    /// Creates a runner with a custom failure handler (tests inject a
    /// recording handler here).
    #[must_use]
    pub fn with_failure_handler(on_failure: FailureHandler) -> Self {
        Self {
            inner: Arc::new(Inner {
                handles: Mutex::new(Vec::new()),
                on_failure,
            }),
        }
    }

    /// Spawns `fut` as a detached task.
    ///
    /// The future's error, if any, goes to the failure handler. The
    /// task keeps running even if every caller drops its interest.
    pub fn spawn<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        let on_failure = Arc::clone(&self.inner.on_failure);
        let handle = tokio::spawn(async move {
            if let Err(err) = fut.await {
                on_failure(label, &err);
            }
        });
        let mut handles = lock(&self.inner.handles);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Awaits every submitted task, including tasks submitted while
    /// draining. Intended for tests and orderly shutdown.
    pub async fn drain(&self) {
        loop {
            let batch: Vec<JoinHandle<()>> = {
                let mut handles = lock(&self.inner.handles);
                handles.drain(..).collect()
            };
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        tracing::warn!(error = %e, "background task panicked");
                    }
                }
            }
        }
    }

    /// Number of tasks still tracked (finished tasks are pruned on the
    /// next spawn or drain).
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.inner.handles).len()
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
