//! Per-kind refresh state: coalescing and cooldown.
//!
//! Each repository owns one [`RefreshCell`] tracking its in-flight
//! refresh and the time the last refresh started. Concurrent callers
//! that decide to refresh join the single in-flight operation instead
//! of issuing duplicates; the slot is cleared only after the operation
//! settles. The state is per-instance: constructing two repositories
//! gives two independent cells, so tests never leak across each other.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::error::SyncError;

/// A refresh operation that any number of callers may await.
///
/// The output is cloned to every joiner, which is why [`SyncError`]
/// is `Clone`.
pub type SharedRefresh = Shared<BoxFuture<'static, Result<(), SyncError>>>;

#[derive(Default)]
struct Flight {
    in_flight: Option<SharedRefresh>,
    last_started: Option<Instant>,
}

struct CellInner {
    cooldown: Duration,
    flight: Mutex<Flight>,
}

/// Coalescing refresh slot with a cooldown gate.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct RefreshCell {
    inner: Arc<CellInner>,
}

impl RefreshCell {
    /// Creates a cell with the given minimum interval between refresh
    /// starts.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(CellInner {
                cooldown,
                flight: Mutex::new(Flight::default()),
            }),
        }
    }

    /// Whether enough time has passed since the last refresh started to
    /// begin another. `true` when no refresh has ever started.
    #[must_use]
    pub fn cooldown_elapsed(&self) -> bool {
        let flight = lock(&self.inner.flight);
        match flight.last_started {
            None => true,
            Some(started) => started.elapsed() >= self.inner.cooldown,
        }
    }

    /// Joins the in-flight refresh, or starts the one built by `start`.
    ///
    /// `start` is only invoked when no refresh is running; the returned
    /// handle may be awaited by any number of callers or handed to a
    /// detached task. The cell clears itself after the operation
    /// settles, success or failure.
    pub fn join_or_start<F>(&self, start: impl FnOnce() -> F) -> SharedRefresh
    where
        F: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        let mut flight = lock(&self.inner.flight);
        if let Some(in_flight) = &flight.in_flight {
            return in_flight.clone();
        }

        let cell = self.clone();
        let fut = start();
        let shared = async move {
            let result = fut.await;
            cell.clear();
            result
        }
        .boxed()
        .shared();

        flight.in_flight = Some(shared.clone());
        flight.last_started = Some(Instant::now());
        shared
    }

    /// Whether no refresh is currently in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        lock(&self.inner.flight).in_flight.is_none()
    }

    fn clear(&self) {
        lock(&self.inner.flight).in_flight = None;
    }
}

impl fmt::Debug for RefreshCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flight = lock(&self.inner.flight);
        f.debug_struct("RefreshCell")
            .field("cooldown", &self.inner.cooldown)
            .field("in_flight", &flight.in_flight.is_some())
            .field("last_started", &flight.last_started)
            .finish()
    }
}

fn lock<'a>(mutex: &'a Mutex<Flight>) -> MutexGuard<'a, Flight> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn joiners_share_one_execution() {
        let cell = RefreshCell::new(Duration::from_secs(10));
        let runs = Arc::new(AtomicUsize::new(0));

        let runs_a = Arc::clone(&runs);
        let first = cell.join_or_start(move || async move {
            runs_a.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let runs_b = Arc::clone(&runs);
        let second = cell.join_or_start(move || async move {
            runs_b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (a, b) = tokio::join!(first, second);
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_reaches_every_joiner() {
        let cell = RefreshCell::new(Duration::from_secs(10));

        let first = cell.join_or_start(|| async {
            Err(SyncError::Backend("down".to_string()))
        });
        let second = cell.join_or_start(|| async { Ok(()) });

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Err(SyncError::Backend("down".to_string())));
        assert_eq!(b, Err(SyncError::Backend("down".to_string())));
    }

    #[tokio::test]
    async fn slot_clears_after_settle() {
        let cell = RefreshCell::new(Duration::from_secs(10));
        let runs = Arc::new(AtomicUsize::new(0));

        let runs_a = Arc::clone(&runs);
        let first = cell.join_or_start(move || async move {
            runs_a.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(first.await.is_ok());
        assert!(cell.is_idle());

        let runs_b = Arc::clone(&runs);
        let second = cell.join_or_start(move || async move {
            runs_b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(second.await.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_gates_until_elapsed() {
        let cell = RefreshCell::new(Duration::from_secs(10));
        assert!(cell.cooldown_elapsed());

        let refresh = cell.join_or_start(|| async { Ok(()) });
        assert!(refresh.await.is_ok());
        assert!(!cell.cooldown_elapsed());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cell.cooldown_elapsed());
    }
}
