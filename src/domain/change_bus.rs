//! Broadcast channel for data-change notifications.
//!
//! [`ChangeBus`] wraps a [`tokio::sync::broadcast`] channel. Every cache
//! write publishes a [`DataChanged`] marker through the bus, and each
//! live view subscribes to re-query its repositories on signal. The
//! signal deliberately carries no payload: subscribers cannot tell what
//! changed and must re-read.

use tokio::sync::broadcast;

/// Payload-free marker: some cached collection changed, re-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChanged;

/// Broadcast bus for [`DataChanged`] markers.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest signals are dropped for
/// lagging receivers. That is harmless here: one pending signal already
/// means "re-query everything".
#[derive(Debug, Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<DataChanged>,
}

impl ChangeBus {
    /// Creates a new `ChangeBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Notifies all subscribers that cached data changed.
    ///
    /// Returns the number of receivers that were notified. If there are
    /// no active receivers, the signal is silently dropped.
    pub fn notify(&self) -> usize {
        self.sender.send(DataChanged).unwrap_or(0)
    }

    /// Creates a new receiver that will observe all future signals.
    ///
    /// Each live view should call this once when it mounts.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DataChanged> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
