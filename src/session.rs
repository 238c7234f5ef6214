//! Current-user session handle.
//!
//! The auth flow itself lives outside this crate; the sync core only
//! needs to know *who* is signed in. [`Session`] is a cloneable handle
//! to that identity, shared by every repository: background refreshes
//! no-op when nobody is signed in, and mutations refuse to run.

use std::sync::{Arc, RwLock};

use crate::domain::UserId;

/// Shared handle to the current authenticated user, if any.
///
/// All clones observe the same identity. Reads and writes are
/// synchronous; the handle is never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Arc<RwLock<Option<UserId>>>,
}

impl Session {
    /// Creates a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session already signed in as `user` (test fixtures,
    /// app restart with a persisted auth token).
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        let session = Self::new();
        session.replace(Some(user));
        session
    }

    /// Returns the currently signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Replaces the current identity, returning the previous one.
    pub fn replace(&self, user: Option<UserId>) -> Option<UserId> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut guard, user)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn starts_signed_out() {
        assert_eq!(Session::new().current_user(), None);
    }

    #[test]
    fn clones_share_identity() {
        let session = Session::new();
        let clone = session.clone();
        let user = UserId::new();

        session.replace(Some(user));
        assert_eq!(clone.current_user(), Some(user));
    }

    #[test]
    fn replace_returns_previous() {
        let first = UserId::new();
        let second = UserId::new();
        let session = Session::signed_in(first);

        assert_eq!(session.replace(Some(second)), Some(first));
        assert_eq!(session.current_user(), Some(second));
    }
}
