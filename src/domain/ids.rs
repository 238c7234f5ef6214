//! Type-safe entity identifiers.
//!
//! Each entity kind gets its own newtype wrapper around [`uuid::Uuid`]
//! (v4) so that, for example, a log identifier cannot be passed where an
//! event identifier is expected. The backend assigns ids on insert;
//! [`new`](EventId::new) exists for backends that generate ids locally.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wraps an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a trackable event definition.
    ///
    /// Used as the key in the cached events collection and in every
    /// preference overlay map.
    EventId
}

uuid_id! {
    /// Unique identifier for a logged occurrence/value.
    LogId
}

uuid_id! {
    /// Unique identifier for a chart annotation note.
    NoteId
}

uuid_id! {
    /// Identifier of the authenticated user owning the data.
    UserId
}
