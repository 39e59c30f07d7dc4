//! Typed identifiers.
//!
//! Each id is a UUID v4 newtype so the different identifier spaces cannot
//! be mixed up at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
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
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// Identifies a single emitted [`crate::SyncEvent`].
    EventId
);
define_id!(
    /// Identifies a registered listener; returned by subscribe and
    /// consumed by unsubscribe.
    ListenerId
);
define_id!(
    /// Identifies one optimistic update operation.
    OperationId
);
define_id!(
    /// Identifies a [`crate::SyncConflict`].
    ConflictId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
        assert_ne!(ConflictId::new(), ConflictId::new());
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = ListenerId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }
}
