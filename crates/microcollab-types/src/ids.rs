//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Requests, offers, sessions, users, and events each get their own ID type
//! so an offer ID can never be passed where a request ID is expected. IDs
//! are UUID v7, which keeps them roughly ordered by creation time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a help request posted to the marketplace.
    RequestId
}

define_id! {
    /// Unique identifier for a helper's offer on a request.
    OfferId
}

define_id! {
    /// Unique identifier for a help session started from an accepted offer.
    SessionId
}

define_id! {
    /// Unique identifier for a marketplace user (requester or helper).
    UserId
}

define_id! {
    /// Unique identifier for an activity feed event.
    EventId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let request = RequestId::new();
        let offer = OfferId::new();
        assert_ne!(request.into_inner(), Uuid::nil());
        assert_ne!(offer.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json, Some(format!("\"{}\"", id.into_inner())));
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = SessionId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
