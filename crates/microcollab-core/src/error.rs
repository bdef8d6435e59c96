//! Error types for the marketplace engine.
//!
//! Store operations never panic on bad input; they return a
//! [`MarketError`] and leave the store untouched.

use microcollab_types::{OfferId, RequestId, SessionId};

/// Errors that can occur during marketplace operations.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// No request with the given ID exists.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// The request does not exist or is no longer accepting offers.
    #[error("no open request with id {0}")]
    OpenRequestNotFound(RequestId),

    /// No offer with the given ID exists.
    #[error("offer not found: {0}")]
    OfferNotFound(OfferId),

    /// No session with the given ID exists.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The operation would move an entity backwards or sideways in its
    /// lifecycle.
    #[error("invalid transition: {reason}")]
    InvalidTransition {
        /// What was attempted and why it is not allowed.
        reason: String,
    },

    /// Input failed validation (offer message, filter, request draft).
    #[error("validation failed: {reason}")]
    Validation {
        /// Description of the offending input.
        reason: String,
    },

    /// The engine reached a state it should never be in.
    #[error("internal error: {context}")]
    Internal {
        /// Description of what was being done.
        context: String,
    },
}

impl MarketError {
    /// Whether this error reports a missing (or no longer eligible) entity.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RequestNotFound(_)
                | Self::OpenRequestNotFound(_)
                | Self::OfferNotFound(_)
                | Self::SessionNotFound(_)
        )
    }
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation {
            reason: errors.to_string(),
        }
    }
}
