//! Enumeration types for the MicroCollab marketplace.
//!
//! Wire names match what the dashboard expects: lifecycle states use
//! kebab-case (`in-progress`), everything else uses `snake_case`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Request attributes
// ---------------------------------------------------------------------------

/// How urgently a requester needs help.
///
/// Variants are declared in ascending order so the derived [`Ord`] ranks
/// `Critical` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Whenever a helper has time.
    Low,
    /// Within the day.
    Normal,
    /// Blocking work right now.
    Critical,
}

/// How the help session is conducted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Written back-and-forth, no shared call.
    Async,
    /// Real-time pairing call.
    Live,
}

// ---------------------------------------------------------------------------
// Lifecycle states
// ---------------------------------------------------------------------------

/// Lifecycle of a request. Transitions only move forward:
/// `Open -> InProgress -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    /// Accepting offers.
    Open,
    /// An offer was accepted and a session is underway.
    InProgress,
    /// The session finished.
    Completed,
}

impl RequestStatus {
    /// Whether moving from `self` to `next` is a legal forward step.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::InProgress) | (Self::InProgress, Self::Completed)
        )
    }
}

/// Lifecycle of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    /// Awaiting the requester's decision.
    Pending,
    /// Chosen by the requester. At most one per request.
    Accepted,
    /// Declined, either explicitly or because a sibling was accepted.
    Declined,
}

/// Lifecycle of a help session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Requester and helper are working together.
    Active,
    /// The session ended.
    Completed,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The kind of activity recorded in the event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new request was posted.
    RequestPosted,
    /// A helper sent an offer on an open request.
    OfferSent,
    /// A requester accepted one offer.
    OfferAccepted,
    /// A session started for an accepted offer.
    SessionStarted,
    /// A session finished.
    SessionCompleted,
}

impl EventType {
    /// All event types in declaration order.
    pub const ALL: [Self; 5] = [
        Self::RequestPosted,
        Self::OfferSent,
        Self::OfferAccepted,
        Self::SessionStarted,
        Self::SessionCompleted,
    ];
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Ordering applied to request listings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Most recently created first.
    #[default]
    Newest,
    /// Critical first, then normal, then low; ties broken by recency.
    Urgent,
    /// Highest budget first; requests without a budget last.
    Budget,
    /// Most filter tags matched first, then urgency, then recency.
    BestMatch,
}
