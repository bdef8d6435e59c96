//! Core entity structs for the MicroCollab marketplace.
//!
//! Covers users, requests, offers, sessions, the activity event record,
//! derived statistics, and the listing filter carried by the dashboard.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::{Validate, ValidationError};

use crate::enums::{
    EventType, Mode, OfferStatus, RequestStatus, SessionStatus, SortOption, Urgency,
};
use crate::ids::{EventId, OfferId, RequestId, SessionId, UserId};

/// Shortest session a request may ask for, in hours.
pub const MIN_DURATION_HOURS: u8 = 1;

/// Longest session a request may ask for, in hours.
pub const MAX_DURATION_HOURS: u8 = 4;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Public profile of a marketplace user, embedded in requests and offers.
///
/// Drawn from a fixed seed pool; the simulation never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserSummary {
    /// Unique user identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Avatar indicator (initials or emoji) rendered by the dashboard.
    pub avatar: String,
    /// Average rating between 0 and 5.
    #[ts(as = "String")]
    pub rating: Decimal,
    /// Number of sessions this user has completed as a helper.
    pub sessions_completed: u32,
    /// Skills the user advertises.
    pub skills: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Requests and offers
// ---------------------------------------------------------------------------

/// Optional payment attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Budget {
    /// Amount in major currency units.
    #[ts(as = "String")]
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// A helper's proposal to fulfill a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Offer {
    /// Unique offer identifier.
    pub id: OfferId,
    /// The request this offer answers.
    pub request_id: RequestId,
    /// The helper making the offer.
    pub helper: UserSummary,
    /// Free-text pitch from the helper.
    pub message: String,
    /// When the helper is available (e.g. "in 15 min").
    pub availability: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Current offer status.
    pub status: OfferStatus,
}

/// A posted ask for short-session developer help.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Request {
    /// Unique request identifier.
    pub id: RequestId,
    /// One-line summary of the problem.
    pub title: String,
    /// Longer problem description.
    pub description: String,
    /// Technology tags; order is irrelevant.
    pub tags: BTreeSet<String>,
    /// How urgently help is needed.
    pub urgency: Urgency,
    /// Async or live collaboration.
    pub mode: Mode,
    /// Expected session length in hours (1 to 4).
    pub duration_hours: u8,
    /// Optional payment offered.
    pub budget: Option<Budget>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// The user who posted the request.
    pub requester: UserSummary,
    /// Offers received, in arrival order.
    pub offers: Vec<Offer>,
}

impl Request {
    /// Return the accepted offer, if any.
    pub fn accepted_offer(&self) -> Option<&Offer> {
        self.offers
            .iter()
            .find(|offer| offer.status == OfferStatus::Accepted)
    }

    /// Number of offers still awaiting a decision.
    pub fn pending_offer_count(&self) -> usize {
        self.offers
            .iter()
            .filter(|offer| offer.status == OfferStatus::Pending)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// A collaboration resulting from an accepted offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// The request being worked on.
    pub request_id: RequestId,
    /// The accepted offer that produced this session.
    pub offer_id: OfferId,
    /// The requester.
    pub requester_id: UserId,
    /// The helper.
    pub helper_id: UserId,
    /// Current session status.
    pub status: SessionStatus,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session completed, if it has.
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The entity an [`Event`] refers to, captured as a snapshot at the time
/// of the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// A request snapshot.
    Request(Box<Request>),
    /// An offer snapshot.
    Offer(Box<Offer>),
    /// A session snapshot.
    Session(Session),
}

/// A timestamped record of a marketplace state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// The category of event.
    pub event_type: EventType,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The entity the event refers to.
    pub payload: EventPayload,
    /// Human-readable line for the activity feed.
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Aggregate marketplace counters. Always derived from store state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Stats {
    /// All requests ever posted.
    pub total_requests: usize,
    /// Requests that are open or in progress.
    pub active_requests: usize,
    /// All offers across all requests.
    pub total_offers: usize,
    /// Sessions currently underway.
    pub active_sessions: usize,
    /// Sessions that finished.
    pub completed_sessions: usize,
    /// All sessions ever started.
    pub total_sessions: usize,
    /// Seed-pool helpers not currently in an active session.
    pub available_helpers: usize,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Listing filter applied to `get_all_requests`.
///
/// An empty set or `None` bound places no restriction on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
#[validate(schema(function = "validate_duration_bounds"))]
pub struct RequestFilters {
    /// Keep requests sharing at least one of these tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Keep requests whose urgency is in this set.
    #[serde(default)]
    pub urgency: BTreeSet<Urgency>,
    /// Keep requests whose mode is in this set.
    #[serde(default)]
    pub mode: BTreeSet<Mode>,
    /// Inclusive lower bound on duration hours.
    #[serde(default)]
    #[validate(range(min = 1, max = 4))]
    pub duration_min: Option<u8>,
    /// Inclusive upper bound on duration hours.
    #[serde(default)]
    #[validate(range(min = 1, max = 4))]
    pub duration_max: Option<u8>,
    /// Result ordering.
    #[serde(default)]
    pub sort: SortOption,
}

impl RequestFilters {
    /// Merge a partial update into this filter. Fields left as `None` in
    /// the update keep their current value.
    pub fn merge(&mut self, update: FilterUpdate) {
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(urgency) = update.urgency {
            self.urgency = urgency;
        }
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(min) = update.duration_min {
            self.duration_min = min;
        }
        if let Some(max) = update.duration_max {
            self.duration_max = max;
        }
        if let Some(sort) = update.sort {
            self.sort = sort;
        }
    }
}

/// Rejects a filter whose lower duration bound exceeds its upper bound.
fn validate_duration_bounds(filters: &RequestFilters) -> Result<(), ValidationError> {
    match (filters.duration_min, filters.duration_max) {
        (Some(min), Some(max)) if min > max => {
            Err(ValidationError::new("duration_min_exceeds_max"))
        }
        _ => Ok(()),
    }
}

/// A partial filter change sent by the dashboard.
///
/// The outer `Option` says whether a field is being changed; for the
/// duration bounds the inner `Option` allows clearing a bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FilterUpdate {
    /// Replacement tag set.
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    /// Replacement urgency set.
    #[serde(default)]
    pub urgency: Option<BTreeSet<Urgency>>,
    /// Replacement mode set.
    #[serde(default)]
    pub mode: Option<BTreeSet<Mode>>,
    /// Replacement lower duration bound.
    #[serde(default)]
    pub duration_min: Option<Option<u8>>,
    /// Replacement upper duration bound.
    #[serde(default)]
    pub duration_max: Option<Option<u8>>,
    /// Replacement sort order.
    #[serde(default)]
    pub sort: Option<SortOption>,
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// User input for a new offer, validated before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct OfferDraft {
    /// The request being answered.
    pub request_id: RequestId,
    /// The helper's pitch. Must contain non-whitespace text.
    #[validate(length(min = 1, max = 1000), custom(function = "not_blank"))]
    pub message: String,
}

/// User input for a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Validate)]
#[ts(export, export_to = "bindings/")]
pub struct RequestDraft {
    /// One-line summary.
    #[validate(length(min = 1, max = 140), custom(function = "not_blank"))]
    pub title: String,
    /// Longer description.
    #[validate(length(max = 4000))]
    pub description: String,
    /// Technology tags.
    pub tags: BTreeSet<String>,
    /// Urgency.
    pub urgency: Urgency,
    /// Collaboration mode.
    pub mode: Mode,
    /// Session length in hours.
    #[validate(range(min = 1, max = 4))]
    pub duration_hours: u8,
    /// Optional payment.
    pub budget: Option<Budget>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_untouched_fields() {
        let mut filters = RequestFilters {
            tags: BTreeSet::from([String::from("rust")]),
            duration_max: Some(3),
            ..RequestFilters::default()
        };
        filters.merge(FilterUpdate {
            sort: Some(SortOption::Urgent),
            duration_min: Some(Some(2)),
            ..FilterUpdate::default()
        });
        assert!(filters.tags.contains("rust"));
        assert_eq!(filters.duration_min, Some(2));
        assert_eq!(filters.duration_max, Some(3));
        assert_eq!(filters.sort, SortOption::Urgent);
    }

    #[test]
    fn merge_can_clear_a_bound() {
        let mut filters = RequestFilters {
            duration_min: Some(2),
            ..RequestFilters::default()
        };
        filters.merge(FilterUpdate {
            duration_min: Some(None),
            ..FilterUpdate::default()
        });
        assert_eq!(filters.duration_min, None);
    }

    #[test]
    fn inverted_duration_bounds_are_rejected() {
        let filters = RequestFilters {
            duration_min: Some(4),
            duration_max: Some(1),
            ..RequestFilters::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn out_of_range_duration_bound_is_rejected() {
        let filters = RequestFilters {
            duration_max: Some(9),
            ..RequestFilters::default()
        };
        assert!(filters.validate().is_err());
        assert!(RequestFilters::default().validate().is_ok());
    }

    #[test]
    fn blank_offer_message_is_rejected() {
        let draft = OfferDraft {
            request_id: RequestId::new(),
            message: String::from("   "),
        };
        assert!(draft.validate().is_err());

        let empty = OfferDraft {
            request_id: RequestId::new(),
            message: String::new(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn event_payload_is_tagged() {
        let session = Session {
            id: SessionId::new(),
            request_id: RequestId::new(),
            offer_id: OfferId::new(),
            requester_id: UserId::new(),
            helper_id: UserId::new(),
            status: SessionStatus::Active,
            started_at: Utc::now(),
            completed_at: None,
        };
        let json = serde_json::to_value(EventPayload::Session(session)).ok();
        let kind = json
            .as_ref()
            .and_then(|value| value.get("kind"))
            .and_then(serde_json::Value::as_str);
        assert_eq!(kind, Some("session"));
    }
}
