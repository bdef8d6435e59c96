//! Entity store: the authoritative, in-memory marketplace state.
//!
//! The store owns every request (with its offers), every session, the seed
//! user pool, and the bounded event log. All operations are synchronous and
//! validate before they mutate, so a failed call leaves the store exactly
//! as it was.
//!
//! Reads hand out owned snapshots. A `Vec<Request>` returned by
//! [`EntityStore::get_all_requests`] never changes after the fact.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use microcollab_types::{
    Event, Offer, OfferDraft, OfferId, OfferStatus, Request, RequestDraft, RequestFilters,
    RequestId, RequestStatus, Session, SessionId, SessionStatus, SortOption, Stats, UserId,
    UserSummary,
};
use tracing::debug;
use validator::Validate;

use crate::error::MarketError;
use crate::event_log::EventLog;
use crate::seed;

/// Result of accepting an offer.
#[derive(Debug, Clone)]
pub struct AcceptedOffer {
    /// The accepted offer.
    pub offer: Offer,
    /// Sibling offers that were declined as a consequence.
    pub declined: Vec<OfferId>,
}

/// In-memory marketplace state.
#[derive(Debug, Clone)]
pub struct EntityStore {
    /// Requests in insertion order.
    requests: Vec<Request>,
    /// Sessions in start order.
    sessions: Vec<Session>,
    /// The fixed seed user pool.
    users: Vec<UserSummary>,
    /// Recent activity.
    events: EventLog,
}

impl EntityStore {
    /// Create an empty store over the given user pool.
    pub fn new(users: Vec<UserSummary>, event_capacity: usize) -> Self {
        Self {
            requests: Vec::new(),
            sessions: Vec::new(),
            users,
            events: EventLog::new(event_capacity),
        }
    }

    /// Replace all requests and sessions with the deterministic initial
    /// listing. The event log is cleared. Returns the number of requests.
    pub fn seed(&mut self, count: usize, now: DateTime<Utc>) -> usize {
        self.requests = seed::initial_requests(&self.users, count, now);
        self.sessions.clear();
        self.events.clear();
        debug!(requests = self.requests.len(), "Store seeded");
        self.requests.len()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Return the requests matching `filters`, ordered by `filters.sort`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the filter is malformed
    /// (e.g. inverted duration bounds).
    pub fn get_all_requests(&self, filters: &RequestFilters) -> Result<Vec<Request>, MarketError> {
        filters.validate()?;

        // Newest insertion first so equal timestamps still sort newest-first.
        let mut matched: Vec<Request> = self
            .requests
            .iter()
            .rev()
            .filter(|request| matches_filters(request, filters))
            .cloned()
            .collect();

        sort_requests(&mut matched, filters);
        Ok(matched)
    }

    /// Look up a single request.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::RequestNotFound`] if the ID is unknown.
    pub fn get_request(&self, id: RequestId) -> Result<Request, MarketError> {
        self.request(id).cloned().ok_or(MarketError::RequestNotFound(id))
    }

    /// Look up a single session.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SessionNotFound`] if the ID is unknown.
    pub fn get_session(&self, id: SessionId) -> Result<Session, MarketError> {
        self.sessions
            .iter()
            .find(|session| session.id == id)
            .cloned()
            .ok_or(MarketError::SessionNotFound(id))
    }

    /// Recompute aggregate statistics from current state.
    pub fn get_stats(&self) -> Stats {
        let active_requests = self
            .requests
            .iter()
            .filter(|r| r.status != RequestStatus::Completed)
            .count();
        let total_offers: usize = self.requests.iter().map(|r| r.offers.len()).sum();
        let busy_helpers: BTreeSet<UserId> = self
            .sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| s.helper_id)
            .collect();
        let active_sessions = self
            .sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count();
        let completed_sessions = self
            .sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Completed)
            .count();

        Stats {
            total_requests: self.requests.len(),
            active_requests,
            total_offers,
            active_sessions,
            completed_sessions,
            total_sessions: self.sessions.len(),
            available_helpers: self
                .users
                .iter()
                .filter(|u| !busy_helpers.contains(&u.id))
                .count(),
        }
    }

    /// Return up to `limit` recent events, newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<Event> {
        self.events.recent(limit)
    }

    /// The seed user pool.
    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    /// All requests in insertion order.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// All sessions in start order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// The event log.
    pub const fn event_log(&self) -> &EventLog {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append an event to the log.
    pub fn record(&mut self, event: Event) {
        let _ = self.events.push(event);
    }

    /// Post a new open request.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the draft is malformed.
    pub fn post_request(
        &mut self,
        draft: RequestDraft,
        requester: UserSummary,
        now: DateTime<Utc>,
    ) -> Result<Request, MarketError> {
        draft.validate()?;
        let request = seed::request_from_draft(draft, requester, now);
        self.requests.push(request.clone());
        Ok(request)
    }

    /// Check that `draft` could become an offer right now and return the
    /// request it targets. The request is looked up before the message is
    /// validated, so a bad message on a closed request reports not-found.
    ///
    /// # Errors
    ///
    /// - [`MarketError::OpenRequestNotFound`] if the request does not exist
    ///   or is not open.
    /// - [`MarketError::InvalidTransition`] if the request already has an
    ///   accepted offer.
    /// - [`MarketError::Validation`] if the message is empty or too long.
    pub fn offer_target(&self, draft: &OfferDraft) -> Result<&Request, MarketError> {
        let request_id = draft.request_id;
        let request = self
            .request(request_id)
            .filter(|r| r.status == RequestStatus::Open)
            .ok_or(MarketError::OpenRequestNotFound(request_id))?;
        if request.accepted_offer().is_some() {
            return Err(MarketError::InvalidTransition {
                reason: format!("request {request_id} already has an accepted offer"),
            });
        }
        draft.validate()?;
        Ok(request)
    }

    /// Add a pending offer from `helper` to an open request.
    ///
    /// # Errors
    ///
    /// Everything [`EntityStore::offer_target`] reports, plus
    /// [`MarketError::InvalidTransition`] if the helper is the requester.
    pub fn create_offer(
        &mut self,
        draft: OfferDraft,
        helper: UserSummary,
        availability: String,
        now: DateTime<Utc>,
    ) -> Result<Offer, MarketError> {
        let request_id = self.offer_target(&draft)?.id;
        let request = self
            .request_mut(request_id)
            .ok_or(MarketError::OpenRequestNotFound(request_id))?;
        if request.requester.id == helper.id {
            return Err(MarketError::InvalidTransition {
                reason: format!("requester cannot offer on their own request {request_id}"),
            });
        }

        let offer = seed::pending_offer(request_id, helper, draft.message, availability, now);
        request.offers.push(offer.clone());
        Ok(offer)
    }

    /// Accept a pending offer. Every other pending offer on the same
    /// request is declined. The request stays open until its session
    /// starts.
    ///
    /// # Errors
    ///
    /// - [`MarketError::OfferNotFound`] if no request holds the offer.
    /// - [`MarketError::InvalidTransition`] if the request is not open, an
    ///   offer was already accepted, or the offer is not pending.
    pub fn accept_offer(&mut self, offer_id: OfferId) -> Result<AcceptedOffer, MarketError> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.offers.iter().any(|o| o.id == offer_id))
            .ok_or(MarketError::OfferNotFound(offer_id))?;

        if request.status != RequestStatus::Open {
            return Err(MarketError::InvalidTransition {
                reason: format!(
                    "request {} is {:?}; offers can only be accepted while open",
                    request.id, request.status
                ),
            });
        }
        if request.accepted_offer().is_some() {
            return Err(MarketError::InvalidTransition {
                reason: format!("request {} already has an accepted offer", request.id),
            });
        }

        let target_status = request
            .offers
            .iter()
            .find(|o| o.id == offer_id)
            .map(|o| o.status)
            .ok_or(MarketError::OfferNotFound(offer_id))?;
        if target_status != OfferStatus::Pending {
            return Err(MarketError::InvalidTransition {
                reason: format!("offer {offer_id} is {target_status:?}, not pending"),
            });
        }

        let mut accepted = None;
        let mut declined = Vec::new();
        for offer in &mut request.offers {
            if offer.id == offer_id {
                offer.status = OfferStatus::Accepted;
                accepted = Some(offer.clone());
            } else if offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Declined;
                declined.push(offer.id);
            }
        }

        let offer = accepted.ok_or_else(|| MarketError::Internal {
            context: format!("offer {offer_id} vanished while accepting"),
        })?;
        Ok(AcceptedOffer { offer, declined })
    }

    /// Start a session for a request with an accepted offer, moving the
    /// request from open to in-progress.
    ///
    /// # Errors
    ///
    /// - [`MarketError::RequestNotFound`] if the request does not exist.
    /// - [`MarketError::InvalidTransition`] if the request is not open or
    ///   has no accepted offer.
    pub fn start_session(
        &mut self,
        request_id: RequestId,
        now: DateTime<Utc>,
    ) -> Result<Session, MarketError> {
        let request = self
            .request_mut(request_id)
            .ok_or(MarketError::RequestNotFound(request_id))?;

        if !request.status.can_advance_to(RequestStatus::InProgress) {
            return Err(MarketError::InvalidTransition {
                reason: format!(
                    "request {request_id} cannot move from {:?} to InProgress",
                    request.status
                ),
            });
        }
        let offer = request
            .accepted_offer()
            .ok_or_else(|| MarketError::InvalidTransition {
                reason: format!("request {request_id} has no accepted offer"),
            })?;

        let session = Session {
            id: SessionId::new(),
            request_id,
            offer_id: offer.id,
            requester_id: request.requester.id,
            helper_id: offer.helper.id,
            status: SessionStatus::Active,
            started_at: now,
            completed_at: None,
        };
        request.status = RequestStatus::InProgress;
        self.sessions.push(session.clone());
        Ok(session)
    }

    /// Complete an active session, moving its request to completed.
    ///
    /// # Errors
    ///
    /// - [`MarketError::SessionNotFound`] if the session does not exist.
    /// - [`MarketError::InvalidTransition`] if it is already completed.
    /// - [`MarketError::Internal`] if its request is missing or not in
    ///   progress.
    pub fn complete_session(
        &mut self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<Session, MarketError> {
        let session_index = self
            .sessions
            .iter()
            .position(|s| s.id == session_id)
            .ok_or(MarketError::SessionNotFound(session_id))?;
        let session = self
            .sessions
            .get(session_index)
            .ok_or(MarketError::SessionNotFound(session_id))?;

        if session.status != SessionStatus::Active {
            return Err(MarketError::InvalidTransition {
                reason: format!("session {session_id} is already completed"),
            });
        }

        let request_id = session.request_id;
        let request = self
            .request_mut(request_id)
            .ok_or_else(|| MarketError::Internal {
                context: format!("session {session_id} references missing request {request_id}"),
            })?;
        if !request.status.can_advance_to(RequestStatus::Completed) {
            return Err(MarketError::Internal {
                context: format!(
                    "session {session_id} is active but request {request_id} is {:?}",
                    request.status
                ),
            });
        }
        request.status = RequestStatus::Completed;

        let session = self
            .sessions
            .get_mut(session_index)
            .ok_or(MarketError::SessionNotFound(session_id))?;
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        Ok(session.clone())
    }

    fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.iter().find(|r| r.id == id)
    }

    fn request_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.requests.iter_mut().find(|r| r.id == id)
    }
}

/// Whether a request satisfies every populated filter dimension.
pub fn matches_filters(request: &Request, filters: &RequestFilters) -> bool {
    if !filters.tags.is_empty() && filters.tags.is_disjoint(&request.tags) {
        return false;
    }
    if !filters.urgency.is_empty() && !filters.urgency.contains(&request.urgency) {
        return false;
    }
    if !filters.mode.is_empty() && !filters.mode.contains(&request.mode) {
        return false;
    }
    if filters
        .duration_min
        .is_some_and(|min| request.duration_hours < min)
    {
        return false;
    }
    if filters
        .duration_max
        .is_some_and(|max| request.duration_hours > max)
    {
        return false;
    }
    true
}

/// Number of filter tags a request carries.
fn tag_overlap(request: &Request, filters: &RequestFilters) -> usize {
    filters.tags.intersection(&request.tags).count()
}

/// Sort in place according to `filters.sort`. Ties always fall back to
/// newest-first.
fn sort_requests(requests: &mut [Request], filters: &RequestFilters) {
    let newest = |a: &Request, b: &Request| b.created_at.cmp(&a.created_at);
    match filters.sort {
        SortOption::Newest => requests.sort_by(newest),
        SortOption::Urgent => requests.sort_by(|a, b| {
            b.urgency.cmp(&a.urgency).then_with(|| newest(a, b))
        }),
        SortOption::Budget => requests.sort_by(|a, b| {
            let amount = |r: &Request| r.budget.as_ref().map(|budget| budget.amount);
            // `None` sorts below any amount, so reversing puts it last.
            Reverse(amount(a))
                .cmp(&Reverse(amount(b)))
                .then_with(|| newest(a, b))
        }),
        SortOption::BestMatch => requests.sort_by(|a, b| {
            match tag_overlap(b, filters).cmp(&tag_overlap(a, filters)) {
                Ordering::Equal => b.urgency.cmp(&a.urgency).then_with(|| newest(a, b)),
                other => other,
            }
        }),
    }
}
