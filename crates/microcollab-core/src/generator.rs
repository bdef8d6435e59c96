//! Event generator: synthesizes plausible marketplace activity.
//!
//! Each tick picks an [`EventType`] by fixed weights, finds an eligible
//! target in the store, applies the mutation, and records an [`Event`].
//! When the chosen type has nothing to act on (no open request with
//! pending offers, no active session, ...) the tick falls back to posting
//! a new request, which is always possible.
//!
//! The generator holds no randomness of its own. Callers pass the RNG in,
//! so a seeded `SmallRng` makes every tick reproducible.

use chrono::{DateTime, Utc};
use microcollab_types::{
    Event, EventId, EventPayload, EventType, Offer, OfferDraft, OfferStatus, Request,
    RequestStatus, Session, SessionStatus, UserSummary,
};
use rand::Rng;
use tracing::debug;

use crate::config::EventWeights;
use crate::error::MarketError;
use crate::seed::{AVAILABILITY_LABELS, OFFER_MESSAGES, REQUEST_TEMPLATES};
use crate::store::EntityStore;

/// Weighted synthesizer of marketplace events.
#[derive(Debug, Clone, Copy)]
pub struct EventGenerator {
    weights: EventWeights,
}

impl EventGenerator {
    /// Create a generator with the given event weights.
    pub const fn new(weights: EventWeights) -> Self {
        Self { weights }
    }

    /// The configured weights.
    pub const fn weights(&self) -> EventWeights {
        self.weights
    }

    /// Weight assigned to one event type.
    pub const fn weight_of(&self, event_type: EventType) -> u32 {
        match event_type {
            EventType::RequestPosted => self.weights.request_posted,
            EventType::OfferSent => self.weights.offer_sent,
            EventType::OfferAccepted => self.weights.offer_accepted,
            EventType::SessionStarted => self.weights.session_started,
            EventType::SessionCompleted => self.weights.session_completed,
        }
    }

    /// Pick an event type by weight. All-zero weights yield
    /// [`EventType::RequestPosted`].
    pub fn choose_event_type(&self, rng: &mut impl Rng) -> EventType {
        let total = EventType::ALL
            .iter()
            .fold(0_u32, |acc, kind| acc.saturating_add(self.weight_of(*kind)));
        if total == 0 {
            return EventType::RequestPosted;
        }

        let mut roll = rng.random_range(0..total);
        for kind in EventType::ALL {
            let weight = self.weight_of(kind);
            if roll < weight {
                return kind;
            }
            roll = roll.saturating_sub(weight);
        }
        EventType::RequestPosted
    }

    /// Run one tick: choose a type, synthesize it (falling back to a new
    /// request when nothing is eligible), and record the event.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the store has no users to draw
    /// from, or propagates a store error from the mutation.
    pub fn tick(
        &self,
        store: &mut EntityStore,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<Event, MarketError> {
        let chosen = self.choose_event_type(rng);
        let event = match self.synthesize(chosen, store, rng, now)? {
            Some(event) => event,
            None => {
                debug!(?chosen, "No eligible target, posting a request instead");
                self.synthesize(EventType::RequestPosted, store, rng, now)?
                    .ok_or_else(|| MarketError::Internal {
                        context: String::from("request_posted produced no event"),
                    })?
            }
        };
        store.record(event.clone());
        Ok(event)
    }

    /// Synthesize one event of the given type without recording it.
    ///
    /// Returns `Ok(None)` when the store has no eligible target for that
    /// type.
    ///
    /// # Errors
    ///
    /// Propagates store errors. Returns [`MarketError::Internal`] if a
    /// request is needed but the user pool is empty.
    pub fn synthesize(
        &self,
        event_type: EventType,
        store: &mut EntityStore,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>, MarketError> {
        match event_type {
            EventType::RequestPosted => post_request(store, rng, now).map(Some),
            EventType::OfferSent => send_offer(store, rng, now),
            EventType::OfferAccepted => accept_offer(store, rng, now),
            EventType::SessionStarted => start_session(store, rng, now),
            EventType::SessionCompleted => complete_session(store, rng, now),
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

fn post_request(
    store: &mut EntityStore,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<Event, MarketError> {
    let requester = pick(rng, store.users())
        .cloned()
        .ok_or_else(|| MarketError::Internal {
            context: String::from("seed user pool is empty"),
        })?;
    let template = pick(rng, REQUEST_TEMPLATES).ok_or_else(|| MarketError::Internal {
        context: String::from("request template corpus is empty"),
    })?;
    let request = store.post_request(template.to_draft(), requester, now)?;
    Ok(request_posted_event(&request, now))
}

fn send_offer(
    store: &mut EntityStore,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<Option<Event>, MarketError> {
    let candidates: Vec<&Request> = store
        .requests()
        .iter()
        .filter(|r| r.status == RequestStatus::Open && r.accepted_offer().is_none())
        .collect();
    let Some(request) = pick(rng, &candidates) else {
        return Ok(None);
    };
    let request_id = request.id;
    let title = request.title.clone();

    let helpers: Vec<&UserSummary> = store
        .users()
        .iter()
        .filter(|u| u.id != request.requester.id)
        .collect();
    let Some(helper) = pick(rng, &helpers).map(|h| (*h).clone()) else {
        return Ok(None);
    };

    let message = pick(rng, OFFER_MESSAGES).copied().unwrap_or("Happy to help.");
    let availability = pick(rng, AVAILABILITY_LABELS).copied().unwrap_or("available now");

    let offer = store.create_offer(
        OfferDraft {
            request_id,
            message: message.to_owned(),
        },
        helper,
        availability.to_owned(),
        now,
    )?;
    Ok(Some(offer_sent_event(&offer, &title, now)))
}

fn accept_offer(
    store: &mut EntityStore,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<Option<Event>, MarketError> {
    let candidates: Vec<&Request> = store
        .requests()
        .iter()
        .filter(|r| {
            r.status == RequestStatus::Open
                && r.accepted_offer().is_none()
                && r.pending_offer_count() > 0
        })
        .collect();
    let Some(request) = pick(rng, &candidates) else {
        return Ok(None);
    };
    let pending: Vec<&Offer> = request
        .offers
        .iter()
        .filter(|o| o.status == OfferStatus::Pending)
        .collect();
    let Some(offer) = pick(rng, &pending) else {
        return Ok(None);
    };
    let offer_id = offer.id;
    let title = request.title.clone();
    let requester_name = request.requester.name.clone();

    let accepted = store.accept_offer(offer_id)?;
    Ok(Some(offer_accepted_event(
        &accepted.offer,
        &requester_name,
        &title,
        now,
    )))
}

fn start_session(
    store: &mut EntityStore,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<Option<Event>, MarketError> {
    let candidates: Vec<&Request> = store
        .requests()
        .iter()
        .filter(|r| r.status == RequestStatus::Open && r.accepted_offer().is_some())
        .collect();
    let Some(request) = pick(rng, &candidates) else {
        return Ok(None);
    };
    let request_id = request.id;

    let session = store.start_session(request_id, now)?;
    let names = session_names(store, &session)?;
    Ok(Some(session_event(
        EventType::SessionStarted,
        session,
        &names,
        now,
    )))
}

fn complete_session(
    store: &mut EntityStore,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<Option<Event>, MarketError> {
    let active: Vec<&Session> = store
        .sessions()
        .iter()
        .filter(|s| s.status == SessionStatus::Active)
        .collect();
    let Some(session) = pick(rng, &active) else {
        return Ok(None);
    };
    let session_id = session.id;

    let session = store.complete_session(session_id, now)?;
    let names = session_names(store, &session)?;
    Ok(Some(session_event(
        EventType::SessionCompleted,
        session,
        &names,
        now,
    )))
}

/// Pick a uniformly random element.
fn pick<'a, T>(rng: &mut impl Rng, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.random_range(0..items.len()))
}

// ---------------------------------------------------------------------------
// Event construction
// ---------------------------------------------------------------------------

/// Display names and title used in session summaries.
struct SessionNames {
    requester: String,
    helper: String,
    title: String,
}

fn session_names(store: &EntityStore, session: &Session) -> Result<SessionNames, MarketError> {
    let request = store.get_request(session.request_id)?;
    let helper = request
        .offers
        .iter()
        .find(|o| o.id == session.offer_id)
        .map(|o| o.helper.name.clone())
        .ok_or_else(|| MarketError::Internal {
            context: format!(
                "session {} references missing offer {}",
                session.id, session.offer_id
            ),
        })?;
    Ok(SessionNames {
        requester: request.requester.name,
        helper,
        title: request.title,
    })
}

fn session_event(
    event_type: EventType,
    session: Session,
    names: &SessionNames,
    now: DateTime<Utc>,
) -> Event {
    let summary = if event_type == EventType::SessionCompleted {
        format!(
            "{} and {} wrapped up \"{}\"",
            names.requester, names.helper, names.title
        )
    } else {
        format!(
            "{} and {} started a session on \"{}\"",
            names.requester, names.helper, names.title
        )
    };
    Event {
        id: EventId::new(),
        event_type,
        timestamp: now,
        payload: EventPayload::Session(session),
        summary,
    }
}

/// Build the `session_started` or `session_completed` event for a session
/// already applied to `store`.
///
/// # Errors
///
/// Returns [`MarketError::RequestNotFound`] if the session's request is
/// gone, or [`MarketError::Internal`] if its offer is missing.
pub fn session_lifecycle_event(
    store: &EntityStore,
    session: Session,
    now: DateTime<Utc>,
) -> Result<Event, MarketError> {
    let event_type = if session.status == SessionStatus::Completed {
        EventType::SessionCompleted
    } else {
        EventType::SessionStarted
    };
    let names = session_names(store, &session)?;
    Ok(session_event(event_type, session, &names, now))
}

/// Build the `request_posted` event for a new request.
pub fn request_posted_event(request: &Request, now: DateTime<Utc>) -> Event {
    Event {
        id: EventId::new(),
        event_type: EventType::RequestPosted,
        timestamp: now,
        payload: EventPayload::Request(Box::new(request.clone())),
        summary: format!("{} posted \"{}\"", request.requester.name, request.title),
    }
}

/// Build the `offer_sent` event for a new offer on the request titled
/// `title`.
pub fn offer_sent_event(offer: &Offer, title: &str, now: DateTime<Utc>) -> Event {
    Event {
        id: EventId::new(),
        event_type: EventType::OfferSent,
        timestamp: now,
        payload: EventPayload::Offer(Box::new(offer.clone())),
        summary: format!("{} offered to help with \"{title}\"", offer.helper.name),
    }
}

/// Build the `offer_accepted` event.
pub fn offer_accepted_event(
    offer: &Offer,
    requester_name: &str,
    title: &str,
    now: DateTime<Utc>,
) -> Event {
    Event {
        id: EventId::new(),
        event_type: EventType::OfferAccepted,
        timestamp: now,
        payload: EventPayload::Offer(Box::new(offer.clone())),
        summary: format!(
            "{requester_name} accepted {}'s offer on \"{title}\"",
            offer.helper.name
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::collections::BTreeMap;

    use microcollab_types::{RequestFilters, SortOption};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::seed;

    fn seeded_store() -> EntityStore {
        let mut store = EntityStore::new(seed::seed_users(), 50);
        let _ = store.seed(12, Utc::now());
        store
    }

    fn generator() -> EventGenerator {
        EventGenerator::new(EventWeights::default())
    }

    #[test]
    fn weighted_choice_favors_posting_and_offers() {
        let generator = generator();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut counts: BTreeMap<EventType, u32> = BTreeMap::new();
        for _ in 0..10_000 {
            let kind = generator.choose_event_type(&mut rng);
            *counts.entry(kind).or_insert(0) += 1;
        }
        let count = |kind| counts.get(&kind).copied().unwrap_or(0);
        assert!(count(EventType::RequestPosted) > count(EventType::OfferAccepted));
        assert!(count(EventType::OfferSent) > count(EventType::SessionStarted));
        assert!(count(EventType::OfferSent) > count(EventType::SessionCompleted));
        assert!(EventType::ALL.iter().all(|kind| count(*kind) > 0));
    }

    #[test]
    fn zero_weight_disables_an_event_type() {
        let generator = EventGenerator::new(EventWeights {
            session_completed: 0,
            offer_accepted: 0,
            ..EventWeights::default()
        });
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..2_000 {
            let kind = generator.choose_event_type(&mut rng);
            assert_ne!(kind, EventType::SessionCompleted);
            assert_ne!(kind, EventType::OfferAccepted);
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let generator = generator();
        let mut a = SmallRng::seed_from_u64(1234);
        let mut b = SmallRng::seed_from_u64(1234);
        let first: Vec<EventType> = (0..50).map(|_| generator.choose_event_type(&mut a)).collect();
        let second: Vec<EventType> = (0..50).map(|_| generator.choose_event_type(&mut b)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn request_posted_adds_exactly_one_newest_request() {
        let generator = generator();
        let mut store = seeded_store();
        let mut rng = SmallRng::seed_from_u64(7);
        let before = store.get_stats().total_requests;

        let event = generator
            .synthesize(EventType::RequestPosted, &mut store, &mut rng, Utc::now())
            .unwrap()
            .unwrap();

        assert_eq!(store.get_stats().total_requests, before + 1);
        let EventPayload::Request(posted) = &event.payload else {
            panic!("expected a request payload");
        };
        let filters = RequestFilters {
            sort: SortOption::Newest,
            ..RequestFilters::default()
        };
        let newest = store.get_all_requests(&filters).unwrap();
        assert_eq!(newest.first().map(|r| r.id), Some(posted.id));
    }

    #[test]
    fn acceptance_without_pending_offers_yields_none() {
        let generator = generator();
        let mut store = EntityStore::new(seed::seed_users(), 10);
        let mut rng = SmallRng::seed_from_u64(3);
        let result = generator
            .synthesize(EventType::OfferAccepted, &mut store, &mut rng, Utc::now())
            .unwrap();
        assert!(result.is_none());
        let completed = generator
            .synthesize(EventType::SessionCompleted, &mut store, &mut rng, Utc::now())
            .unwrap();
        assert!(completed.is_none());
    }

    #[test]
    fn tick_falls_back_to_posting_when_nothing_is_eligible() {
        let generator = EventGenerator::new(EventWeights {
            request_posted: 1,
            offer_sent: 0,
            offer_accepted: 0,
            session_started: 1_000,
            session_completed: 0,
        });
        let mut store = EntityStore::new(seed::seed_users(), 10);
        let mut rng = SmallRng::seed_from_u64(5);
        let event = generator.tick(&mut store, &mut rng, Utc::now()).unwrap();
        assert_eq!(event.event_type, EventType::RequestPosted);
        assert_eq!(store.get_stats().total_requests, 1);
        assert_eq!(store.event_log().len(), 1);
    }

    #[test]
    fn tick_with_empty_user_pool_is_internal_error() {
        let generator = generator();
        let mut store = EntityStore::new(Vec::new(), 10);
        let mut rng = SmallRng::seed_from_u64(5);
        let result = generator.tick(&mut store, &mut rng, Utc::now());
        assert!(matches!(result, Err(MarketError::Internal { .. })));
    }

    #[test]
    fn each_event_type_mutates_its_collection() {
        let generator = generator();
        let mut store = seeded_store();
        let mut rng = SmallRng::seed_from_u64(11);
        let now = Utc::now();

        let offer = generator
            .synthesize(EventType::OfferSent, &mut store, &mut rng, now)
            .unwrap()
            .unwrap();
        assert_eq!(offer.event_type, EventType::OfferSent);
        assert_eq!(store.get_stats().total_offers, 5);

        let accepted = generator
            .synthesize(EventType::OfferAccepted, &mut store, &mut rng, now)
            .unwrap()
            .unwrap();
        let EventPayload::Offer(accepted_offer) = &accepted.payload else {
            panic!("expected an offer payload");
        };
        assert_eq!(accepted_offer.status, OfferStatus::Accepted);

        let started = generator
            .synthesize(EventType::SessionStarted, &mut store, &mut rng, now)
            .unwrap()
            .unwrap();
        assert_eq!(started.event_type, EventType::SessionStarted);
        assert_eq!(store.get_stats().active_sessions, 1);

        let completed = generator
            .synthesize(EventType::SessionCompleted, &mut store, &mut rng, now)
            .unwrap()
            .unwrap();
        assert!(completed.summary.contains("wrapped up"));
        let stats = store.get_stats();
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.completed_sessions, 1);
    }

    #[test]
    fn long_run_preserves_invariants() {
        let generator = generator();
        let mut store = seeded_store();
        let mut rng = SmallRng::seed_from_u64(2024);
        for _ in 0..500 {
            let _ = generator.tick(&mut store, &mut rng, Utc::now()).unwrap();
            let stats = store.get_stats();
            assert!(stats.active_requests <= stats.total_requests);
            assert!(stats.active_sessions + stats.completed_sessions <= stats.total_sessions);
            for request in store.requests() {
                let accepted = request
                    .offers
                    .iter()
                    .filter(|o| o.status == OfferStatus::Accepted)
                    .count();
                assert!(accepted <= 1);
                if request.status != RequestStatus::Open {
                    assert_eq!(accepted, 1);
                    assert_eq!(request.pending_offer_count(), 0);
                }
            }
        }
        assert_eq!(store.event_log().len(), 50);
        assert_eq!(store.event_log().total_recorded(), 500);
    }
}
