//! Simulation context: store, generator, listeners, and the tick timer.
//!
//! [`Simulation`] is an explicit context object rather than a process-wide
//! singleton. Create one per dashboard (or per test), hand clones of it to
//! the views that need it, and call [`Simulation::dispose`] on teardown.
//!
//! # Lifecycle
//!
//! The generator has two states. [`Simulation::start`] moves `Idle ->
//! Running` and spawns one Tokio task that sleeps a random delay, ticks,
//! and repeats. Calling it again while running is a no-op.
//! [`Simulation::stop`] moves back to `Idle` by aborting that task. Abort
//! only takes effect at the task's next await point (the sleep), so a tick
//! that is already running always completes.
//!
//! # Consistency
//!
//! Every mutation happens inside one short critical section on the store
//! mutex, and listeners are notified only after the lock is released. A
//! reader never sees a half-applied tick, and listeners are free to read
//! the store from inside their callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use microcollab_types::{
    Event, EventType, Offer, OfferDraft, OfferId, Request, RequestDraft, RequestFilters,
    RequestId, Session, SessionId, Stats,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{SimulationConfig, TickConfig};
use crate::error::MarketError;
use crate::generator::{self, EventGenerator};
use crate::listeners::{Listeners, Subscription};
use crate::seed::{self, AVAILABILITY_LABELS};
use crate::store::EntityStore;

/// Whether the event generator is currently scheduling ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// No timer is pending.
    Idle,
    /// A timer task is scheduling ticks.
    Running,
}

/// Shared handle to one marketplace simulation.
///
/// Cloning is cheap and every clone drives the same state. When the last
/// clone is dropped the timer task is aborted.
#[derive(Clone)]
pub struct Simulation {
    inner: Arc<Inner>,
}

struct Inner {
    store: Mutex<EntityStore>,
    rng: Mutex<SmallRng>,
    generator: EventGenerator,
    listeners: Listeners,
    ticks: TickConfig,
    initial_requests: usize,
    ticks_run: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(timer) = self.timer.get_mut() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

impl core::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state())
            .field("ticks_run", &self.ticks_run())
            .field("listeners", &self.inner.listeners)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create an idle simulation with an empty store, drawing randomness
    /// from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the configuration is invalid.
    pub fn create(config: &SimulationConfig, rng: SmallRng) -> Result<Self, MarketError> {
        config.validate().map_err(|err| MarketError::Validation {
            reason: err.to_string(),
        })?;

        let store = EntityStore::new(seed::seed_users(), config.event_log.capacity);
        info!(
            seed = config.market.seed,
            event_log_capacity = config.event_log.capacity,
            min_interval_ms = config.ticks.min_interval_ms,
            max_interval_ms = config.ticks.max_interval_ms,
            "Simulation created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store: Mutex::new(store),
                rng: Mutex::new(rng),
                generator: EventGenerator::new(config.weights),
                listeners: Listeners::new(),
                ticks: config.ticks,
                initial_requests: config.market.initial_requests,
                ticks_run: AtomicU64::new(0),
                timer: Mutex::new(None),
            }),
        })
    }

    /// Create a simulation seeded from `config.market.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the configuration is invalid.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, MarketError> {
        Self::create(config, SmallRng::seed_from_u64(config.market.seed))
    }

    /// Stop the timer and drop every listener. The store keeps its data so
    /// late readers still see the final state.
    pub fn dispose(&self) {
        let _ = self.stop();
        self.inner.listeners.clear();
        info!("Simulation disposed");
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Replace the store contents with the deterministic initial listing.
    /// Returns the number of requests seeded.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the store lock is poisoned.
    pub fn load_initial_data(&self) -> Result<usize, MarketError> {
        let count = self
            .store()?
            .seed(self.inner.initial_requests, Utc::now());
        info!(requests = count, "Initial marketplace data loaded");
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    /// Start generating events. Returns `true` if a timer was started and
    /// `false` if one was already running.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if called outside a Tokio runtime
    /// or a lock is poisoned.
    pub fn start(&self) -> Result<bool, MarketError> {
        let mut timer = lock(&self.inner.timer, "timer")?;
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Simulation already running");
            return Ok(false);
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|err| MarketError::Internal {
                context: format!("starting the simulation requires a Tokio runtime: {err}"),
            })?;
        *timer = Some(runtime.spawn(run_timer(Arc::downgrade(&self.inner))));
        info!("Simulation started");
        Ok(true)
    }

    /// Stop generating events. Returns `true` if a running timer was
    /// cancelled; calling it while idle is a no-op.
    pub fn stop(&self) -> bool {
        let handle = match self.inner.timer.lock() {
            Ok(mut timer) => timer.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match handle {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                info!("Simulation stopped");
                was_running
            }
            None => false,
        }
    }

    /// Current generator state.
    pub fn state(&self) -> GeneratorState {
        let running = self.inner.timer.lock().is_ok_and(|timer| {
            timer.as_ref().is_some_and(|handle| !handle.is_finished())
        });
        if running {
            GeneratorState::Running
        } else {
            GeneratorState::Idle
        }
    }

    /// Whether the generator is running.
    pub fn is_running(&self) -> bool {
        self.state() == GeneratorState::Running
    }

    /// Number of ticks executed since creation, whether by the timer or
    /// by [`Simulation::tick_now`].
    pub fn ticks_run(&self) -> u64 {
        self.inner.ticks_run.load(Ordering::Acquire)
    }

    /// Run one tick immediately, outside the timer schedule.
    ///
    /// # Errors
    ///
    /// Propagates generator and store errors. Nothing is recorded or
    /// notified on failure.
    pub fn tick_now(&self) -> Result<Event, MarketError> {
        self.inner.tick()
    }

    /// Synthesize, record, and broadcast one event of a specific type.
    /// Returns `Ok(None)` when the store has no eligible target.
    ///
    /// # Errors
    ///
    /// Propagates generator and store errors.
    pub fn synthesize(&self, event_type: EventType) -> Result<Option<Event>, MarketError> {
        let event = {
            let mut store = self.store()?;
            let mut rng = lock(&self.inner.rng, "rng")?;
            let event =
                self.inner
                    .generator
                    .synthesize(event_type, &mut store, &mut *rng, Utc::now())?;
            if let Some(ref event) = event {
                store.record(event.clone());
            }
            event
        };
        if let Some(ref event) = event {
            let _ = self.inner.listeners.notify(event);
        }
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Return a snapshot of requests matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for a malformed filter.
    pub fn get_all_requests(&self, filters: &RequestFilters) -> Result<Vec<Request>, MarketError> {
        self.store()?.get_all_requests(filters)
    }

    /// Look up one request.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::RequestNotFound`] for an unknown ID.
    pub fn get_request(&self, id: RequestId) -> Result<Request, MarketError> {
        self.store()?.get_request(id)
    }

    /// Recompute statistics from the current store state.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the store lock is poisoned.
    pub fn get_stats(&self) -> Result<Stats, MarketError> {
        Ok(self.store()?.get_stats())
    }

    /// Up to `limit` recent events, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the store lock is poisoned.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<Event>, MarketError> {
        Ok(self.store()?.recent_events(limit))
    }

    /// Every session, in start order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the store lock is poisoned.
    pub fn sessions(&self) -> Result<Vec<Session>, MarketError> {
        Ok(self.store()?.sessions().to_vec())
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    /// Send an offer on behalf of a helper drawn from the seed pool.
    ///
    /// Records an `offer_sent` event and notifies listeners.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] for an empty or oversized message.
    /// - [`MarketError::OpenRequestNotFound`] if the request is unknown or
    ///   not open.
    /// - [`MarketError::InvalidTransition`] if an offer was already
    ///   accepted.
    pub fn create_offer(&self, request_id: RequestId, message: &str) -> Result<Offer, MarketError> {
        let (offer, event) = {
            let mut store = self.store()?;
            let mut rng = lock(&self.inner.rng, "rng")?;

            // Reject before drawing so a failed offer leaves the RNG untouched.
            let draft = OfferDraft {
                request_id,
                message: message.to_owned(),
            };
            let request = store.offer_target(&draft)?;
            let title = request.title.clone();
            let helpers: Vec<_> = store
                .users()
                .iter()
                .filter(|u| u.id != request.requester.id)
                .collect();
            let helper = choose(&mut *rng, &helpers)
                .map(|h| (*h).clone())
                .ok_or_else(|| MarketError::Internal {
                    context: String::from("no helper available in the seed pool"),
                })?;
            let availability = choose(&mut *rng, AVAILABILITY_LABELS)
                .copied()
                .unwrap_or("available now");

            let now = Utc::now();
            let offer = store.create_offer(draft, helper, availability.to_owned(), now)?;
            let event = generator::offer_sent_event(&offer, &title, now);
            store.record(event.clone());
            (offer, event)
        };

        let _ = self.inner.listeners.notify(&event);
        Ok(offer)
    }

    /// Accept a pending offer, declining its siblings.
    ///
    /// Records an `offer_accepted` event and notifies listeners.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::OfferNotFound`] or
    /// [`MarketError::InvalidTransition`] from the store.
    pub fn accept_offer(&self, offer_id: OfferId) -> Result<Offer, MarketError> {
        let (offer, event) = {
            let mut store = self.store()?;
            let accepted = store.accept_offer(offer_id)?;
            let request = store.get_request(accepted.offer.request_id)?;
            let event = generator::offer_accepted_event(
                &accepted.offer,
                &request.requester.name,
                &request.title,
                Utc::now(),
            );
            store.record(event.clone());
            (accepted.offer, event)
        };

        let _ = self.inner.listeners.notify(&event);
        Ok(offer)
    }

    /// Post a request on behalf of a requester drawn from the seed pool.
    ///
    /// Records a `request_posted` event and notifies listeners.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for a malformed draft.
    pub fn post_request(&self, draft: RequestDraft) -> Result<Request, MarketError> {
        let (request, event) = {
            let mut store = self.store()?;
            let mut rng = lock(&self.inner.rng, "rng")?;
            let requester = choose(&mut *rng, store.users())
                .cloned()
                .ok_or_else(|| MarketError::Internal {
                    context: String::from("no requester available in the seed pool"),
                })?;
            let now = Utc::now();
            let request = store.post_request(draft, requester, now)?;
            let event = generator::request_posted_event(&request, now);
            store.record(event.clone());
            (request, event)
        };

        let _ = self.inner.listeners.notify(&event);
        Ok(request)
    }

    /// Start the session for a request whose offer was accepted.
    ///
    /// Records a `session_started` event and notifies listeners.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::RequestNotFound`] or
    /// [`MarketError::InvalidTransition`] from the store.
    pub fn start_session(&self, request_id: RequestId) -> Result<Session, MarketError> {
        self.apply_session(|store, now| store.start_session(request_id, now))
    }

    /// Complete an active session.
    ///
    /// Records a `session_completed` event and notifies listeners.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SessionNotFound`] or
    /// [`MarketError::InvalidTransition`] from the store.
    pub fn complete_session(&self, session_id: SessionId) -> Result<Session, MarketError> {
        self.apply_session(|store, now| store.complete_session(session_id, now))
    }

    /// Look up one session.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SessionNotFound`] for an unknown ID.
    pub fn get_session(&self, id: SessionId) -> Result<Session, MarketError> {
        self.store()?.get_session(id)
    }

    fn apply_session<F>(&self, mutate: F) -> Result<Session, MarketError>
    where
        F: FnOnce(&mut EntityStore, DateTime<Utc>) -> Result<Session, MarketError>,
    {
        let (session, event) = {
            let mut store = self.store()?;
            let now = Utc::now();
            let session = mutate(&mut store, now)?;
            let event = generator::session_lifecycle_event(&store, session.clone(), now)?;
            store.record(event.clone());
            (session, event)
        };

        let _ = self.inner.listeners.notify(&event);
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register a callback invoked once per recorded event, in
    /// registration order. Drop the returned [`Subscription`] to
    /// unsubscribe.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(callback)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn store(&self) -> Result<MutexGuard<'_, EntityStore>, MarketError> {
        lock(&self.inner.store, "store")
    }
}

impl Inner {
    /// One tick: mutate under the locks, then notify with the locks
    /// released.
    fn tick(&self) -> Result<Event, MarketError> {
        let event = {
            let mut store = lock(&self.store, "store")?;
            let mut rng = lock(&self.rng, "rng")?;
            self.generator.tick(&mut store, &mut *rng, Utc::now())?
        };
        let _ = self.ticks_run.fetch_add(1, Ordering::AcqRel);
        let delivered = self.listeners.notify(&event);
        debug!(
            event_type = ?event.event_type,
            summary = %event.summary,
            delivered,
            "Tick complete"
        );
        Ok(event)
    }

    /// Draw the delay before the next tick.
    fn next_delay(&self) -> Duration {
        let TickConfig {
            min_interval_ms,
            max_interval_ms,
        } = self.ticks;
        let millis = match self.rng.lock() {
            Ok(mut rng) => rng.random_range(min_interval_ms..=max_interval_ms),
            Err(_) => max_interval_ms,
        };
        Duration::from_millis(millis)
    }
}

/// Timer task body. Holds only a weak reference so dropping every
/// [`Simulation`] handle ends the loop.
async fn run_timer(inner: Weak<Inner>) {
    loop {
        let Some(delay) = inner.upgrade().map(|sim| sim.next_delay()) else {
            break;
        };
        tokio::time::sleep(delay).await;

        let Some(sim) = inner.upgrade() else {
            break;
        };
        if let Err(err) = sim.tick() {
            warn!(error = %err, "Simulation tick failed; next tick still scheduled");
        }
    }
    debug!("Simulation timer exited");
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, MarketError> {
    mutex.lock().map_err(|err| MarketError::Internal {
        context: format!("{what} lock poisoned: {err}"),
    })
}

fn choose<'a, T>(rng: &mut impl Rng, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.random_range(0..items.len()))
}
