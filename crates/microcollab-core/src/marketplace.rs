//! View-facing facade over a [`Simulation`].
//!
//! [`DemoMarketplace`] owns the dashboard's current filter, the last
//! pulled request listing, and stats. It subscribes to the simulation and
//! marks itself stale on every event. The view calls
//! [`DemoMarketplace::sync`] on its own schedule to re-pull.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use microcollab_types::{Event, FilterUpdate, Offer, Request, RequestFilters, RequestId, Stats};
use tracing::{debug, warn};
use validator::Validate;

use crate::error::MarketError;
use crate::listeners::Subscription;
use crate::simulation::Simulation;

/// Dashboard state bound to one simulation.
#[derive(Debug)]
pub struct DemoMarketplace {
    simulation: Simulation,
    filters: RequestFilters,
    requests: Vec<Request>,
    stats: Stats,
    stale: Arc<AtomicBool>,
    _subscription: Subscription,
}

impl DemoMarketplace {
    /// Bind a facade to `simulation` with the default filter.
    pub fn new(simulation: Simulation) -> Self {
        let stale = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&stale);
        let subscription = simulation.subscribe(move |_event| {
            flag.store(true, Ordering::Release);
        });
        Self {
            simulation,
            filters: RequestFilters::default(),
            requests: Vec::new(),
            stats: Stats::default(),
            stale,
            _subscription: subscription,
        }
    }

    /// Seed the store and pull the first snapshot.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn load_initial_data(&mut self) -> Result<usize, MarketError> {
        let seeded = self.simulation.load_initial_data()?;
        let _ = self.refresh_requests()?;
        Ok(seeded)
    }

    /// Start generating events. Returns `false` if already running.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] outside a Tokio runtime.
    pub fn start_simulation(&self) -> Result<bool, MarketError> {
        self.simulation.start()
    }

    /// Stop generating events. Returns `false` if already idle.
    pub fn stop_simulation(&self) -> bool {
        self.simulation.stop()
    }

    /// Re-pull the filtered listing and stats.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the current filter is
    /// malformed, which [`DemoMarketplace::update_filters`] prevents.
    pub fn refresh_requests(&mut self) -> Result<&[Request], MarketError> {
        // Clear first so an event landing mid-refresh marks us stale again.
        self.stale.store(false, Ordering::Release);
        self.requests = self.simulation.get_all_requests(&self.filters)?;
        self.stats = self.simulation.get_stats()?;
        debug!(
            requests = self.requests.len(),
            total = self.stats.total_requests,
            "Marketplace snapshot refreshed"
        );
        Ok(&self.requests)
    }

    /// Re-pull only if an event arrived since the last refresh. Returns
    /// whether a refresh happened.
    ///
    /// # Errors
    ///
    /// Propagates [`DemoMarketplace::refresh_requests`] errors.
    pub fn sync(&mut self) -> Result<bool, MarketError> {
        if !self.stale.load(Ordering::Acquire) {
            return Ok(false);
        }
        let _ = self.refresh_requests()?;
        Ok(true)
    }

    /// Merge a partial filter change and re-pull. An invalid result leaves
    /// the current filter and listing untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for out-of-range or inverted
    /// duration bounds.
    pub fn update_filters(&mut self, update: FilterUpdate) -> Result<&[Request], MarketError> {
        let mut next = self.filters.clone();
        next.merge(update);
        if let Err(err) = next.validate() {
            warn!(error = %err, "Rejected filter update");
            return Err(err.into());
        }
        self.filters = next;
        self.refresh_requests()
    }

    /// Send an offer and re-pull.
    ///
    /// # Errors
    ///
    /// See [`Simulation::create_offer`].
    pub fn create_offer(
        &mut self,
        request_id: RequestId,
        message: &str,
    ) -> Result<Offer, MarketError> {
        let offer = self.simulation.create_offer(request_id, message)?;
        let _ = self.refresh_requests()?;
        Ok(offer)
    }

    /// Listing from the last refresh.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Stats from the last refresh.
    pub const fn stats(&self) -> Stats {
        self.stats
    }

    /// Current filter.
    pub const fn filters(&self) -> &RequestFilters {
        &self.filters
    }

    /// Whether an event arrived since the last refresh.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Up to `limit` recent events, newest first, read live.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the store lock is poisoned.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<Event>, MarketError> {
        self.simulation.recent_events(limit)
    }

    /// The underlying simulation.
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }
}
