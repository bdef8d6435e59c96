//! Listener that mirrors the activity feed into the log.
//!
//! Each event is logged at `info` with its type and summary, and counted
//! per [`EventType`] for the end-of-run report.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use microcollab_core::Simulation;
use microcollab_core::listeners::Subscription;
use microcollab_types::{Event, EventType};
use tracing::info;

/// Per-type event counts shared with the subscribed callback.
#[derive(Debug, Clone, Default)]
pub struct FeedCounts {
    counts: Arc<Mutex<BTreeMap<EventType, u64>>>,
}

impl FeedCounts {
    /// Record one event.
    fn record(&self, event: &Event) {
        if let Ok(mut counts) = self.counts.lock() {
            let entry = counts.entry(event.event_type).or_insert(0);
            *entry = entry.saturating_add(1);
        }
    }

    /// Count for every event type, including zeros, in declaration order.
    pub fn snapshot(&self) -> Vec<(EventType, u64)> {
        let counts = self
            .counts
            .lock()
            .map(|counts| counts.clone())
            .unwrap_or_default();
        EventType::ALL
            .iter()
            .map(|kind| (*kind, counts.get(kind).copied().unwrap_or(0)))
            .collect()
    }

    /// Total events seen.
    pub fn total(&self) -> u64 {
        self.snapshot()
            .iter()
            .fold(0_u64, |acc, (_, n)| acc.saturating_add(*n))
    }
}

/// Subscribe a logging listener to `simulation`. Keep the returned
/// [`Subscription`] alive for as long as events should be logged.
pub fn attach(simulation: &Simulation) -> (Subscription, FeedCounts) {
    let counts = FeedCounts::default();
    let sink = counts.clone();
    let subscription = simulation.subscribe(move |event| {
        sink.record(event);
        info!(
            event_type = ?event.event_type,
            event_id = %event.id,
            "{}",
            event.summary
        );
    });
    (subscription, counts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use microcollab_core::config::SimulationConfig;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn counts_every_delivered_event() {
        let sim =
            Simulation::create(&SimulationConfig::default(), SmallRng::seed_from_u64(42)).unwrap();
        let _ = sim.load_initial_data().unwrap();
        let (subscription, counts) = attach(&sim);

        for _ in 0..20 {
            let _ = sim.tick_now().unwrap();
        }
        assert_eq!(counts.total(), 20);
        assert_eq!(counts.snapshot().len(), EventType::ALL.len());

        drop(subscription);
        let _ = sim.tick_now().unwrap();
        assert_eq!(counts.total(), 20);
    }
}
