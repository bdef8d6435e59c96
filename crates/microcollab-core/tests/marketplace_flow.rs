//! Integration tests for the demo marketplace engine.
//!
//! These drive the public API the dashboard uses: a [`Simulation`] context
//! shared between a [`DemoMarketplace`] facade and an activity-feed
//! listener. Randomness comes from a seeded `SmallRng` and timer tests run
//! on Tokio's paused clock, so every run is reproducible.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use microcollab_core::config::{SimulationConfig, TickConfig};
use microcollab_core::{DemoMarketplace, GeneratorState, MarketError, Simulation};
use microcollab_types::{
    EventPayload, EventType, FilterUpdate, OfferStatus, RequestFilters, RequestStatus, SortOption,
    Urgency,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::Value;

fn simulation(seed: u64, interval_ms: u64) -> Simulation {
    let config = SimulationConfig {
        ticks: TickConfig {
            min_interval_ms: interval_ms,
            max_interval_ms: interval_ms,
        },
        ..SimulationConfig::default()
    };
    Simulation::create(&config, SmallRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn seeding_then_posting_one_request() {
    let sim = simulation(42, 1_000);
    assert_eq!(sim.load_initial_data().unwrap(), 12);

    let stats = sim.get_stats().unwrap();
    assert_eq!(stats.total_requests, 12);
    assert_eq!(stats.active_requests, 12);

    let event = sim.synthesize(EventType::RequestPosted).unwrap().unwrap();
    let EventPayload::Request(posted) = event.payload else {
        unreachable!("request_posted always carries a request");
    };

    assert_eq!(sim.get_stats().unwrap().total_requests, 13);
    let newest = sim.get_all_requests(&RequestFilters::default()).unwrap();
    assert_eq!(newest.first().map(|r| r.id), Some(posted.id));
    assert_eq!(newest.first().map(|r| r.status), Some(RequestStatus::Open));
}

#[test]
fn stats_invariants_hold_over_a_long_run() {
    let sim = simulation(7, 1_000);
    let _ = sim.load_initial_data().unwrap();

    for _ in 0..300 {
        let _ = sim.tick_now().unwrap();
        let stats = sim.get_stats().unwrap();
        assert!(stats.active_requests <= stats.total_requests);
        assert_eq!(
            stats.total_sessions,
            stats.active_sessions + stats.completed_sessions
        );

        let requests = sim.get_all_requests(&RequestFilters::default()).unwrap();
        let offers: usize = requests.iter().map(|r| r.offers.len()).sum();
        assert_eq!(offers, stats.total_offers);
        for request in &requests {
            let accepted = request
                .offers
                .iter()
                .filter(|o| o.status == OfferStatus::Accepted)
                .count();
            assert!(accepted <= 1);
            if request.status != RequestStatus::Open {
                assert_eq!(accepted, 1);
            }
        }
    }
    assert_eq!(sim.recent_events(usize::MAX).unwrap().len(), 50);
}

#[test]
fn facade_filters_and_offers() {
    let sim = simulation(3, 1_000);
    let mut market = DemoMarketplace::new(sim.clone());
    let _ = market.load_initial_data().unwrap();

    let rust = market
        .update_filters(FilterUpdate {
            tags: Some(BTreeSet::from([String::from("rust")])),
            sort: Some(SortOption::BestMatch),
            ..FilterUpdate::default()
        })
        .unwrap()
        .to_vec();
    assert!(!rust.is_empty());
    assert!(rust.iter().all(|r| r.tags.contains("rust")));

    let target = rust.first().map(|r| r.id).unwrap();
    let offer = market.create_offer(target, "Pairing on borrowck is my jam").unwrap();
    let refreshed = market
        .requests()
        .iter()
        .find(|r| r.id == target)
        .unwrap();
    assert!(refreshed.offers.iter().any(|o| o.id == offer.id));

    let feed = market.recent_events(1).unwrap();
    assert_eq!(feed.first().map(|e| e.event_type), Some(EventType::OfferSent));

    let err = market.create_offer(target, "   ").unwrap_err();
    assert!(matches!(err, MarketError::Validation { .. }));
}

#[test]
fn urgent_sort_puts_critical_first() {
    let sim = simulation(11, 1_000);
    let _ = sim.load_initial_data().unwrap();
    let filters = RequestFilters {
        sort: SortOption::Urgent,
        ..RequestFilters::default()
    };
    let urgencies: Vec<Urgency> = sim
        .get_all_requests(&filters)
        .unwrap()
        .iter()
        .map(|r| r.urgency)
        .collect();
    let mut sorted = urgencies.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(urgencies, sorted);
}

#[test]
fn events_serialize_with_snake_case_type_tags() {
    let sim = simulation(5, 1_000);
    let _ = sim.load_initial_data().unwrap();
    let event = sim.synthesize(EventType::OfferSent).unwrap().unwrap();
    let json: Value = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event_type"], "offer_sent");
    assert_eq!(json["payload"]["kind"], "offer");
}

#[tokio::test(start_paused = true)]
async fn running_simulation_feeds_the_facade() {
    let sim = simulation(9, 2_000);
    let mut market = DemoMarketplace::new(sim.clone());
    let _ = market.load_initial_data().unwrap();

    let feed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&feed);
    let _feed_sub = sim.subscribe(move |event| sink.lock().unwrap().push(event.summary.clone()));

    assert!(market.start_simulation().unwrap());
    assert!(!market.start_simulation().unwrap());
    tokio::time::sleep(Duration::from_millis(9_000)).await;
    assert!(market.stop_simulation());
    assert_eq!(sim.state(), GeneratorState::Idle);

    assert_eq!(feed.lock().unwrap().len(), 4);
    assert!(market.is_stale());
    assert!(market.sync().unwrap());
    assert!(market.stats().total_requests >= 12);
}

#[tokio::test(start_paused = true)]
async fn faulty_listener_does_not_halt_ticks() {
    let sim = simulation(13, 1_000);
    let _ = sim.load_initial_data().unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let _faulty = sim.subscribe(|_| {
        std::panic::panic_any("view crashed");
    });
    let counter = Arc::clone(&hits);
    let _healthy = sim.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(sim.start().unwrap());
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    sim.dispose();

    assert_eq!(hits.load(Ordering::SeqCst), 5);
    assert_eq!(sim.ticks_run(), 5);
}
