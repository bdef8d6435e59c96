//! In-memory engine for the MicroCollab demo marketplace.
//!
//! The engine seeds a fixed corpus of help requests, then synthesizes
//! marketplace activity on a randomized timer: requests posted, offers
//! sent and accepted, sessions started and completed. Every event mutates
//! the entity store, lands in a bounded activity log, and is broadcast to
//! subscribed views, which then pull a fresh snapshot.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `microcollab-config.yaml`
//!   into strongly-typed structs.
//! - [`error`] -- [`MarketError`], the engine's domain error.
//! - [`event_log`] -- Fixed-capacity activity feed.
//! - [`generator`] -- Weighted event synthesis against the store.
//! - [`listeners`] -- Subscription registry with drop-to-unsubscribe.
//! - [`marketplace`] -- [`DemoMarketplace`], the view-facing facade.
//! - [`seed`] -- Seed users, request templates, and the initial listing.
//! - [`simulation`] -- [`Simulation`], the shared context and tick timer.
//! - [`store`] -- [`EntityStore`], filters, sorting, and the request
//!   lifecycle.
//!
//! [`MarketError`]: error::MarketError
//! [`DemoMarketplace`]: marketplace::DemoMarketplace
//! [`Simulation`]: simulation::Simulation
//! [`EntityStore`]: store::EntityStore

pub mod config;
pub mod error;
pub mod event_log;
pub mod generator;
pub mod listeners;
pub mod marketplace;
pub mod seed;
pub mod simulation;
pub mod store;

pub use error::MarketError;
pub use marketplace::DemoMarketplace;
pub use simulation::{GeneratorState, Simulation};
