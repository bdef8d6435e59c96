//! Shared type definitions for the MicroCollab demo marketplace.
//!
//! This crate is the single source of truth for every type that crosses
//! the engine boundary. Types flow downstream to `TypeScript` via `ts-rs`
//! for the dashboard views.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for requests, offers, sessions, users, and events
//! - [`enums`] -- Urgency, mode, lifecycle states, event kinds, and sort options
//! - [`structs`] -- Entities, the event record, stats, filters, and input drafts

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EventType, Mode, OfferStatus, RequestStatus, SessionStatus, SortOption, Urgency};
pub use ids::{EventId, OfferId, RequestId, SessionId, UserId};
pub use structs::{
    Budget, Event, EventPayload, FilterUpdate, MAX_DURATION_HOURS, MIN_DURATION_HOURS, Offer,
    OfferDraft, Request, RequestDraft, RequestFilters, Session, Stats, UserSummary,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // Exporting writes the `.ts` files into `bindings/` relative to
        // the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::RequestId::export_all();
        let _ = crate::ids::OfferId::export_all();
        let _ = crate::ids::SessionId::export_all();
        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::EventId::export_all();

        // Enums
        let _ = crate::enums::Urgency::export_all();
        let _ = crate::enums::Mode::export_all();
        let _ = crate::enums::RequestStatus::export_all();
        let _ = crate::enums::OfferStatus::export_all();
        let _ = crate::enums::SessionStatus::export_all();
        let _ = crate::enums::EventType::export_all();
        let _ = crate::enums::SortOption::export_all();

        // Structs
        let _ = crate::structs::UserSummary::export_all();
        let _ = crate::structs::Budget::export_all();
        let _ = crate::structs::Offer::export_all();
        let _ = crate::structs::Request::export_all();
        let _ = crate::structs::Session::export_all();
        let _ = crate::structs::EventPayload::export_all();
        let _ = crate::structs::Event::export_all();
        let _ = crate::structs::Stats::export_all();
        let _ = crate::structs::RequestFilters::export_all();
        let _ = crate::structs::FilterUpdate::export_all();
        let _ = crate::structs::OfferDraft::export_all();
        let _ = crate::structs::RequestDraft::export_all();
    }
}
