//! Application layer containing the core business logic orchestration.
//!
//! `BookingEngine` is the entry point for actor-triggered booking
//! transitions, `PaymentReconciliation` for everything that touches the
//! payment gateway, and `IncidentResolver` for dispute handling. All three
//! share the same stores and apply writes through per-entity version
//! check-and-set, so concurrent request handlers cannot produce divergent
//! state.

pub mod authorization;
pub mod engine;
pub mod incidents;
pub mod reconciliation;
