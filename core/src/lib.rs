//! # Packfit Core
//!
//! The session & pack scheduling core for a fitness-training platform: the
//! logic that turns a trainer's open time slots, a purchased block of
//! sessions, and a group of athletes (a "pack") into confirmed, cancellable
//! appointments.
//!
//! The core guarantees, under concurrent access:
//!
//! - a slot is booked by at most one meeting at a time;
//! - a package's remaining-session count never goes negative or
//!   double-counts;
//! - a pack goes live exactly once, when its last pending invite is
//!   resolved by acceptance;
//! - cancellation atomically reverses the slot booking and the session
//!   consumption.
//!
//! Everything else, such as rendering, auth, payment capture and the
//! notification transport, is an external collaborator reached through the traits in
//! [`store`] and [`notify`] and injected via
//! [`environment::SchedulingEnvironment`].
//!
//! ## Components
//!
//! - [`availability::AvailabilityLedger`]: trainer open/booked slots
//! - [`packages::PackageLedger`]: purchased session inventories
//! - [`sessions::SessionLifecycle`]: the appointment state machine
//! - [`packs::PackConsensus`]: the multi-party invitation protocol
//! - [`purchase::PurchaseOrchestrator`]: purchase bookkeeping and fan-out
//!
//! ## Concurrency model
//!
//! Every cross-entity mutation executes against the store's per-document
//! compare-and-swap ([`store::DocumentStore::update`]) in a bounded
//! read-revalidate-write loop. Two callers racing on the same slot, package,
//! or pack produce exactly one winner and one well-typed error, never a
//! silent double-booking or double-count. Reads are display-grade and never
//! gate a write decision.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod availability;
pub mod environment;
pub mod error;
pub mod notify;
pub mod packages;
pub mod packs;
pub mod purchase;
pub mod sessions;
pub mod store;
pub mod types;

pub use error::SchedulingError;
