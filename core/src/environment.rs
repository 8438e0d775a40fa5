//! Injected dependencies for the scheduling components.
//!
//! Every external collaborator (clock, the four entity stores, the trainer
//! roster, the notification sink) is abstracted behind a trait and carried
//! in one [`SchedulingEnvironment`] struct of `Arc` handles. Components hold
//! a clone of the environment; caller identity is always an explicit
//! argument, never ambient state.

use crate::notify::NotificationDispatcher;
use crate::store::{DocumentStore, TrainerRoster};
use crate::types::{AvailabilitySlot, Pack, PurchasedPackage, ScheduledMeeting};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Environment dependencies shared by every scheduling component.
#[derive(Clone)]
pub struct SchedulingEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Availability slot store
    pub slots: Arc<dyn DocumentStore<AvailabilitySlot>>,
    /// Purchased package store
    pub packages: Arc<dyn DocumentStore<PurchasedPackage>>,
    /// Scheduled meeting store
    pub meetings: Arc<dyn DocumentStore<ScheduledMeeting>>,
    /// Pack store
    pub packs: Arc<dyn DocumentStore<Pack>>,
    /// Trainer→clients side table (best-effort)
    pub roster: Arc<dyn TrainerRoster>,
    /// Notification sink
    pub dispatcher: Arc<dyn NotificationDispatcher>,
}

impl SchedulingEnvironment {
    /// Creates a new `SchedulingEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        slots: Arc<dyn DocumentStore<AvailabilitySlot>>,
        packages: Arc<dyn DocumentStore<PurchasedPackage>>,
        meetings: Arc<dyn DocumentStore<ScheduledMeeting>>,
        packs: Arc<dyn DocumentStore<Pack>>,
        roster: Arc<dyn TrainerRoster>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            clock,
            slots,
            packages,
            meetings,
            packs,
            roster,
            dispatcher,
        }
    }
}
