//! Availability ledger: trainer open/booked time slots.
//!
//! Owns slot publication, listing, reservation, and release. Reservation is
//! the single most contended write in the core: it is a strict
//! compare-and-swap on the slot document, so two meetings racing for one
//! slot always produce exactly one winner and one
//! [`SchedulingError::SlotAlreadyBooked`].
//!
//! Slots are never deleted. Cancellation flows back through
//! [`release_slot`](AvailabilityLedger::release_slot), which clears the
//! booking flag and bindings only while the releasing meeting still holds
//! the slot, so compensation is safe to retry at any later time.

use crate::environment::SchedulingEnvironment;
use crate::error::SchedulingError;
use crate::store::{StoreError, Versioned};
use crate::types::{AvailabilitySlot, DateRange, MeetingId, PackageId, SlotId, TrainerId};
use chrono::{DateTime, Utc};

/// Bounded optimistic-retry budget for contended writes.
const MAX_CAS_ATTEMPTS: usize = 8;

/// Ledger of trainer availability slots.
#[derive(Clone)]
pub struct AvailabilityLedger {
    env: SchedulingEnvironment,
}

impl AvailabilityLedger {
    /// Creates a new `AvailabilityLedger`
    #[must_use]
    pub const fn new(env: SchedulingEnvironment) -> Self {
        Self { env }
    }

    /// Publish a new open slot for a trainer.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Store`] if the slot cannot be persisted.
    pub async fn publish_slot(
        &self,
        trainer_id: TrainerId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<SlotId, SchedulingError> {
        let slot_id = SlotId::new();
        let slot = AvailabilitySlot::new(slot_id, trainer_id, starts_at, ends_at);
        self.env.slots.insert(slot).await?;
        tracing::debug!(%trainer_id, %slot_id, "slot published");
        Ok(slot_id)
    }

    /// List a trainer's slots starting inside the range, soonest first.
    ///
    /// Read-only display path: no freshness guarantee, and never used to
    /// gate a write decision (reservation revalidates under its own CAS).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Store`] if the listing fails.
    pub async fn list_open_slots(
        &self,
        trainer_id: TrainerId,
        range: DateRange,
        include_booked: bool,
    ) -> Result<Vec<AvailabilitySlot>, SchedulingError> {
        let mut slots: Vec<AvailabilitySlot> = self
            .env
            .slots
            .scan()
            .await?
            .into_iter()
            .map(|versioned| versioned.document)
            .filter(|slot| {
                slot.trainer_id == trainer_id
                    && range.contains(slot.starts_at)
                    && (include_booked || !slot.booked)
            })
            .collect();

        slots.sort_by_key(|slot| slot.starts_at);
        Ok(slots)
    }

    /// Reserve a slot for a meeting, binding the meeting and funding package.
    ///
    /// Strict: succeeds only if the slot is currently unbooked. A booked slot
    /// fails even when the holder is the requesting meeting itself, so N
    /// concurrent confirmations of one meeting still produce one winner.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::SlotNotFound`] for a stale or foreign id
    /// - [`SchedulingError::SlotAlreadyBooked`] when a concurrent
    ///   reservation won the race
    /// - [`SchedulingError::Store`] on backend failure or exhausted retries
    pub async fn reserve_slot(
        &self,
        slot_id: SlotId,
        meeting_id: MeetingId,
        package_id: PackageId,
    ) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(Versioned {
                version,
                document: mut slot,
            }) = self.env.slots.get(slot_id).await?
            else {
                return Err(SchedulingError::SlotNotFound(slot_id));
            };

            if slot.booked {
                return Err(SchedulingError::SlotAlreadyBooked { slot: slot_id });
            }

            slot.booked = true;
            slot.meeting_id = Some(meeting_id);
            slot.package_id = Some(package_id);

            match self.env.slots.update(version, slot).await {
                Ok(_) => {
                    tracing::info!(%slot_id, %meeting_id, "slot reserved");
                    return Ok(());
                }
                // Lost the write race; reload and re-decide.
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("slot {slot_id}: retry budget exhausted")).into())
    }

    /// Release a slot held by the given meeting, clearing the booking flag
    /// and bindings.
    ///
    /// Idempotent: releasing an unbooked slot, or one the meeting no longer
    /// holds, is a no-op. The holder check runs inside the CAS loop, so a
    /// stale compensation retry can never evict a booking the slot has since
    /// moved on to.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::SlotNotFound`] for a stale or foreign id
    /// - [`SchedulingError::Store`] on backend failure or exhausted retries
    pub async fn release_slot(
        &self,
        slot_id: SlotId,
        meeting_id: MeetingId,
    ) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(Versioned {
                version,
                document: mut slot,
            }) = self.env.slots.get(slot_id).await?
            else {
                return Err(SchedulingError::SlotNotFound(slot_id));
            };

            if !slot.booked || slot.meeting_id != Some(meeting_id) {
                return Ok(());
            }

            slot.booked = false;
            slot.meeting_id = None;
            slot.package_id = None;

            match self.env.slots.update(version, slot).await {
                Ok(_) => {
                    tracing::info!(%slot_id, "slot released");
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("slot {slot_id}: retry budget exhausted")).into())
    }
}
