//! Error taxonomy for the scheduling core.
//!
//! Every error is returned to the immediate caller; no operation swallows a
//! failure, and no failing multi-step operation leaves partial effects
//! behind. Notification-dispatch failures are deliberately absent from this
//! taxonomy: they are logged and never convert a committed transition into a
//! reported failure.

use crate::store::StoreError;
use crate::types::{MeetingId, MeetingStatus, PackId, PackageId, SlotId, UserId};
use thiserror::Error;

/// Errors surfaced by the scheduling components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// A concurrent reservation won the race for this slot.
    ///
    /// The caller should offer the user a refreshed slot list, not retry
    /// blindly.
    #[error("slot {slot} is already booked")]
    SlotAlreadyBooked {
        /// The contested slot
        slot: SlotId,
    },

    /// The package has no remaining sessions; terminal for this booking
    /// attempt.
    #[error("package {package} has no remaining sessions")]
    PackageExhausted {
        /// The exhausted package
        package: PackageId,
    },

    /// Partial failure inside confirm's atomic pair. All applied effects
    /// were rolled back; the meeting is still `Proposed` and the call is
    /// safe to retry.
    #[error("booking conflict on meeting {meeting}: {reason}")]
    BookingConflict {
        /// The meeting whose confirmation failed
        meeting: MeetingId,
        /// What went wrong mid-pair
        reason: String,
    },

    /// Invited user already accepted into the pack.
    #[error("user {user} is already a member of pack {pack}")]
    AlreadyMember {
        /// The pack
        pack: PackId,
        /// The already-accepted user
        user: UserId,
    },

    /// Responding user has no pending invite on the pack.
    #[error("no pending invite for user {user} on pack {pack}")]
    InviteNotFound {
        /// The pack
        pack: PackId,
        /// The responding user
        user: UserId,
    },

    /// A pack-type client cannot book before every invitee has accepted.
    #[error("pack {pack} is not live yet")]
    PackNotLive {
        /// The not-yet-live pack
        pack: PackId,
    },

    /// The requested lifecycle transition is not legal from the meeting's
    /// current state.
    #[error("meeting {meeting} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The meeting
        meeting: MeetingId,
        /// Status the meeting is in
        from: MeetingStatus,
        /// Status the caller asked for
        to: MeetingStatus,
    },

    /// Caller passed a stale or foreign slot id.
    #[error("slot not found: {0}")]
    SlotNotFound(SlotId),

    /// Caller passed a stale or foreign package id.
    #[error("package not found: {0}")]
    PackageNotFound(PackageId),

    /// Caller passed a stale or foreign meeting id.
    #[error("meeting not found: {0}")]
    MeetingNotFound(MeetingId),

    /// Caller passed a stale or foreign pack id.
    #[error("pack not found: {0}")]
    PackNotFound(PackId),

    /// The backing store failed or stayed contended past the retry budget.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_already_booked_display() {
        let slot = SlotId::new();
        let error = SchedulingError::SlotAlreadyBooked { slot };
        assert!(format!("{error}").contains(&slot.to_string()));
    }

    #[test]
    fn store_error_converts() {
        let error: SchedulingError = StoreError::NotFound("pack-9".to_string()).into();
        assert!(matches!(error, SchedulingError::Store(_)));
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let error = SchedulingError::InvalidTransition {
            meeting: MeetingId::new(),
            from: MeetingStatus::Cancelled,
            to: MeetingStatus::Completed,
        };
        let display = format!("{error}");
        assert!(display.contains("Cancelled"));
        assert!(display.contains("Completed"));
    }
}
