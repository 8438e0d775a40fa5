//! Session lifecycle: the state machine for an individual appointment.
//!
//! `Proposed → Scheduled → Completed | Cancelled`, with `Completed` and
//! `Cancelled` terminal. Confirmation is the one place where the slot
//! reservation and the package session are consumed together: on partial
//! failure the applied half is compensated before the error returns, so the
//! meeting is always left `Proposed` and safe to retry. Cancellation runs
//! the compensations in the other direction, and every compensating call is
//! idempotent so at-least-once retries converge.

use crate::availability::AvailabilityLedger;
use crate::environment::SchedulingEnvironment;
use crate::error::SchedulingError;
use crate::notify::{dispatch_all, Notification, NotificationKind};
use crate::packages::PackageLedger;
use crate::packs::resolve_client_users;
use crate::store::{StoreError, Versioned};
use crate::types::{
    ClientId, MeetingId, MeetingStatus, PackageId, ScheduledMeeting, SlotId, TrainerId,
};
use smallvec::SmallVec;

const MAX_CAS_ATTEMPTS: usize = 8;

/// State machine driver for scheduled meetings.
#[derive(Clone)]
pub struct SessionLifecycle {
    env: SchedulingEnvironment,
    availability: AvailabilityLedger,
    packages: PackageLedger,
}

impl SessionLifecycle {
    /// Creates a new `SessionLifecycle` over the shared environment
    #[must_use]
    pub fn new(env: SchedulingEnvironment) -> Self {
        let availability = AvailabilityLedger::new(env.clone());
        let packages = PackageLedger::new(env.clone());
        Self {
            env,
            availability,
            packages,
        }
    }

    /// Propose a session: write a `Proposed` meeting and fan out invites.
    ///
    /// Validates that the slot is currently free, the package has remaining
    /// sessions, and a pack client is live. These checks are advisory, since
    /// the same invariants are re-checked under CAS at confirmation, but
    /// they keep obviously-doomed invites from going out.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::SlotNotFound`] / [`SchedulingError::PackageNotFound`]
    ///   / [`SchedulingError::PackNotFound`] for stale ids
    /// - [`SchedulingError::SlotAlreadyBooked`] if the slot is taken
    /// - [`SchedulingError::PackageExhausted`] if no sessions remain
    /// - [`SchedulingError::PackNotLive`] for a pack still collecting accepts
    /// - [`SchedulingError::Store`] on backend failure
    pub async fn propose(
        &self,
        trainer_id: TrainerId,
        client: ClientId,
        slot_id: SlotId,
        package_id: PackageId,
        note: String,
    ) -> Result<MeetingId, SchedulingError> {
        let Some(Versioned { document: slot, .. }) = self.env.slots.get(slot_id).await? else {
            return Err(SchedulingError::SlotNotFound(slot_id));
        };
        if slot.booked {
            return Err(SchedulingError::SlotAlreadyBooked { slot: slot_id });
        }

        let Some(Versioned {
            document: package, ..
        }) = self.env.packages.get(package_id).await?
        else {
            return Err(SchedulingError::PackageNotFound(package_id));
        };
        if !package.has_remaining() {
            return Err(SchedulingError::PackageExhausted {
                package: package_id,
            });
        }

        // Pack consensus gates booking for pack clients.
        if let ClientId::Pack(pack_id) = client {
            let pack = crate::packs::load_pack(&self.env, pack_id).await?;
            if !pack.is_live {
                return Err(SchedulingError::PackNotLive { pack: pack_id });
            }
        }

        let meeting_id = MeetingId::new();
        let meeting = ScheduledMeeting {
            id: meeting_id,
            trainer_id,
            client,
            package_id,
            slot_id,
            starts_at: slot.starts_at,
            ends_at: slot.ends_at,
            status: MeetingStatus::Proposed,
            note: note.clone(),
            price: package.session_price,
            proposed_at: self.env.clock.now(),
        };
        self.env.meetings.insert(meeting).await?;
        tracing::info!(%meeting_id, %client, %slot_id, "session proposed");

        let recipients = resolve_client_users(&self.env, client).await?;
        let invites = recipients.into_iter().map(|user_id| {
            Notification::to_user(
                user_id,
                NotificationKind::SessionInvite {
                    meeting_id,
                    trainer_id,
                    starts_at: slot.starts_at,
                    ends_at: slot.ends_at,
                    note: note.clone(),
                },
            )
        });
        dispatch_all(self.env.dispatcher.as_ref(), invites).await;

        Ok(meeting_id)
    }

    /// Confirm a proposed meeting: reserve the slot and consume a package
    /// session as one atomic unit.
    ///
    /// The slot reservation is the decider between concurrent confirmations:
    /// exactly one caller wins it. If the session consumption then fails,
    /// the reservation is released before the error returns, leaving the
    /// meeting `Proposed` and the ledgers untouched.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::MeetingNotFound`] for a stale id
    /// - [`SchedulingError::InvalidTransition`] if the meeting is not `Proposed`
    /// - [`SchedulingError::SlotAlreadyBooked`] when a concurrent booking won
    /// - [`SchedulingError::BookingConflict`] after a rolled-back partial
    ///   failure; safe to retry
    /// - [`SchedulingError::Store`] on backend failure
    pub async fn confirm(&self, meeting_id: MeetingId) -> Result<(), SchedulingError> {
        let Some(Versioned {
            document: meeting, ..
        }) = self.env.meetings.get(meeting_id).await?
        else {
            return Err(SchedulingError::MeetingNotFound(meeting_id));
        };
        match meeting.status {
            MeetingStatus::Proposed => {}
            // A concurrent confirmation already won; a race loss, not misuse.
            MeetingStatus::Scheduled => {
                return Err(SchedulingError::BookingConflict {
                    meeting: meeting_id,
                    reason: "meeting already scheduled".to_string(),
                });
            }
            MeetingStatus::Completed | MeetingStatus::Cancelled => {
                return Err(SchedulingError::InvalidTransition {
                    meeting: meeting_id,
                    from: meeting.status,
                    to: MeetingStatus::Scheduled,
                });
            }
        }

        // Step 1: the contended write. One winner per slot.
        self.availability
            .reserve_slot(meeting.slot_id, meeting_id, meeting.package_id)
            .await?;

        // Step 2: consume a session; undo the reservation if it fails.
        if let Err(consume_error) = self
            .packages
            .consume_session(meeting.package_id, meeting_id)
            .await
        {
            if let Err(release_error) = self
                .availability
                .release_slot(meeting.slot_id, meeting_id)
                .await
            {
                tracing::error!(
                    %meeting_id,
                    %release_error,
                    "failed to release slot while unwinding confirm"
                );
                return Err(release_error);
            }
            tracing::warn!(%meeting_id, %consume_error, "confirm rolled back");
            return Err(SchedulingError::BookingConflict {
                meeting: meeting_id,
                reason: consume_error.to_string(),
            });
        }

        // Step 3: commit the status transition.
        match self
            .transition(meeting_id, MeetingStatus::Proposed, MeetingStatus::Scheduled)
            .await
        {
            Ok(meeting) => {
                tracing::info!(%meeting_id, "session scheduled");
                self.notify_scheduled(&meeting).await?;
                Ok(())
            }
            Err(error) => {
                // A cancel raced in between; unwind both ledger effects.
                self.availability
                    .release_slot(meeting.slot_id, meeting_id)
                    .await?;
                self.packages
                    .restore_session(meeting.package_id, meeting_id)
                    .await?;
                tracing::warn!(%meeting_id, %error, "confirm lost to concurrent transition");
                Err(SchedulingError::BookingConflict {
                    meeting: meeting_id,
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Mark a scheduled session as having happened.
    ///
    /// No ledger changes: the slot stays consumed and the package session
    /// stays spent, because the session did take place.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::MeetingNotFound`] for a stale id
    /// - [`SchedulingError::InvalidTransition`] unless currently `Scheduled`
    /// - [`SchedulingError::Store`] on backend failure
    pub async fn complete(&self, meeting_id: MeetingId) -> Result<(), SchedulingError> {
        let meeting = self
            .transition(meeting_id, MeetingStatus::Scheduled, MeetingStatus::Completed)
            .await?;
        tracing::info!(%meeting_id, "session completed");

        let recipients = resolve_client_users(&self.env, meeting.client).await?;
        let notifications = recipients.into_iter().map(|user_id| {
            Notification::to_user(user_id, NotificationKind::SessionCompleted { meeting_id })
        });
        dispatch_all(self.env.dispatcher.as_ref(), notifications).await;
        Ok(())
    }

    /// Cancel a meeting and reverse its ledger effects.
    ///
    /// Sets `Cancelled` first, then releases the slot and restores the
    /// package session. Both compensations are idempotent and guarded by the
    /// meeting binding, so a retried cancellation converges to the same end
    /// state even when an earlier attempt failed halfway.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::MeetingNotFound`] for a stale id
    /// - [`SchedulingError::InvalidTransition`] for a `Completed` meeting
    /// - [`SchedulingError::Store`] on backend failure
    pub async fn cancel(&self, meeting_id: MeetingId) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(Versioned {
                version,
                document: mut meeting,
            }) = self.env.meetings.get(meeting_id).await?
            else {
                return Err(SchedulingError::MeetingNotFound(meeting_id));
            };

            match meeting.status {
                // Retry path: status already flipped, re-run compensation.
                MeetingStatus::Cancelled => {
                    self.compensate(&meeting).await?;
                    return Ok(());
                }
                MeetingStatus::Completed => {
                    return Err(SchedulingError::InvalidTransition {
                        meeting: meeting_id,
                        from: meeting.status,
                        to: MeetingStatus::Cancelled,
                    });
                }
                MeetingStatus::Proposed | MeetingStatus::Scheduled => {}
            }

            let was_scheduled = meeting.status == MeetingStatus::Scheduled;
            meeting.status = MeetingStatus::Cancelled;

            match self.env.meetings.update(version, meeting.clone()).await {
                Ok(_) => {
                    tracing::info!(%meeting_id, "session cancelled");
                    if was_scheduled {
                        self.compensate(&meeting).await?;
                    }
                    self.notify_cancelled(&meeting).await?;
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("meeting {meeting_id}: retry budget exhausted")).into())
    }

    /// CAS a meeting from one status to another, returning the new document.
    async fn transition(
        &self,
        meeting_id: MeetingId,
        from: MeetingStatus,
        to: MeetingStatus,
    ) -> Result<ScheduledMeeting, SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(Versioned {
                version,
                document: mut meeting,
            }) = self.env.meetings.get(meeting_id).await?
            else {
                return Err(SchedulingError::MeetingNotFound(meeting_id));
            };

            if meeting.status != from {
                return Err(SchedulingError::InvalidTransition {
                    meeting: meeting_id,
                    from: meeting.status,
                    to,
                });
            }

            meeting.status = to;
            match self.env.meetings.update(version, meeting.clone()).await {
                Ok(_) => return Ok(meeting),
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("meeting {meeting_id}: retry budget exhausted")).into())
    }

    /// Reverse the ledger effects of a cancelled meeting.
    ///
    /// The release is holder-guarded inside the slot CAS, so a late retry
    /// cannot evict a booking the slot has since moved on to.
    async fn compensate(&self, meeting: &ScheduledMeeting) -> Result<(), SchedulingError> {
        self.availability
            .release_slot(meeting.slot_id, meeting.id)
            .await?;
        self.packages
            .restore_session(meeting.package_id, meeting.id)
            .await?;
        Ok(())
    }

    async fn notify_scheduled(&self, meeting: &ScheduledMeeting) -> Result<(), SchedulingError> {
        let kind = NotificationKind::SessionScheduled {
            meeting_id: meeting.id,
            trainer_id: meeting.trainer_id,
            slot_id: meeting.slot_id,
            starts_at: meeting.starts_at,
        };

        let recipients = resolve_client_users(&self.env, meeting.client).await?;
        let mut notifications: SmallVec<[Notification; 4]> = recipients
            .into_iter()
            .map(|user_id| Notification::to_user(user_id, kind.clone()))
            .collect();
        notifications.push(Notification::to_trainer(meeting.trainer_id, kind));

        dispatch_all(self.env.dispatcher.as_ref(), notifications).await;
        Ok(())
    }

    async fn notify_cancelled(&self, meeting: &ScheduledMeeting) -> Result<(), SchedulingError> {
        let kind = NotificationKind::SessionCancelled {
            meeting_id: meeting.id,
            slot_id: meeting.slot_id,
        };

        let recipients = resolve_client_users(&self.env, meeting.client).await?;
        let mut notifications: SmallVec<[Notification; 4]> = recipients
            .into_iter()
            .map(|user_id| Notification::to_user(user_id, kind.clone()))
            .collect();
        notifications.push(Notification::to_trainer(meeting.trainer_id, kind));

        dispatch_all(self.env.dispatcher.as_ref(), notifications).await;
        Ok(())
    }
}
