//! Notification dispatch interface.
//!
//! The core writes domain events to an abstracted sink after each committed
//! state transition. Dispatch is fire-and-forget relative to the transition:
//! a failed send is logged at `warn` and never rolls back or re-reports an
//! otherwise-valid state change. Retry with backoff is the transport
//! collaborator's job, not this core's.
//!
//! Payloads are a tagged union with one variant per notification kind, so
//! the dispatcher and its consumers cannot drift out of sync with payload
//! shape.

use crate::types::{
    ClientId, MeetingId, Money, PackId, PackageId, SlotId, TrainerId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while handing a notification to the transport.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// The transport rejected or failed to accept the notification.
    #[error("dispatch failed for receiver {receiver}: {reason}")]
    SendFailed {
        /// Intended receiver
        receiver: Recipient,
        /// Transport-reported reason
        reason: String,
    },
}

/// Who a notification is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// A client-side user
    User(UserId),
    /// A trainer
    Trainer(TrainerId),
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Trainer(id) => write!(f, "trainer:{id}"),
        }
    }
}

/// One domain event addressed to one receiver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Party the notification is addressed to
    pub receiver: Recipient,
    /// Typed payload
    pub kind: NotificationKind,
}

impl Notification {
    /// Addresses a payload to a user
    #[must_use]
    pub const fn to_user(user_id: UserId, kind: NotificationKind) -> Self {
        Self {
            receiver: Recipient::User(user_id),
            kind,
        }
    }

    /// Addresses a payload to a trainer
    #[must_use]
    pub const fn to_trainer(trainer_id: TrainerId, kind: NotificationKind) -> Self {
        Self {
            receiver: Recipient::Trainer(trainer_id),
            kind,
        }
    }
}

/// Tagged payload union, one variant per notification kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NotificationKind {
    /// A trainer proposed a session to this client
    SessionInvite {
        /// The proposed meeting
        meeting_id: MeetingId,
        /// Proposing trainer
        trainer_id: TrainerId,
        /// Session start
        starts_at: DateTime<Utc>,
        /// Session end
        ends_at: DateTime<Utc>,
        /// Trainer's note
        note: String,
    },
    /// A proposed session was confirmed onto the calendar
    SessionScheduled {
        /// The confirmed meeting
        meeting_id: MeetingId,
        /// Trainer running the session
        trainer_id: TrainerId,
        /// Slot the meeting occupies
        slot_id: SlotId,
        /// Session start
        starts_at: DateTime<Utc>,
    },
    /// A scheduled session took place
    SessionCompleted {
        /// The completed meeting
        meeting_id: MeetingId,
    },
    /// A session was called off and its slot and package session restored
    SessionCancelled {
        /// The cancelled meeting
        meeting_id: MeetingId,
        /// Slot released by the cancellation
        slot_id: SlotId,
    },
    /// A user was invited into a pack
    PackInvite {
        /// The pack
        pack_id: PackId,
        /// User who sent the invite
        inviter_id: UserId,
    },
    /// Every invitee accepted; the pack is now bookable
    PackLive {
        /// The pack that went live
        pack_id: PackId,
    },
    /// An invitee accepted while others are still pending
    PackMemberJoined {
        /// The pack
        pack_id: PackId,
        /// User who just accepted
        user_id: UserId,
    },
    /// A session package was purchased
    PackagePurchased {
        /// The new package
        package_id: PackageId,
        /// Buying party
        client: ClientId,
        /// Trainer the sessions are with
        trainer_id: TrainerId,
        /// Package name at purchase time
        name: String,
        /// Number of sessions purchased
        total_sessions: u32,
        /// Per-session price
        session_price: Money,
    },
}

/// Abstracted sink the core writes domain events to.
///
/// Implementations wrap whatever transport the surrounding app uses (push
/// tokens, in-app inbox, email). Must be `Send + Sync`; methods return boxed
/// futures so the sink can live behind `Arc<dyn NotificationDispatcher>`.
pub trait NotificationDispatcher: Send + Sync {
    /// Hand one notification to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SendFailed`] when the transport rejects the
    /// notification. Callers inside this core only log the failure.
    fn send(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + '_>>;
}

/// Send a batch of notifications, logging failures and dropping them.
///
/// Used by every component after a committed transition. Failures never
/// propagate: the state change already happened and must stand.
pub async fn dispatch_all(
    dispatcher: &dyn NotificationDispatcher,
    notifications: impl IntoIterator<Item = Notification>,
) {
    for notification in notifications {
        let receiver = notification.receiver;
        if let Err(error) = dispatcher.send(notification).await {
            tracing::warn!(%receiver, %error, "notification dispatch failed; dropping");
        }
    }
}
