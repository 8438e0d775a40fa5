//! Domain types for the scheduling core.
//!
//! Value objects, identifiers, and the four persisted entities: availability
//! slots, purchased packages, scheduled meetings, and packs. Entities carry
//! their invariant helpers here; all mutation policy lives in the component
//! modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a trainer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainerId(Uuid);

impl TrainerId {
    /// Creates a new random `TrainerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TrainerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TrainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an individual user (client or athlete)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pack (a group of clients booking as one unit)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackId(Uuid);

impl PackId {
    /// Creates a new random `PackId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PackId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trainer availability slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(Uuid);

impl SlotId {
    /// Creates a new random `SlotId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a purchased session package
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId(Uuid);

impl PackageId {
    /// Creates a new random `PackageId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PackageId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PackageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a scheduled meeting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeetingId(Uuid);

impl MeetingId {
    /// Creates a new random `MeetingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `MeetingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MeetingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a package template (the catalog entry a purchase
/// snapshots from; templates themselves live outside this core)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(Uuid);

impl TemplateId {
    /// Creates a new random `TemplateId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Client identity
// ============================================================================

/// The party a package or meeting belongs to: a single user or a pack.
///
/// A tagged union rather than an id plus a kind flag, so pack-specific
/// paths (invite fan-out, liveness gating) cannot be reached with a user
/// id and vice versa.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientId {
    /// A single user training alone
    User(UserId),
    /// A pack training together as one booking unit
    Pack(PackId),
}

impl ClientId {
    /// Returns true if this client is a pack
    #[must_use]
    pub const fn is_pack(&self) -> bool {
        matches!(self, Self::Pack(_))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Pack(id) => write!(f, "pack:{id}"),
        }
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents a session price in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Time Value Objects
// ============================================================================

/// Half-open time window used when listing slots
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Start of the window (inclusive)
    pub from: DateTime<Utc>,
    /// End of the window (exclusive)
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Creates a new `DateRange`
    #[must_use]
    pub const fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Checks whether an instant falls inside the window
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant < self.to
    }
}

// ============================================================================
// Domain Entities
// ============================================================================

/// A trainer-published window of availability.
///
/// Slots are never deleted; cancellation only clears the booking flag and
/// bindings so the history of published windows survives for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    /// Unique slot identifier
    pub id: SlotId,
    /// Trainer who published the slot
    pub trainer_id: TrainerId,
    /// When the window opens
    pub starts_at: DateTime<Utc>,
    /// When the window closes
    pub ends_at: DateTime<Utc>,
    /// Whether a live meeting currently holds the slot
    pub booked: bool,
    /// Package funding the booking, if booked
    pub package_id: Option<PackageId>,
    /// Meeting holding the slot, if booked
    pub meeting_id: Option<MeetingId>,
}

impl AvailabilitySlot {
    /// Creates a new unbooked `AvailabilitySlot`
    #[must_use]
    pub const fn new(
        id: SlotId,
        trainer_id: TrainerId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            trainer_id,
            starts_at,
            ends_at,
            booked: false,
            package_id: None,
            meeting_id: None,
        }
    }
}

/// Status of a purchased package
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatus {
    /// Sessions remain
    Incomplete,
    /// Every purchased session has been consumed
    Complete,
}

/// Snapshot of the catalog template fields a purchase copies.
///
/// The template catalog is owned by a collaborating service; purchases carry
/// a snapshot so later template edits never mutate sold inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    /// Catalog entry this snapshot was taken from
    pub template_id: TemplateId,
    /// Package name at purchase time
    pub name: String,
    /// Number of sessions in the bundle
    pub total_sessions: u32,
    /// Per-session price at purchase time
    pub session_price: Money,
}

/// A purchased bundle of trainable sessions.
///
/// `remaining = total_sessions - consumed.len()` is always derived, never
/// stored, so the counter cannot drift.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedPackage {
    /// Unique package identifier
    pub id: PackageId,
    /// Catalog template this purchase snapshotted
    pub template_id: TemplateId,
    /// Package name copied from the template at purchase time
    pub name: String,
    /// The buying party (user or pack)
    pub client: ClientId,
    /// Trainer the sessions are booked with
    pub trainer_id: TrainerId,
    /// Number of sessions purchased
    pub total_sessions: u32,
    /// Per-session price copied from the template
    pub session_price: Money,
    /// Meetings that have consumed a session, in consumption order
    pub consumed: Vec<MeetingId>,
    /// Derived-at-write status flag
    pub status: PackageStatus,
    /// When the purchase happened
    pub purchased_at: DateTime<Utc>,
}

impl PurchasedPackage {
    /// Creates a new `PurchasedPackage` from a template snapshot
    #[must_use]
    pub fn from_snapshot(
        id: PackageId,
        snapshot: TemplateSnapshot,
        client: ClientId,
        trainer_id: TrainerId,
        purchased_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            template_id: snapshot.template_id,
            name: snapshot.name,
            client,
            trainer_id,
            total_sessions: snapshot.total_sessions,
            session_price: snapshot.session_price,
            consumed: Vec::new(),
            status: PackageStatus::Incomplete,
            purchased_at,
        }
    }

    /// Sessions not yet consumed
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn remaining(&self) -> u32 {
        self.total_sessions.saturating_sub(self.consumed.len() as u32)
    }

    /// Whether another session can be consumed
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Whether the given meeting already consumed a session
    #[must_use]
    pub fn has_consumed(&self, meeting_id: MeetingId) -> bool {
        self.consumed.contains(&meeting_id)
    }
}

/// Status of a scheduled meeting (the session lifecycle state machine)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeetingStatus {
    /// Invite sent, no slot held yet
    Proposed,
    /// Slot reserved and package session consumed
    Scheduled,
    /// The session happened (terminal)
    Completed,
    /// The session was called off (terminal)
    Cancelled,
}

impl MeetingStatus {
    /// Whether this status admits no further transitions
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A confirmed or in-flight appointment between a trainer and a client.
///
/// Cancellation is a status transition plus compensating writes; meeting
/// rows are retained for audit, never hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMeeting {
    /// Unique meeting identifier
    pub id: MeetingId,
    /// Trainer running the session
    pub trainer_id: TrainerId,
    /// The booked party (user or pack)
    pub client: ClientId,
    /// Package funding the session
    pub package_id: PackageId,
    /// Availability slot the meeting occupies
    pub slot_id: SlotId,
    /// When the session starts (copied from the slot)
    pub starts_at: DateTime<Utc>,
    /// When the session ends (copied from the slot)
    pub ends_at: DateTime<Utc>,
    /// Current lifecycle state
    pub status: MeetingStatus,
    /// Free-form session note from the trainer
    pub note: String,
    /// Session price at proposal time
    pub price: Money,
    /// When the meeting was proposed
    pub proposed_at: DateTime<Utc>,
}

/// A group of clients training together as one booking unit.
///
/// `is_live` gates bookability: it flips false→true exactly once, when the
/// last pending invite resolves by acceptance. Members and pending invites
/// are always disjoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    /// Unique pack identifier
    pub id: PackId,
    /// User who created the pack
    pub owner_id: UserId,
    /// Users who have accepted (owner included)
    pub members: Vec<UserId>,
    /// Users invited but not yet responded
    pub pending_invites: Vec<UserId>,
    /// Package the pack trains on, once purchased
    pub package_id: Option<PackageId>,
    /// Whether every invitee has accepted and the pack is bookable
    pub is_live: bool,
    /// When the pack was created
    pub created_at: DateTime<Utc>,
}

impl Pack {
    /// Creates a new `Pack` with the owner as its first member.
    ///
    /// A pack with no invitees has nothing to wait for and starts live.
    #[must_use]
    pub fn new(
        id: PackId,
        owner_id: UserId,
        pending_invites: Vec<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let is_live = pending_invites.is_empty();
        Self {
            id,
            owner_id,
            members: vec![owner_id],
            pending_invites,
            package_id: None,
            is_live,
            created_at,
        }
    }

    /// Whether the user has already accepted
    #[must_use]
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Whether the user has an unresolved invite
    #[must_use]
    pub fn is_pending(&self, user_id: UserId) -> bool {
        self.pending_invites.contains(&user_id)
    }
}
