//! Versioned document store abstraction.
//!
//! The scheduling core persists its entities through a narrow, dyn-compatible
//! store trait built around per-document optimistic concurrency: every write
//! names the version it read, and a concurrent writer winning the race
//! surfaces as [`StoreError::VersionConflict`]. Components loop
//! read-revalidate-write on conflict so two racing callers always produce
//! exactly one winner and one well-typed domain error.
//!
//! Read-side listing (`scan`) is allowed to be eventually consistent; it is
//! for display only and is never used to gate a write decision.
//!
//! # Dyn Compatibility
//!
//! Trait methods return explicit `Pin<Box<dyn Future>>` instead of
//! `async fn` so stores can live behind `Arc<dyn DocumentStore<_>>` inside
//! the shared environment.

use crate::types::{
    AvailabilitySlot, MeetingId, Pack, PackId, PackageId, PurchasedPackage, ScheduledMeeting,
    SlotId, TrainerId, UserId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use thiserror::Error;

/// Monotonic per-document version used for compare-and-swap writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version a freshly inserted document carries
    pub const INITIAL: Self = Self(0);

    /// Creates a version from a raw value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version after one successful write
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document paired with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<D> {
    /// Version the store held when this read happened
    pub version: Version,
    /// The document itself
    pub document: D,
}

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the document changed since it was read.
    #[error("version conflict on {document}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Display form of the document id where the conflict occurred
        document: String,
        /// The version the writer read
        expected: Version,
        /// The version the store currently holds
        actual: Version,
    },

    /// Insert of a document whose id already exists.
    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// Update of a document that was never inserted.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Backing store failure (connection, I/O, serialization).
    #[error("backend error: {0}")]
    Backend(String),
}

/// A persistable entity with a typed primary key.
pub trait Document: Clone + Send + Sync + 'static {
    /// Primary key type
    type Id: Copy + Eq + Hash + fmt::Display + Send + Sync;

    /// Collection name, used in logs and error text
    const COLLECTION: &'static str;

    /// Returns this document's primary key
    fn id(&self) -> Self::Id;
}

/// Per-entity atomic read-modify-write storage.
///
/// # Contract
///
/// - `insert` is create-only; an existing id fails with `AlreadyExists`.
/// - `update` succeeds only when `expected` matches the stored version;
///   otherwise it fails with `VersionConflict` and writes nothing.
/// - `get`/`scan` never block writers and carry no freshness guarantee
///   beyond read-your-own-writes within a single store instance.
pub trait DocumentStore<D: Document>: Send + Sync {
    /// Fetch a document with its current version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backing store fails.
    fn get(
        &self,
        id: D::Id,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Versioned<D>>, StoreError>> + Send + '_>>;

    /// Insert a new document at [`Version::INITIAL`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken, or
    /// [`StoreError::Backend`] if the backing store fails.
    fn insert(
        &self,
        document: D,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>>;

    /// Replace a document if and only if it is still at `expected`.
    ///
    /// Returns the new version on success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] when a concurrent writer won,
    /// [`StoreError::NotFound`] if the document was never inserted, or
    /// [`StoreError::Backend`] if the backing store fails.
    fn update(
        &self,
        expected: Version,
        document: D,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>>;

    /// List every document in the collection.
    ///
    /// Read-side only; eventual consistency is acceptable here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backing store fails.
    fn scan(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Versioned<D>>, StoreError>> + Send + '_>>;
}

/// Trainer→clients side table.
///
/// Auxiliary, eventually-consistent state maintained best-effort by the
/// purchase orchestrator. Failures here never unwind a purchase.
pub trait TrainerRoster: Send + Sync {
    /// Record that a client now trains with a trainer. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backing store fails.
    fn add_client(
        &self,
        trainer_id: TrainerId,
        client_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// List the clients on a trainer's roster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backing store fails.
    fn clients_of(
        &self,
        trainer_id: TrainerId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<UserId>, StoreError>> + Send + '_>>;
}

// ============================================================================
// Document impls for the four persisted entities
// ============================================================================

impl Document for AvailabilitySlot {
    type Id = SlotId;
    const COLLECTION: &'static str = "availability_slots";

    fn id(&self) -> SlotId {
        self.id
    }
}

impl Document for PurchasedPackage {
    type Id = PackageId;
    const COLLECTION: &'static str = "purchased_packages";

    fn id(&self) -> PackageId {
        self.id
    }
}

impl Document for ScheduledMeeting {
    type Id = MeetingId;
    const COLLECTION: &'static str = "scheduled_meetings";

    fn id(&self) -> MeetingId {
        self.id
    }
}

impl Document for Pack {
    type Id = PackId;
    const COLLECTION: &'static str = "packs";

    fn id(&self) -> PackId {
        self.id
    }
}
