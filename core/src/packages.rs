//! Package ledger: purchased session-package inventories.
//!
//! Owns session-count accounting for purchased packages. The consumed list
//! is the source of truth; `remaining` is always derived from it, so the
//! counter can never go negative or double-count. Consume and restore are
//! CAS-guarded and idempotent per meeting id, which is what makes them
//! composable with confirm/cancel retries.

use crate::environment::SchedulingEnvironment;
use crate::error::SchedulingError;
use crate::store::{StoreError, Versioned};
use crate::types::{
    ClientId, MeetingId, PackageId, PackageStatus, PurchasedPackage, TemplateSnapshot, TrainerId,
};

const MAX_CAS_ATTEMPTS: usize = 8;

/// Ledger of purchased session packages.
#[derive(Clone)]
pub struct PackageLedger {
    env: SchedulingEnvironment,
}

impl PackageLedger {
    /// Creates a new `PackageLedger`
    #[must_use]
    pub const fn new(env: SchedulingEnvironment) -> Self {
        Self { env }
    }

    /// Create a purchased package by snapshotting template fields.
    ///
    /// The catalog template itself is never mutated.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Store`] if the package cannot be persisted.
    pub async fn create_package(
        &self,
        snapshot: TemplateSnapshot,
        client: ClientId,
        trainer_id: TrainerId,
    ) -> Result<PackageId, SchedulingError> {
        let package_id = PackageId::new();
        let package = PurchasedPackage::from_snapshot(
            package_id,
            snapshot,
            client,
            trainer_id,
            self.env.clock.now(),
        );
        self.env.packages.insert(package).await?;
        tracing::info!(%package_id, %client, %trainer_id, "package created");
        Ok(package_id)
    }

    /// Consume one session for a meeting.
    ///
    /// Appends the meeting to the consumed list and flips the package to
    /// `Complete` exactly when the count reaches the total. A meeting that
    /// already consumed a session is a no-op, so a retried confirmation
    /// cannot double-count.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PackageNotFound`] for a stale or foreign id
    /// - [`SchedulingError::PackageExhausted`] when no sessions remain
    /// - [`SchedulingError::Store`] on backend failure or exhausted retries
    pub async fn consume_session(
        &self,
        package_id: PackageId,
        meeting_id: MeetingId,
    ) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(Versioned {
                version,
                document: mut package,
            }) = self.env.packages.get(package_id).await?
            else {
                return Err(SchedulingError::PackageNotFound(package_id));
            };

            if package.has_consumed(meeting_id) {
                return Ok(());
            }

            if !package.has_remaining() {
                return Err(SchedulingError::PackageExhausted {
                    package: package_id,
                });
            }

            package.consumed.push(meeting_id);
            if package.remaining() == 0 {
                package.status = PackageStatus::Complete;
            }
            let remaining = package.remaining();

            match self.env.packages.update(version, package).await {
                Ok(_) => {
                    tracing::info!(%package_id, %meeting_id, remaining, "session consumed");
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("package {package_id}: retry budget exhausted")).into())
    }

    /// Restore one session after a cancellation.
    ///
    /// Removes the meeting from the consumed list and reverts `Complete` to
    /// `Incomplete` if the package had just filled up. Idempotent: restoring
    /// a meeting that is not in the list is a no-op, so cancellation
    /// compensation is safe to retry.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PackageNotFound`] for a stale or foreign id
    /// - [`SchedulingError::Store`] on backend failure or exhausted retries
    pub async fn restore_session(
        &self,
        package_id: PackageId,
        meeting_id: MeetingId,
    ) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(Versioned {
                version,
                document: mut package,
            }) = self.env.packages.get(package_id).await?
            else {
                return Err(SchedulingError::PackageNotFound(package_id));
            };

            if !package.has_consumed(meeting_id) {
                return Ok(());
            }

            package.consumed.retain(|consumed| *consumed != meeting_id);
            package.status = PackageStatus::Incomplete;
            let remaining = package.remaining();

            match self.env.packages.update(version, package).await {
                Ok(_) => {
                    tracing::info!(%package_id, %meeting_id, remaining, "session restored");
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("package {package_id}: retry budget exhausted")).into())
    }

    /// Remaining and total session counts for a package.
    ///
    /// Derived read; display-grade freshness only.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PackageNotFound`] for a stale or foreign id
    /// - [`SchedulingError::Store`] on backend failure
    pub async fn remaining_sessions(
        &self,
        package_id: PackageId,
    ) -> Result<(u32, u32), SchedulingError> {
        let Some(Versioned { document, .. }) = self.env.packages.get(package_id).await? else {
            return Err(SchedulingError::PackageNotFound(package_id));
        };
        Ok((document.remaining(), document.total_sessions))
    }
}
