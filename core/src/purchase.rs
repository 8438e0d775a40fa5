//! Purchase orchestrator: package purchase and its fan-out.
//!
//! Creates the purchased-package record, then performs the two non-critical
//! follow-ups: adding the buyer(s) to the trainer's roster (best-effort and
//! idempotent; a roster failure is logged, never unwound into the purchase)
//! and notifying buyer and trainer. Payment capture happens upstream; by the
//! time this orchestrator runs, the purchase is a fact.

use crate::environment::SchedulingEnvironment;
use crate::error::SchedulingError;
use crate::notify::{dispatch_all, Notification, NotificationKind};
use crate::packages::PackageLedger;
use crate::packs::resolve_client_users;
use crate::store::{StoreError, Versioned};
use crate::types::{ClientId, PackId, PackageId, TemplateSnapshot, TrainerId};
use smallvec::SmallVec;

const MAX_CAS_ATTEMPTS: usize = 8;

/// Coordinator for session-package purchases.
#[derive(Clone)]
pub struct PurchaseOrchestrator {
    env: SchedulingEnvironment,
    packages: PackageLedger,
}

impl PurchaseOrchestrator {
    /// Creates a new `PurchaseOrchestrator` over the shared environment
    #[must_use]
    pub fn new(env: SchedulingEnvironment) -> Self {
        let packages = PackageLedger::new(env.clone());
        Self { env, packages }
    }

    /// Record a purchase: create the package, update the roster, fan out
    /// confirmations.
    ///
    /// The roster update covers every user behind the client (all members
    /// for a pack) and is best-effort: the package exists regardless, and a
    /// failed roster write is retried by the next purchase or an out-of-band
    /// sweep.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PackNotFound`] for a pack client that does not exist
    /// - [`SchedulingError::Store`] if the package cannot be persisted
    pub async fn purchase(
        &self,
        client: ClientId,
        snapshot: TemplateSnapshot,
        trainer_id: TrainerId,
    ) -> Result<PackageId, SchedulingError> {
        // Resolve first so a stale pack id fails before any write.
        let buyers = resolve_client_users(&self.env, client).await?;

        let name = snapshot.name.clone();
        let total_sessions = snapshot.total_sessions;
        let session_price = snapshot.session_price;
        let package_id = self
            .packages
            .create_package(snapshot, client, trainer_id)
            .await?;

        // Denormalized backlink for display paths; same best-effort
        // contract as the roster.
        if let ClientId::Pack(pack_id) = client {
            if let Err(error) = self.link_pack_package(pack_id, package_id).await {
                tracing::warn!(%pack_id, %package_id, %error, "pack backlink failed");
            }
        }

        for buyer in &buyers {
            if let Err(error) = self.env.roster.add_client(trainer_id, *buyer).await {
                tracing::warn!(%trainer_id, user_id = %buyer, %error, "roster update failed");
            }
        }

        let kind = NotificationKind::PackagePurchased {
            package_id,
            client,
            trainer_id,
            name,
            total_sessions,
            session_price,
        };
        let mut notifications: SmallVec<[Notification; 4]> = buyers
            .into_iter()
            .map(|user_id| Notification::to_user(user_id, kind.clone()))
            .collect();
        notifications.push(Notification::to_trainer(trainer_id, kind));
        dispatch_all(self.env.dispatcher.as_ref(), notifications).await;

        Ok(package_id)
    }

    /// Point a pack at the package it now trains on.
    async fn link_pack_package(
        &self,
        pack_id: PackId,
        package_id: PackageId,
    ) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(Versioned {
                version,
                document: mut pack,
            }) = self.env.packs.get(pack_id).await?
            else {
                return Err(SchedulingError::PackNotFound(pack_id));
            };

            pack.package_id = Some(package_id);
            match self.env.packs.update(version, pack).await {
                Ok(_) => return Ok(()),
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("pack {pack_id}: retry budget exhausted")).into())
    }
}
