//! Pack consensus: the multi-party invitation protocol.
//!
//! A pack becomes bookable ("live") only once every invitee has responded by
//! accepting. The liveness check and the membership mutation run inside one
//! compare-and-swap on the pack document, so two concurrent last-acceptors
//! cannot both declare the pack live: one CAS wins and flips the flag, the
//! loser reloads and finds its invite already resolved.

use crate::environment::SchedulingEnvironment;
use crate::error::SchedulingError;
use crate::notify::{dispatch_all, Notification, NotificationKind};
use crate::store::{StoreError, Versioned};
use crate::types::{ClientId, Pack, PackId, UserId};
use smallvec::{smallvec, SmallVec};

const MAX_CAS_ATTEMPTS: usize = 8;

/// Driver for pack creation and the invitation/acceptance protocol.
#[derive(Clone)]
pub struct PackConsensus {
    env: SchedulingEnvironment,
}

impl PackConsensus {
    /// Creates a new `PackConsensus`
    #[must_use]
    pub const fn new(env: SchedulingEnvironment) -> Self {
        Self { env }
    }

    /// Create a pack with the owner as first member and fan out invites.
    ///
    /// A pack created without invitees has nothing to wait for and starts
    /// live immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Store`] if the pack cannot be persisted.
    pub async fn create_pack(
        &self,
        owner_id: UserId,
        invitees: Vec<UserId>,
    ) -> Result<PackId, SchedulingError> {
        let pack_id = PackId::new();
        let pack = Pack::new(pack_id, owner_id, invitees.clone(), self.env.clock.now());
        self.env.packs.insert(pack).await?;
        tracing::info!(%pack_id, %owner_id, invitees = invitees.len(), "pack created");

        let invites = invitees.into_iter().map(|user_id| {
            Notification::to_user(
                user_id,
                NotificationKind::PackInvite {
                    pack_id,
                    inviter_id: owner_id,
                },
            )
        });
        dispatch_all(self.env.dispatcher.as_ref(), invites).await;

        Ok(pack_id)
    }

    /// Invite further users into a pack.
    ///
    /// Fails the whole call before writing anything if any invitee is
    /// already a member; invitees already pending are skipped silently.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PackNotFound`] for a stale id
    /// - [`SchedulingError::AlreadyMember`] if an invitee already accepted
    /// - [`SchedulingError::Store`] on backend failure or exhausted retries
    pub async fn invite(
        &self,
        pack_id: PackId,
        inviter_id: UserId,
        invitee_ids: &[UserId],
    ) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Versioned {
                version,
                document: mut pack,
            } = load_pack_versioned(&self.env, pack_id).await?;

            for invitee in invitee_ids {
                if pack.is_member(*invitee) {
                    return Err(SchedulingError::AlreadyMember {
                        pack: pack_id,
                        user: *invitee,
                    });
                }
            }

            let added: Vec<UserId> = invitee_ids
                .iter()
                .copied()
                .filter(|invitee| !pack.is_pending(*invitee))
                .collect();
            if added.is_empty() {
                return Ok(());
            }

            // Liveness is monotonic: inviting into a live pack leaves it
            // live, and the newcomer joins on acceptance without a second
            // pack-live fan-out.
            pack.pending_invites.extend(added.iter().copied());

            match self.env.packs.update(version, pack).await {
                Ok(_) => {
                    tracing::info!(%pack_id, invited = added.len(), "pack invites sent");
                    let invites = added.into_iter().map(|user_id| {
                        Notification::to_user(
                            user_id,
                            NotificationKind::PackInvite {
                                pack_id,
                                inviter_id,
                            },
                        )
                    });
                    dispatch_all(self.env.dispatcher.as_ref(), invites).await;
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("pack {pack_id}: retry budget exhausted")).into())
    }

    /// Accept a pending invite.
    ///
    /// Moves the user from pending to members and, when that empties the
    /// pending list, flips `is_live` inside the same CAS. Returns whether
    /// this acceptance made the pack live so callers can branch on it; the
    /// matching fan-out ("pack live" to everyone, or "member joined" to the
    /// prior members) has already been dispatched.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PackNotFound`] for a stale id
    /// - [`SchedulingError::InviteNotFound`] if the user is not pending
    /// - [`SchedulingError::Store`] on backend failure or exhausted retries
    pub async fn accept(
        &self,
        pack_id: PackId,
        user_id: UserId,
    ) -> Result<bool, SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Versioned {
                version,
                document: mut pack,
            } = load_pack_versioned(&self.env, pack_id).await?;

            if !pack.is_pending(user_id) {
                return Err(SchedulingError::InviteNotFound {
                    pack: pack_id,
                    user: user_id,
                });
            }

            let prior_members = pack.members.clone();
            pack.pending_invites.retain(|pending| *pending != user_id);
            pack.members.push(user_id);

            // The compare-and-branch on the terminal acceptor. Must share
            // the CAS with the membership mutation above.
            let became_live = pack.pending_invites.is_empty() && !pack.is_live;
            if became_live {
                pack.is_live = true;
            }

            let members = pack.members.clone();
            match self.env.packs.update(version, pack).await {
                Ok(_) => {
                    tracing::info!(%pack_id, %user_id, became_live, "pack invite accepted");
                    if became_live {
                        let fan_out = members.into_iter().map(|member| {
                            Notification::to_user(member, NotificationKind::PackLive { pack_id })
                        });
                        dispatch_all(self.env.dispatcher.as_ref(), fan_out).await;
                    } else {
                        let fan_out = prior_members.into_iter().map(|member| {
                            Notification::to_user(
                                member,
                                NotificationKind::PackMemberJoined { pack_id, user_id },
                            )
                        });
                        dispatch_all(self.env.dispatcher.as_ref(), fan_out).await;
                    }
                    return Ok(became_live);
                }
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("pack {pack_id}: retry budget exhausted")).into())
    }

    /// Decline a pending invite.
    ///
    /// Removes the user from pending only. Never touches membership or
    /// liveness: a pack goes live through acceptance, not attrition.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PackNotFound`] for a stale id
    /// - [`SchedulingError::InviteNotFound`] if the user is not pending
    /// - [`SchedulingError::Store`] on backend failure or exhausted retries
    pub async fn decline(&self, pack_id: PackId, user_id: UserId) -> Result<(), SchedulingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Versioned {
                version,
                document: mut pack,
            } = load_pack_versioned(&self.env, pack_id).await?;

            if !pack.is_pending(user_id) {
                return Err(SchedulingError::InviteNotFound {
                    pack: pack_id,
                    user: user_id,
                });
            }

            pack.pending_invites.retain(|pending| *pending != user_id);

            match self.env.packs.update(version, pack).await {
                Ok(_) => {
                    tracing::info!(%pack_id, %user_id, "pack invite declined");
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Err(StoreError::Backend(format!("pack {pack_id}: retry budget exhausted")).into())
    }
}

/// Load a pack document or fail with `PackNotFound`.
pub(crate) async fn load_pack(
    env: &SchedulingEnvironment,
    pack_id: PackId,
) -> Result<Pack, SchedulingError> {
    Ok(load_pack_versioned(env, pack_id).await?.document)
}

async fn load_pack_versioned(
    env: &SchedulingEnvironment,
    pack_id: PackId,
) -> Result<Versioned<Pack>, SchedulingError> {
    env.packs
        .get(pack_id)
        .await?
        .ok_or(SchedulingError::PackNotFound(pack_id))
}

/// Resolve the user ids behind a client: the user itself, or every pack
/// member for a pack client. Used for notification fan-out.
pub(crate) async fn resolve_client_users(
    env: &SchedulingEnvironment,
    client: ClientId,
) -> Result<SmallVec<[UserId; 4]>, SchedulingError> {
    match client {
        ClientId::User(user_id) => Ok(smallvec![user_id]),
        ClientId::Pack(pack_id) => {
            let pack = load_pack(env, pack_id).await?;
            Ok(pack.members.into_iter().collect())
        }
    }
}
