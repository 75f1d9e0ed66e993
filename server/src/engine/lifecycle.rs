//! Temporary channel lifecycle: provision on a creator-channel join, count
//! joins and leaves, destroy when the last occupant leaves.
//!
//! Callers must hold the channel's [`Slot`](super::sequencer::Slot) for the
//! duration of each call; every method is a read-modify-write of one record.

use std::sync::Arc;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::config::ChannelsSection;
use crate::db::models::{
    ChannelId, CreateTemporaryChannelParams, CreatorChannelFilter, CreatorChannelRow,
    TemporaryChannelRow, UserId,
};
use crate::db::queries::{creator_channels, temporary_channels};
use crate::error::{LifecycleError, ReconciliationGap};
use crate::platform::{ChannelSpec, Platform};

use super::events::VoiceStateUpdate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A creator channel was joined; a new temporary channel now holds the joiner.
    Provisioned(TemporaryChannelRow),
    /// The platform echoed the move performed during provisioning. Count unchanged.
    OwnerArrived(TemporaryChannelRow),
    /// Someone joined a temporary channel; count incremented.
    Joined(TemporaryChannelRow),
    /// Neither a creator channel nor a tracked temporary channel.
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Count decremented, channel still occupied.
    Left(TemporaryChannelRow),
    /// Last occupant left; external channel and record removed.
    Destroyed(TemporaryChannelRow),
    /// No tracked temporary channel with this id (already destroyed or never ours).
    Untracked,
}

pub struct ChannelLifecycle {
    pool: SqlitePool,
    platform: Arc<dyn Platform>,
    naming: ChannelsSection,
    /// Freshly provisioned channels whose owner's arrival has not been observed yet.
    pending_arrivals: DashMap<ChannelId, UserId>,
}

impl ChannelLifecycle {
    pub fn new(pool: SqlitePool, platform: Arc<dyn Platform>, naming: ChannelsSection) -> Self {
        Self {
            pool,
            platform,
            naming,
            pending_arrivals: DashMap::new(),
        }
    }

    /// A member joined `channel_id`.
    pub async fn join(
        &self,
        update: &VoiceStateUpdate,
        channel_id: ChannelId,
    ) -> Result<JoinOutcome, LifecycleError> {
        let creator = creator_channels::get_creator_channel(
            &self.pool,
            &CreatorChannelFilter {
                channel_id: Some(channel_id),
                ..Default::default()
            },
        )
        .await?;
        if let Some(creator) = creator {
            return self
                .provision(&creator, update)
                .await
                .map(JoinOutcome::Provisioned);
        }

        let Some(row) = temporary_channels::get_by_channel_id(&self.pool, channel_id).await? else {
            return Ok(JoinOutcome::Untracked);
        };

        let arrived = self
            .pending_arrivals
            .remove_if(&channel_id, |_, owner| *owner == update.user_id)
            .is_some();
        if arrived {
            debug!(channel_id, user_id = update.user_id, "owner arrived in provisioned channel");
            return Ok(JoinOutcome::OwnerArrived(row));
        }

        match temporary_channels::set_user_count(&self.pool, row.id, row.user_count + 1).await? {
            Some(updated) => {
                debug!(channel_id, user_count = updated.user_count, "temporary channel joined");
                Ok(JoinOutcome::Joined(updated))
            }
            None => Ok(JoinOutcome::Untracked),
        }
    }

    /// A member left `channel_id`.
    pub async fn leave(
        &self,
        update: &VoiceStateUpdate,
        channel_id: ChannelId,
    ) -> Result<LeaveOutcome, LifecycleError> {
        let Some(row) = temporary_channels::get_by_channel_id(&self.pool, channel_id).await? else {
            return Ok(LeaveOutcome::Untracked);
        };

        let remaining = row.user_count - 1;
        if remaining < 0 {
            warn!(
                gap = %ReconciliationGap::CountUnderflow,
                channel_id,
                user_id = update.user_id,
                user_count = row.user_count,
                "leave would take occupant count below zero"
            );
        }

        if remaining <= 0 {
            self.destroy(&row).await?;
            return Ok(LeaveOutcome::Destroyed(row));
        }

        match temporary_channels::set_user_count(&self.pool, row.id, remaining).await? {
            Some(updated) => {
                debug!(channel_id, user_count = updated.user_count, "temporary channel left");
                Ok(LeaveOutcome::Left(updated))
            }
            None => Ok(LeaveOutcome::Untracked),
        }
    }

    /// Provisioning saga: create the external channel, persist it, then move the
    /// joiner in. Each failed step undoes the earlier ones.
    async fn provision(
        &self,
        creator: &CreatorChannelRow,
        update: &VoiceStateUpdate,
    ) -> Result<TemporaryChannelRow, LifecycleError> {
        let spec = ChannelSpec::voice(
            self.naming.temporary_name(update.display_name()),
            creator.occupancy_cap(),
        );
        let channel_id = self.platform.create_channel(update.guild_id, &spec).await?;

        let params = CreateTemporaryChannelParams {
            guild_id: creator.guild_id,
            channel_id,
            user_count: 1,
            owner_id: update.user_id,
        };
        let row = match temporary_channels::create_temporary_channel(&self.pool, &params).await {
            Ok(row) => row,
            Err(e) => {
                error!(
                    action = "provision",
                    channel_id,
                    error = %e,
                    detail = %e.detail(),
                    "failed to persist temporary channel, deleting it"
                );
                if let Err(delete_err) = self.platform.delete_channel(channel_id).await {
                    error!(
                        gap = %ReconciliationGap::UntrackedChannel,
                        channel_id,
                        error = %delete_err,
                        "compensating delete failed; channel exists without a record"
                    );
                }
                return Err(e.into());
            }
        };

        // Registered before the move so the echoed join cannot be counted twice.
        self.pending_arrivals.insert(channel_id, update.user_id);
        if let Err(e) = self
            .platform
            .move_member(update.guild_id, update.user_id, Some(channel_id))
            .await
        {
            error!(
                action = "provision",
                channel_id,
                user_id = update.user_id,
                error = %e,
                "failed to move member into provisioned channel, destroying it"
            );
            if let Err(destroy_err) = self.destroy(&row).await {
                debug!(channel_id, error = %destroy_err, "rollback of provisioned channel incomplete");
            }
            return Err(e.into());
        }

        info!(
            guild_id = update.guild_id,
            channel_id,
            owner_id = update.user_id,
            creator_channel_id = creator.channel_id,
            "provisioned temporary channel"
        );
        Ok(row)
    }

    /// Delete the external channel, then the record.
    async fn destroy(&self, row: &TemporaryChannelRow) -> Result<(), LifecycleError> {
        self.pending_arrivals.remove(&row.channel_id);

        match self.platform.delete_channel(row.channel_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(channel_id = row.channel_id, "platform channel already gone");
            }
            Err(e) => {
                error!(
                    gap = %ReconciliationGap::UndeletedChannel,
                    channel_id = row.channel_id,
                    error = %e,
                    "failed to delete platform channel; record kept at zero occupants"
                );
                if row.user_count != 0
                    && let Err(store_err) =
                        temporary_channels::set_user_count(&self.pool, row.id, 0).await
                {
                    error!(channel_id = row.channel_id, error = %store_err, "failed to zero occupant count");
                }
                return Err(e.into());
            }
        }

        match temporary_channels::delete_temporary_channel(&self.pool, row.id).await {
            Ok(Some(_)) => {
                info!(channel_id = row.channel_id, "temporary channel destroyed");
                Ok(())
            }
            Ok(None) => {
                debug!(channel_id = row.channel_id, "temporary channel record already gone");
                Ok(())
            }
            Err(e) => {
                error!(
                    gap = %ReconciliationGap::StaleRecord,
                    channel_id = row.channel_id,
                    error = %e,
                    detail = %e.detail(),
                    "platform channel deleted but record remains"
                );
                Err(e.into())
            }
        }
    }

    /// Number of provisioned channels still waiting for their owner's arrival.
    pub fn pending_arrivals(&self) -> usize {
        self.pending_arrivals.len()
    }
}
