//! Handlers for the `add` and `kick` commands.
//!
//! Replies never carry error detail; failures are logged with full context and
//! the user sees one of the fixed [`CommandReply`] messages.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::config::ChannelsSection;
use crate::db::models::{
    CreateCreatorChannelParams, GuildFilter, GuildId, TemporaryChannelFilter, UserId,
};
use crate::db::queries::{creator_channels, guilds, temporary_channels};
use crate::error::{LifecycleError, ReconciliationGap};
use crate::platform::{ChannelSpec, Platform};

use super::events::{Command, CommandInvocation, CommandReply, MAX_USER_LIMIT, MIN_USER_LIMIT};
use super::sequencer::ChannelSequencer;

pub struct CommandHandlers {
    pool: SqlitePool,
    platform: Arc<dyn Platform>,
    naming: ChannelsSection,
    sequencer: Arc<ChannelSequencer>,
}

impl CommandHandlers {
    pub fn new(
        pool: SqlitePool,
        platform: Arc<dyn Platform>,
        naming: ChannelsSection,
        sequencer: Arc<ChannelSequencer>,
    ) -> Self {
        Self {
            pool,
            platform,
            naming,
            sequencer,
        }
    }

    pub async fn handle(&self, invocation: &CommandInvocation) -> CommandReply {
        let reply = match invocation.command {
            Command::Add { limit } => self.add(invocation.guild_id, limit).await,
            Command::Kick { user } => {
                self.kick(invocation.guild_id, invocation.user_id, user)
                    .await
            }
        };
        info!(
            command = invocation.command.name(),
            guild_id = invocation.guild_id,
            user_id = invocation.user_id,
            succeeded = reply.is_success(),
            reply = reply.message(),
            "command handled"
        );
        reply
    }

    /// Designate a new creator channel in the guild.
    async fn add(&self, guild_id: GuildId, limit: Option<i64>) -> CommandReply {
        let limit = limit.unwrap_or(MIN_USER_LIMIT);
        if !(MIN_USER_LIMIT..=MAX_USER_LIMIT).contains(&limit) {
            return CommandReply::InvalidLimit;
        }

        let guild = match guilds::ensure_guild(&self.pool, guild_id).await {
            Ok(guild) => guild,
            Err(e) => {
                error!(command = "add", guild_id, error = %e, detail = %e.detail(), "failed to ensure guild record");
                return CommandReply::InternalError;
            }
        };

        let cap = u32::try_from(limit).ok().filter(|cap| *cap > 0);
        let spec = ChannelSpec::voice(self.naming.creator_name.clone(), cap);
        let channel_id = match self.platform.create_channel(guild_id, &spec).await {
            Ok(id) => id,
            Err(e) => {
                error!(command = "add", guild_id, error = %e, "failed to create creator channel");
                return CommandReply::UnableToCreateChannel;
            }
        };

        let params = CreateCreatorChannelParams {
            guild_id: guild.id,
            channel_id,
            user_limit: limit,
        };
        if let Err(e) = creator_channels::create_creator_channel(&self.pool, &params).await {
            error!(
                command = "add",
                guild_id,
                channel_id,
                error = %e,
                detail = %e.detail(),
                "failed to persist creator channel, deleting it"
            );
            if let Err(delete_err) = self.platform.delete_channel(channel_id).await {
                error!(
                    gap = %ReconciliationGap::UntrackedChannel,
                    channel_id,
                    error = %delete_err,
                    "compensating delete failed; creator channel exists without a record"
                );
            }
            return CommandReply::InternalError;
        }

        info!(guild_id, channel_id, user_limit = limit, "creator channel added");
        CommandReply::ChannelCreated
    }

    /// Disconnect `target` from a temporary channel owned by `invoker`.
    async fn kick(&self, guild_id: GuildId, invoker: UserId, target: UserId) -> CommandReply {
        match self.try_kick(guild_id, invoker, target).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    command = "kick",
                    guild_id,
                    user_id = invoker,
                    target_id = target,
                    error_kind = e.error_kind(),
                    error = %e,
                    "kick failed"
                );
                CommandReply::InternalError
            }
        }
    }

    async fn try_kick(
        &self,
        guild_id: GuildId,
        invoker: UserId,
        target: UserId,
    ) -> Result<CommandReply, LifecycleError> {
        let guild = guilds::get_guild(
            &self.pool,
            &GuildFilter {
                guild_id: Some(guild_id),
                ..Default::default()
            },
        )
        .await?;
        let Some(guild) = guild else {
            return Ok(CommandReply::NotChannelOwner);
        };

        let owned = temporary_channels::list_temporary_channels(
            &self.pool,
            &TemporaryChannelFilter {
                guild_id: Some(guild.id),
                owner_id: Some(invoker),
                ..Default::default()
            },
        )
        .await?;
        if owned.is_empty() {
            return Ok(CommandReply::NotChannelOwner);
        }

        let states = self.platform.voice_states(guild_id).await?;
        let location = states
            .iter()
            .find(|state| state.user_id == target)
            .map(|state| state.channel_id);
        let Some(channel) = location.and_then(|at| owned.iter().find(|row| row.channel_id == at))
        else {
            return Ok(CommandReply::NoActionTaken);
        };

        let mut slot = self.sequencer.reserve(channel.channel_id);
        slot.acquire().await;

        // The channel may have been destroyed while waiting for the slot.
        if temporary_channels::get_by_channel_id(&self.pool, channel.channel_id)
            .await?
            .is_none()
        {
            warn!(channel_id = channel.channel_id, "kick target channel destroyed before kick");
            return Ok(CommandReply::NoActionTaken);
        }

        self.platform.move_member(guild_id, target, None).await?;
        info!(
            guild_id,
            channel_id = channel.channel_id,
            owner_id = invoker,
            target_id = target,
            "member kicked from temporary channel"
        );
        Ok(CommandReply::UserKicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CreateTemporaryChannelParams, CreatorChannelFilter};
    use crate::db::queries::test_support::setup_db;
    use crate::platform::recording::{Op, RecordingPlatform};

    const GUILD: i64 = 1;

    async fn handlers() -> (SqlitePool, Arc<RecordingPlatform>, CommandHandlers) {
        let pool = setup_db().await;
        let platform = Arc::new(RecordingPlatform::new());
        let handlers = CommandHandlers::new(
            pool.clone(),
            platform.clone(),
            ChannelsSection::default(),
            Arc::new(ChannelSequencer::new()),
        );
        (pool, platform, handlers)
    }

    fn invoke(user_id: i64, command: Command) -> CommandInvocation {
        CommandInvocation {
            guild_id: GUILD,
            user_id,
            command,
        }
    }

    /// A temporary channel owned by `owner`, live on the platform.
    async fn owned_channel(pool: &SqlitePool, platform: &RecordingPlatform, owner: i64) -> i64 {
        let guild = guilds::ensure_guild(pool, GUILD).await.unwrap();
        let channel_id = platform.seed_channel(ChannelSpec::voice("owned", None));
        temporary_channels::create_temporary_channel(
            pool,
            &CreateTemporaryChannelParams {
                guild_id: guild.id,
                channel_id,
                user_count: 2,
                owner_id: owner,
            },
        )
        .await
        .unwrap();
        channel_id
    }

    #[tokio::test]
    async fn test_add_creates_guild_and_creator_channel() {
        let (pool, platform, handlers) = handlers().await;

        let reply = handlers.handle(&invoke(10, Command::Add { limit: Some(2) })).await;
        assert_eq!(reply, CommandReply::ChannelCreated);

        let creates = platform.creates();
        assert_eq!(creates, vec![ChannelSpec::voice("Create Voice Channel", Some(2))]);

        let creators =
            creator_channels::list_creator_channels(&pool, &CreatorChannelFilter::default())
                .await
                .unwrap();
        assert_eq!(creators.len(), 1);
        assert_eq!(creators[0].user_limit, 2);
        assert!(platform.is_live(creators[0].channel_id));
    }

    #[tokio::test]
    async fn test_add_twice_reuses_guild() {
        let (pool, _platform, handlers) = handlers().await;
        handlers.handle(&invoke(10, Command::Add { limit: None })).await;
        handlers.handle(&invoke(11, Command::Add { limit: None })).await;

        let guilds = guilds::list_guilds(&pool, &GuildFilter::default()).await.unwrap();
        assert_eq!(guilds.len(), 1);
        let creators =
            creator_channels::list_creator_channels(&pool, &CreatorChannelFilter::default())
                .await
                .unwrap();
        assert_eq!(creators.len(), 2);
        assert!(creators.iter().all(|c| c.user_limit == 0 && c.guild_id == guilds[0].id));
    }

    #[tokio::test]
    async fn test_add_rejects_out_of_range_limit() {
        let (_pool, platform, handlers) = handlers().await;
        for limit in [-1, 101] {
            let reply = handlers
                .handle(&invoke(10, Command::Add { limit: Some(limit) }))
                .await;
            assert_eq!(reply, CommandReply::InvalidLimit);
        }
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_platform_failure() {
        let (pool, platform, handlers) = handlers().await;
        platform.fail(Op::Create);
        let reply = handlers.handle(&invoke(10, Command::Add { limit: None })).await;
        assert_eq!(reply, CommandReply::UnableToCreateChannel);
        let creators =
            creator_channels::list_creator_channels(&pool, &CreatorChannelFilter::default())
                .await
                .unwrap();
        assert!(creators.is_empty());
    }

    #[tokio::test]
    async fn test_add_persist_failure_deletes_channel() {
        let (pool, platform, handlers) = handlers().await;
        guilds::ensure_guild(&pool, GUILD).await.unwrap();
        sqlx::query("DROP TABLE creator_channels")
            .execute(&pool)
            .await
            .unwrap();

        let reply = handlers.handle(&invoke(10, Command::Add { limit: None })).await;
        assert_eq!(reply, CommandReply::InternalError);
        assert_eq!(platform.deletes().len(), 1);
        assert!(platform.live_channels().is_empty());
    }

    #[tokio::test]
    async fn test_add_storage_failure_is_internal_error() {
        let (pool, platform, handlers) = handlers().await;
        pool.close().await;
        let reply = handlers.handle(&invoke(10, Command::Add { limit: None })).await;
        assert_eq!(reply, CommandReply::InternalError);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_kick_by_owner_disconnects_target() {
        let (pool, platform, handlers) = handlers().await;
        let channel_id = owned_channel(&pool, &platform, 10).await;
        platform.voice.apply(GUILD, 10, Some(channel_id));
        platform.voice.apply(GUILD, 11, Some(channel_id));

        let reply = handlers.handle(&invoke(10, Command::Kick { user: 11 })).await;
        assert_eq!(reply, CommandReply::UserKicked);
        assert_eq!(platform.moves(), vec![(11, None)]);
    }

    #[tokio::test]
    async fn test_kick_by_non_owner_makes_no_mutation() {
        let (pool, platform, handlers) = handlers().await;
        let channel_id = owned_channel(&pool, &platform, 10).await;
        platform.voice.apply(GUILD, 10, Some(channel_id));
        platform.voice.apply(GUILD, 11, Some(channel_id));

        let reply = handlers.handle(&invoke(11, Command::Kick { user: 10 })).await;
        assert_eq!(reply, CommandReply::NotChannelOwner);
        assert!(platform.calls().is_empty());

        let row = temporary_channels::get_by_channel_id(&pool, channel_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.user_count, 2);
        assert_eq!(row.owner_id, 10);
    }

    #[tokio::test]
    async fn test_kick_in_unknown_guild_is_not_owner() {
        let (_pool, platform, handlers) = handlers().await;
        let reply = handlers.handle(&invoke(10, Command::Kick { user: 11 })).await;
        assert_eq!(reply, CommandReply::NotChannelOwner);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_kick_target_elsewhere_is_no_action() {
        let (pool, platform, handlers) = handlers().await;
        let channel_id = owned_channel(&pool, &platform, 10).await;
        platform.voice.apply(GUILD, 10, Some(channel_id));
        platform.voice.apply(GUILD, 11, Some(777));

        let reply = handlers.handle(&invoke(10, Command::Kick { user: 11 })).await;
        assert_eq!(reply, CommandReply::NoActionTaken);

        let reply = handlers.handle(&invoke(10, Command::Kick { user: 12 })).await;
        assert_eq!(reply, CommandReply::NoActionTaken);
        assert!(platform.moves().is_empty());
    }

    #[tokio::test]
    async fn test_kick_searches_every_owned_channel() {
        let (pool, platform, handlers) = handlers().await;
        let first = owned_channel(&pool, &platform, 10).await;
        let second = owned_channel(&pool, &platform, 10).await;
        platform.voice.apply(GUILD, 10, Some(first));
        platform.voice.apply(GUILD, 11, Some(second));

        let reply = handlers.handle(&invoke(10, Command::Kick { user: 11 })).await;
        assert_eq!(reply, CommandReply::UserKicked);
    }

    #[tokio::test]
    async fn test_kick_move_failure_is_internal_error() {
        let (pool, platform, handlers) = handlers().await;
        let channel_id = owned_channel(&pool, &platform, 10).await;
        platform.voice.apply(GUILD, 11, Some(channel_id));
        platform.fail(Op::Move);

        let reply = handlers.handle(&invoke(10, Command::Kick { user: 11 })).await;
        assert_eq!(reply, CommandReply::InternalError);
    }
}
