use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::db::models::{ChannelId, GuildId, UserId};

/// Lowest and highest accepted `add` occupancy cap.
pub const MIN_USER_LIMIT: i64 = 0;
pub const MAX_USER_LIMIT: i64 = 100;

/// A member's voice location changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    #[serde(with = "crate::platform::snowflake")]
    pub guild_id: GuildId,
    #[serde(with = "crate::platform::snowflake")]
    pub user_id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    /// Where the member is now. Absent (or `""` on the wire) means not in voice.
    #[serde(default, with = "crate::platform::snowflake::option")]
    pub channel_id: Option<ChannelId>,
    /// Where the member was before this update.
    #[serde(default, with = "crate::platform::snowflake::option")]
    pub previous_channel_id: Option<ChannelId>,
    /// First presence observed for this member since the transport connected.
    #[serde(default)]
    pub first_seen: bool,
}

impl VoiceStateUpdate {
    /// Guild nickname if set, otherwise the account username.
    pub fn display_name(&self) -> &str {
        match self.nick.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.username,
        }
    }
}

/// The closed set of user commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    /// Designate a new creator channel, optionally capping provisioned channels.
    Add {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<i64>,
    },
    /// Disconnect a member from the invoker's temporary channel.
    Kick {
        #[serde(with = "crate::platform::snowflake")]
        user: UserId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Kick { .. } => "kick",
        }
    }
}

/// A command together with who invoked it and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    #[serde(with = "crate::platform::snowflake")]
    pub guild_id: GuildId,
    #[serde(with = "crate::platform::snowflake")]
    pub user_id: UserId,
    pub command: Command,
}

/// User-visible reply to a command. Never carries internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    ChannelCreated,
    UserKicked,
    InternalError,
    UnableToCreateChannel,
    NotChannelOwner,
    NoActionTaken,
    InvalidLimit,
}

impl CommandReply {
    pub fn message(self) -> &'static str {
        match self {
            Self::ChannelCreated => "channel created",
            Self::UserKicked => "user kicked",
            Self::InternalError => "internal error",
            Self::UnableToCreateChannel => "unable to create channel",
            Self::NotChannelOwner => "you do not own a channel",
            Self::NoActionTaken => "no action taken",
            Self::InvalidLimit => "limit must be between 0 and 100",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::ChannelCreated | Self::UserKicked)
    }
}

/// Everything the transport hands to the reconciler.
#[derive(Debug)]
pub enum InboundEvent {
    VoiceState(VoiceStateUpdate),
    Command {
        invocation: CommandInvocation,
        respond_to: oneshot::Sender<CommandReply>,
    },
}
