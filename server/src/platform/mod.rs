//! Boundary to the external voice/chat platform.
//!
//! The engine only depends on the [`Platform`] trait. [`discord::DiscordClient`]
//! implements it over the REST API; tests use an in-memory recorder.

pub mod discord;
pub mod snowflake;
pub mod voice_states;

#[cfg(test)]
pub mod recording;

use async_trait::async_trait;

use crate::db::models::{ChannelId, GuildId, UserId};
use crate::error::PlatformError;

pub use voice_states::VoiceStateCache;

/// The kind of channel to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
}

impl ChannelKind {
    /// Channel type number on the wire.
    pub fn wire_type(self) -> u8 {
        match self {
            Self::Voice => 2,
        }
    }
}

/// What to create on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub kind: ChannelKind,
    /// Maximum occupants. `None` means unlimited.
    pub user_limit: Option<u32>,
}

impl ChannelSpec {
    pub fn voice(name: impl Into<String>, user_limit: Option<u32>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Voice,
            user_limit,
        }
    }
}

/// A member's current voice location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceState {
    pub user_id: UserId,
    pub channel_id: ChannelId,
}

/// Operations the engine consumes from the platform. Every call is fallible and
/// never retried by the caller.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a channel in the guild and return its external id.
    async fn create_channel(
        &self,
        guild_id: GuildId,
        spec: &ChannelSpec,
    ) -> Result<ChannelId, PlatformError>;

    /// Move a member to `target`, or disconnect them from voice when `target` is `None`.
    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> Result<(), PlatformError>;

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError>;

    /// Current voice membership snapshot of the guild.
    async fn voice_states(&self, guild_id: GuildId) -> Result<Vec<VoiceState>, PlatformError>;
}
