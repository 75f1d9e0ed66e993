use serde::{Deserialize, Serialize};

/// External platform identifiers (snowflakes) fit in a signed 64-bit column.
pub type GuildId = i64;
pub type ChannelId = i64;
pub type UserId = i64;

/// A guild (community space) that has used the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GuildRow {
    pub id: i64,
    /// External guild id.
    pub guild_id: GuildId,
    pub created_at: String,
}

/// A channel that provisions a temporary voice channel when joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreatorChannelRow {
    pub id: i64,
    /// Internal id of the owning guild (`guilds.id`).
    pub guild_id: i64,
    /// External channel id.
    pub channel_id: ChannelId,
    /// Occupancy cap applied to provisioned channels. 0 means unlimited.
    pub user_limit: i64,
    pub created_at: String,
}

impl CreatorChannelRow {
    pub fn occupancy_cap(&self) -> Option<u32> {
        u32::try_from(self.user_limit).ok().filter(|cap| *cap > 0)
    }
}

/// An ephemeral voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TemporaryChannelRow {
    pub id: i64,
    /// Internal id of the owning guild (`guilds.id`).
    pub guild_id: i64,
    /// External channel id.
    pub channel_id: ChannelId,
    pub user_count: i64,
    /// External id of the user whose join provisioned the channel. Never reassigned.
    pub owner_id: UserId,
    pub created_at: String,
}

// ── Filters ─────────────────────────────────────────────────────────
//
// A `None` field is not filtered on. `limit` caps the number of rows returned.

#[derive(Debug, Clone, Copy, Default)]
pub struct GuildFilter {
    pub id: Option<i64>,
    pub guild_id: Option<GuildId>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreatorChannelFilter {
    pub id: Option<i64>,
    pub guild_id: Option<i64>,
    pub channel_id: Option<ChannelId>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemporaryChannelFilter {
    pub id: Option<i64>,
    pub guild_id: Option<i64>,
    pub channel_id: Option<ChannelId>,
    pub owner_id: Option<UserId>,
    pub user_count: Option<i64>,
    pub limit: Option<i64>,
}

// ── Creation params ─────────────────────────────────────────────────

pub struct CreateCreatorChannelParams {
    pub guild_id: i64,
    pub channel_id: ChannelId,
    pub user_limit: i64,
}

pub struct CreateTemporaryChannelParams {
    pub guild_id: i64,
    pub channel_id: ChannelId,
    pub user_count: i64,
    pub owner_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator(user_limit: i64) -> CreatorChannelRow {
        CreatorChannelRow {
            id: 1,
            guild_id: 1,
            channel_id: 100,
            user_limit,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_occupancy_cap() {
        assert_eq!(creator(0).occupancy_cap(), None);
        assert_eq!(creator(2).occupancy_cap(), Some(2));
        assert_eq!(creator(-1).occupancy_cap(), None);
    }
}
