use dashmap::DashMap;

use crate::db::models::{ChannelId, GuildId, UserId};

use super::VoiceState;

/// Last observed voice location of every member, fed by presence events.
///
/// This is the guild membership snapshot the platform client serves; it is
/// updated before an event is classified so the snapshot never lags the engine.
#[derive(Debug, Default)]
pub struct VoiceStateCache {
    locations: DashMap<(GuildId, UserId), ChannelId>,
}

impl VoiceStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where a member is now. `None` means they left voice.
    pub fn apply(&self, guild_id: GuildId, user_id: UserId, channel_id: Option<ChannelId>) {
        match channel_id {
            Some(channel_id) => {
                self.locations.insert((guild_id, user_id), channel_id);
            }
            None => {
                self.locations.remove(&(guild_id, user_id));
            }
        }
    }

    pub fn channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.locations.get(&(guild_id, user_id)).map(|c| *c)
    }

    pub fn snapshot(&self, guild_id: GuildId) -> Vec<VoiceState> {
        let mut states: Vec<VoiceState> = self
            .locations
            .iter()
            .filter(|entry| entry.key().0 == guild_id)
            .map(|entry| VoiceState {
                user_id: entry.key().1,
                channel_id: *entry.value(),
            })
            .collect();
        states.sort_by_key(|s| s.user_id);
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_and_leave() {
        let cache = VoiceStateCache::new();
        cache.apply(1, 10, Some(100));
        assert_eq!(cache.channel_of(1, 10), Some(100));

        cache.apply(1, 10, Some(101));
        assert_eq!(cache.channel_of(1, 10), Some(101));

        cache.apply(1, 10, None);
        assert_eq!(cache.channel_of(1, 10), None);
    }

    #[test]
    fn test_snapshot_is_per_guild() {
        let cache = VoiceStateCache::new();
        cache.apply(1, 11, Some(100));
        cache.apply(1, 10, Some(100));
        cache.apply(2, 12, Some(200));

        let snapshot = cache.snapshot(1);
        assert_eq!(
            snapshot,
            vec![
                VoiceState {
                    user_id: 10,
                    channel_id: 100
                },
                VoiceState {
                    user_id: 11,
                    channel_id: 100
                },
            ]
        );
        assert_eq!(cache.snapshot(2).len(), 1);
    }
}
