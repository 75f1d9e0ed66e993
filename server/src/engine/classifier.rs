use crate::db::models::ChannelId;

use super::events::VoiceStateUpdate;

/// What a presence update means for channel occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Joined { channel_id: ChannelId },
    Left { channel_id: ChannelId },
    Moved { from: ChannelId, to: ChannelId },
}

/// A single occupancy transition handed to the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStep {
    Join(ChannelId),
    Leave(ChannelId),
}

impl PresenceStep {
    pub fn channel_id(self) -> ChannelId {
        match self {
            Self::Join(id) | Self::Leave(id) => id,
        }
    }
}

impl PresenceChange {
    /// Steps to apply, in order. A move is a leave of the old channel followed
    /// by a join of the new one.
    pub fn steps(self) -> Vec<PresenceStep> {
        match self {
            Self::Joined { channel_id } => vec![PresenceStep::Join(channel_id)],
            Self::Left { channel_id } => vec![PresenceStep::Leave(channel_id)],
            Self::Moved { from, to } => vec![PresenceStep::Leave(from), PresenceStep::Join(to)],
        }
    }
}

/// Classify an update. Returns `None` when nothing changed.
///
/// Rules apply in order: left, moved, joined. `first_seen` only matters when
/// the member appears to still be where they were.
pub fn classify(update: &VoiceStateUpdate) -> Option<PresenceChange> {
    match (update.previous_channel_id, update.channel_id) {
        (Some(channel_id), None) => Some(PresenceChange::Left { channel_id }),
        (Some(from), Some(to)) if from != to => Some(PresenceChange::Moved { from, to }),
        (None, Some(channel_id)) => Some(PresenceChange::Joined { channel_id }),
        // A stale previous location on the first presence we see is still an arrival.
        (Some(_), Some(channel_id)) if update.first_seen => {
            Some(PresenceChange::Joined { channel_id })
        }
        _ => None,
    }
}
