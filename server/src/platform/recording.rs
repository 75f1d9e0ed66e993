//! In-memory platform used by tests: records every call and can be told to fail.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::db::models::{ChannelId, GuildId, UserId};
use crate::error::PlatformError;

use super::{ChannelSpec, Platform, VoiceState, VoiceStateCache};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Create { guild_id: GuildId, spec: ChannelSpec },
    Move { user_id: UserId, target: Option<ChannelId> },
    Delete { channel_id: ChannelId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Move,
    Delete,
}

pub struct RecordingPlatform {
    next_id: AtomicI64,
    calls: Mutex<Vec<PlatformCall>>,
    failing: Mutex<HashSet<Op>>,
    live: Mutex<BTreeMap<ChannelId, ChannelSpec>>,
    latency: Mutex<Option<Duration>>,
    /// Voice snapshot shared with the reconciler under test.
    pub voice: Arc<VoiceStateCache>,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(5000),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            live: Mutex::new(BTreeMap::new()),
            latency: Mutex::new(None),
            voice: Arc::new(VoiceStateCache::new()),
        }
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Delay every call, to force interleaving between concurrent tasks.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<ChannelSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Create { spec, .. } => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<ChannelId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Delete { channel_id } => Some(channel_id),
                _ => None,
            })
            .collect()
    }

    pub fn moves(&self) -> Vec<(UserId, Option<ChannelId>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Move { user_id, target } => Some((user_id, target)),
                _ => None,
            })
            .collect()
    }

    /// Register a channel that already exists on the platform without recording a call.
    pub fn seed_channel(&self, spec: ChannelSpec) -> ChannelId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().unwrap().insert(id, spec);
        id
    }

    pub fn is_live(&self, channel_id: ChannelId) -> bool {
        self.live.lock().unwrap().contains_key(&channel_id)
    }

    pub fn live_channels(&self) -> Vec<ChannelId> {
        self.live.lock().unwrap().keys().copied().collect()
    }

    async fn enter(&self, op: Op, call: PlatformCall) -> Result<(), PlatformError> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(PlatformError::Status {
                status: 500,
                body: format!("injected {op:?} failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn create_channel(
        &self,
        guild_id: GuildId,
        spec: &ChannelSpec,
    ) -> Result<ChannelId, PlatformError> {
        self.enter(
            Op::Create,
            PlatformCall::Create {
                guild_id,
                spec: spec.clone(),
            },
        )
        .await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().unwrap().insert(id, spec.clone());
        Ok(id)
    }

    async fn move_member(
        &self,
        _guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> Result<(), PlatformError> {
        self.enter(Op::Move, PlatformCall::Move { user_id, target })
            .await
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        self.enter(Op::Delete, PlatformCall::Delete { channel_id })
            .await?;
        match self.live.lock().unwrap().remove(&channel_id) {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound),
        }
    }

    async fn voice_states(&self, guild_id: GuildId) -> Result<Vec<VoiceState>, PlatformError> {
        Ok(self.voice.snapshot(guild_id))
    }
}
