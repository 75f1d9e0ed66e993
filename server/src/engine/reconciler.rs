//! Front door for inbound events.
//!
//! Presence updates are classified and scheduled onto the per-channel
//! sequencer in arrival order. Commands run concurrently with them. The loop
//! stops taking events on shutdown and lets in-flight work finish.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ChannelsSection;
use crate::platform::{Platform, VoiceStateCache};

use super::classifier::{PresenceStep, classify};
use super::commands::CommandHandlers;
use super::events::{CommandInvocation, CommandReply, InboundEvent, VoiceStateUpdate};
use super::lifecycle::ChannelLifecycle;
use super::sequencer::ChannelSequencer;

pub struct Reconciler {
    lifecycle: ChannelLifecycle,
    commands: CommandHandlers,
    sequencer: Arc<ChannelSequencer>,
    voice_states: Arc<VoiceStateCache>,
}

impl Reconciler {
    pub fn new(
        pool: SqlitePool,
        platform: Arc<dyn Platform>,
        voice_states: Arc<VoiceStateCache>,
        naming: ChannelsSection,
    ) -> Self {
        let sequencer = Arc::new(ChannelSequencer::new());
        Self {
            lifecycle: ChannelLifecycle::new(pool.clone(), platform.clone(), naming.clone()),
            commands: CommandHandlers::new(pool, platform, naming, sequencer.clone()),
            sequencer,
            voice_states,
        }
    }

    /// Record the update and reserve its place on every affected channel.
    ///
    /// Returns `None` when the update changes no occupancy. The returned future
    /// may be polled on any task; ordering was fixed when this call returned.
    /// It holds its place on each channel until it completes or is dropped, so
    /// it must be driven or dropped promptly: an idle future stalls every later
    /// event for those channels.
    pub fn schedule_voice_state(
        self: &Arc<Self>,
        update: VoiceStateUpdate,
    ) -> Option<BoxFuture<'static, ()>> {
        self.voice_states
            .apply(update.guild_id, update.user_id, update.channel_id);

        let Some(change) = classify(&update) else {
            debug!(
                guild_id = update.guild_id,
                user_id = update.user_id,
                "voice state update without occupancy change"
            );
            return None;
        };

        let steps: Vec<_> = change
            .steps()
            .into_iter()
            .map(|step| (step, self.sequencer.reserve(step.channel_id())))
            .collect();

        let this = Arc::clone(self);
        Some(Box::pin(async move {
            for (step, mut slot) in steps {
                slot.acquire().await;
                this.apply_step(&update, step).await;
                drop(slot);
            }
        }))
    }

    async fn apply_step(&self, update: &VoiceStateUpdate, step: PresenceStep) {
        let result = match step {
            PresenceStep::Join(channel_id) => self
                .lifecycle
                .join(update, channel_id)
                .await
                .map(|outcome| debug!(channel_id, ?outcome, "join applied")),
            PresenceStep::Leave(channel_id) => self
                .lifecycle
                .leave(update, channel_id)
                .await
                .map(|outcome| debug!(channel_id, ?outcome, "leave applied")),
        };

        if let Err(e) = result {
            warn!(
                guild_id = update.guild_id,
                user_id = update.user_id,
                channel_id = step.channel_id(),
                error_kind = e.error_kind(),
                error = %e,
                "presence event dropped"
            );
        }
    }

    pub async fn handle_command(&self, invocation: &CommandInvocation) -> CommandReply {
        self.commands.handle(invocation).await
    }

    /// Consume events until `cancel` fires or every sender is dropped, then
    /// wait for in-flight work.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<InboundEvent>,
        cancel: CancellationToken,
    ) {
        let mut tasks = JoinSet::new();
        info!("reconciler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reconciler shutting down");
                    break;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "reconciler task failed");
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("event stream closed");
                        break;
                    };
                    self.dispatch(event, &mut tasks);
                }
            }
        }

        events.close();
        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(in_flight, "waiting for in-flight events");
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "reconciler task failed");
            }
        }
        info!("reconciler stopped");
    }

    fn dispatch(self: &Arc<Self>, event: InboundEvent, tasks: &mut JoinSet<()>) {
        match event {
            InboundEvent::VoiceState(update) => {
                if let Some(work) = self.schedule_voice_state(update) {
                    tasks.spawn(work);
                }
            }
            InboundEvent::Command {
                invocation,
                respond_to,
            } => {
                let this = Arc::clone(self);
                tasks.spawn(async move {
                    let reply = this.handle_command(&invocation).await;
                    if respond_to.send(reply).is_err() {
                        debug!(command = invocation.command.name(), "command requester went away");
                    }
                });
            }
        }
    }
}
