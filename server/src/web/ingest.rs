use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::engine::events::{CommandInvocation, InboundEvent, VoiceStateUpdate};

use super::app_state::AppState;
use super::auth_middleware::IngestAuth;

/// Interaction response body. Replies are only shown to the invoker.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub content: &'static str,
    pub ephemeral: bool,
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /events/voice-state
pub async fn voice_state(
    State(state): State<Arc<AppState>>,
    _auth: IngestAuth,
    Json(update): Json<VoiceStateUpdate>,
) -> impl IntoResponse {
    debug!(
        guild_id = update.guild_id,
        user_id = update.user_id,
        channel_id = ?update.channel_id,
        "voice state received"
    );
    match state.events.send(InboundEvent::VoiceState(update)).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            warn!("reconciler not accepting events, rejecting voice state");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// POST /commands
pub async fn command(
    State(state): State<Arc<AppState>>,
    _auth: IngestAuth,
    Json(invocation): Json<CommandInvocation>,
) -> impl IntoResponse {
    let name = invocation.command.name();
    let (respond_to, reply) = oneshot::channel();
    let event = InboundEvent::Command {
        invocation,
        respond_to,
    };

    if state.events.send(event).await.is_err() {
        warn!(command = name, "reconciler not accepting events, rejecting command");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    match reply.await {
        Ok(reply) => Json(CommandResponse {
            content: reply.message(),
            ephemeral: true,
        })
        .into_response(),
        Err(_) => {
            warn!(command = name, "command dropped before a reply was produced");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
