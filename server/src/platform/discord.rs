use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::models::{ChannelId, GuildId, UserId};
use crate::error::PlatformError;

use super::{ChannelSpec, Platform, VoiceState, VoiceStateCache};

/// REST client for the platform API, authenticated with a bot token.
///
/// Voice membership is not queryable over REST in bulk, so `voice_states` is
/// answered from the shared [`VoiceStateCache`] fed by the event transport.
pub struct DiscordClient {
    http: Client,
    api_base: String,
    token: String,
    voice_states: Arc<VoiceStateCache>,
}

#[derive(Serialize)]
struct CreateChannelBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_limit: Option<u32>,
}

#[derive(Deserialize)]
struct CreatedChannel {
    #[serde(with = "super::snowflake")]
    id: ChannelId,
}

#[derive(Serialize)]
struct MoveMemberBody {
    #[serde(with = "super::snowflake::option")]
    channel_id: Option<ChannelId>,
}

impl DiscordClient {
    pub fn new(
        api_base: &str,
        token: &str,
        timeout: Duration,
        voice_states: Arc<VoiceStateCache>,
    ) -> Result<Self, PlatformError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            voice_states,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }
}

/// Map non-success statuses into errors. 404 means the object is gone.
async fn check(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(PlatformError::NotFound);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PlatformError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Platform for DiscordClient {
    async fn create_channel(
        &self,
        guild_id: GuildId,
        spec: &ChannelSpec,
    ) -> Result<ChannelId, PlatformError> {
        let body = CreateChannelBody {
            name: &spec.name,
            kind: spec.kind.wire_type(),
            user_limit: spec.user_limit,
        };
        let response = self
            .http
            .post(self.url(&format!("/guilds/{guild_id}/channels")))
            .header("Authorization", self.authorization())
            .json(&body)
            .send()
            .await?;
        let created: CreatedChannel = check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        debug!(%guild_id, channel_id = created.id, name = %spec.name, "platform channel created");
        Ok(created.id)
    }

    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> Result<(), PlatformError> {
        let response = self
            .http
            .patch(self.url(&format!("/guilds/{guild_id}/members/{user_id}")))
            .header("Authorization", self.authorization())
            .json(&MoveMemberBody { channel_id: target })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), PlatformError> {
        let response = self
            .http
            .delete(self.url(&format!("/channels/{channel_id}")))
            .header("Authorization", self.authorization())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn voice_states(&self, guild_id: GuildId) -> Result<Vec<VoiceState>, PlatformError> {
        Ok(self.voice_states.snapshot(guild_id))
    }
}
