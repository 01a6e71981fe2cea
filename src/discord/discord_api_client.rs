use crate::configuration::DiscordSettings;
use crate::discord::{
    is_snowflake, ActorToken, Channel, ChatApiError, ChatPlatform, GroupAuthorizer, PartialGuild,
    Webhook,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use secrecy::Secret;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct DiscordApiClient {
    http_client: reqwest::Client,
    base_url: String,
    bot_token: ActorToken,
}

impl DiscordApiClient {
    pub fn new(
        base_url: String,
        bot_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build the Discord HTTP client.")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: ActorToken::Bot(bot_token),
        })
    }

    pub fn from_settings(settings: &DiscordSettings) -> Result<Self, anyhow::Error> {
        Self::new(
            settings.api_base_url.clone(),
            settings.bot_token.clone(),
            settings.timeout(),
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &ActorToken,
    ) -> Result<T, ChatApiError> {
        let response = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, token.authorization())
            .send()
            .await
            .with_context(|| format!("Failed to reach the Discord API at {}.", path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, %body, path, "Discord API request was refused");
            return Err(ChatApiError::Status { status, body });
        }

        let body = response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode the Discord API response for {}.", path))?;
        Ok(body)
    }
}

fn snowflake(id: &str) -> Result<&str, ChatApiError> {
    if is_snowflake(id) {
        Ok(id)
    } else {
        Err(ChatApiError::MalformedId { id: id.to_string() })
    }
}

#[async_trait]
impl ChatPlatform for DiscordApiClient {
    #[tracing::instrument(name = "Fetch Discord channel", skip(self, actor_token))]
    async fn get_channel(
        &self,
        actor_token: &ActorToken,
        channel_id: &str,
    ) -> Result<Channel, ChatApiError> {
        let channel_id = snowflake(channel_id)?;
        self.get_json(&format!("/channels/{}", channel_id), actor_token)
            .await
    }

    #[tracing::instrument(name = "Fetch Discord webhook", skip(self))]
    async fn get_webhook(&self, webhook_id: &str) -> Result<Webhook, ChatApiError> {
        let webhook_id = snowflake(webhook_id)?;
        self.get_json(&format!("/webhooks/{}", webhook_id), &self.bot_token)
            .await
    }
}

#[async_trait]
impl GroupAuthorizer for DiscordApiClient {
    #[tracing::instrument(name = "Check actor manages guild", skip(self, actor_token))]
    async fn actor_manages_group(
        &self,
        actor_token: &ActorToken,
        group_id: &str,
    ) -> Result<bool, ChatApiError> {
        let guilds: Vec<PartialGuild> = self.get_json("/users/@me/guilds", actor_token).await?;
        Ok(guilds
            .iter()
            .any(|guild| guild.id == group_id && guild.is_managed()))
    }
}
