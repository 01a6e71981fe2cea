mod discord_api_client;

use crate::error::error_chain_fmt;
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
pub use discord_api_client::DiscordApiClient;

/// Only incoming webhooks can be executed with a token.
pub const INCOMING_WEBHOOK_TYPE: u8 = 1;

pub const ADMINISTRATOR_PERMISSION: u64 = 1 << 3;
pub const MANAGE_CHANNELS_PERMISSION: u64 = 1 << 4;

/// Credential of whoever is acting: the bot itself or a user who signed in
/// through OAuth.
#[derive(Debug, Clone)]
pub enum ActorToken {
    Bot(Secret<String>),
    Bearer(Secret<String>),
}

impl ActorToken {
    pub fn authorization(&self) -> String {
        match self {
            ActorToken::Bot(token) => format!("Bot {}", token.expose_secret()),
            ActorToken::Bearer(token) => format!("Bearer {}", token.expose_secret()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Webhook {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl Webhook {
    pub fn is_incoming(&self) -> bool {
        self.kind == INCOMING_WEBHOOK_TYPE
    }
}

impl std::fmt::Debug for Webhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Webhook")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("name", &self.name)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct PartialGuild {
    pub id: String,
    #[serde(default)]
    pub owner: bool,
    #[serde(default, deserialize_with = "deserialize_number_from_string")]
    pub permissions: u64,
}

impl PartialGuild {
    pub fn is_managed(&self) -> bool {
        self.owner
            || self.permissions & ADMINISTRATOR_PERMISSION != 0
            || self.permissions & MANAGE_CHANNELS_PERMISSION != 0
    }
}

/// Discord ids are decimal snowflakes. Anything else must never reach a
/// request path.
pub fn is_snowflake(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

#[derive(thiserror::Error)]
pub enum ChatApiError {
    #[error("{id:?} is not a Discord id.")]
    MalformedId { id: String },
    #[error("Discord responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for ChatApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ChatApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ChatApiError::Status { status, .. } => Some(*status),
            ChatApiError::MalformedId { .. } | ChatApiError::UnexpectedError(_) => None,
        }
    }

    /// No resource exists under the requested id, either because Discord
    /// said so or because the id could not name one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatApiError::MalformedId { .. })
            || self.status() == Some(StatusCode::NOT_FOUND)
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn get_channel(
        &self,
        actor_token: &ActorToken,
        channel_id: &str,
    ) -> Result<Channel, ChatApiError>;

    /// Fetched with the bot's own credential.
    async fn get_webhook(&self, webhook_id: &str) -> Result<Webhook, ChatApiError>;
}

#[async_trait]
pub trait GroupAuthorizer: Send + Sync {
    async fn actor_manages_group(
        &self,
        actor_token: &ActorToken,
        group_id: &str,
    ) -> Result<bool, ChatApiError>;
}
