use crate::domain::ConnectionName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Channel,
    Webhook,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Channel => "channel",
            ConnectionKind::Webhook => "webhook",
        }
    }
}

impl TryFrom<&str> for ConnectionKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "channel" => Ok(Self::Channel),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("{} is not a known connection kind.", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

/// A webhook a connection delivers through. `token` is the secret half of
/// the execute URL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRef {
    pub id: String,
    pub token: String,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

impl std::fmt::Debug for WebhookRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookRef")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .field("name", &self.name)
            .field("icon_url", &self.icon_url)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<EmbedTimestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedFooter {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Which timestamp, if any, an embed is stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedTimestamp {
    Article,
    Now,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatterOptions {
    pub date_format: Option<String>,
    pub date_timezone: Option<String>,
    pub date_locale: Option<String>,
    pub format_tables: bool,
    pub strip_images: bool,
    pub disable_image_link_previews: bool,
}

/// Filter expression evaluated by the delivery pipeline against each article.
/// The expression tree is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionFilters {
    pub expression: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionDetails {
    pub channel: Option<ChannelRef>,
    pub webhook: Option<WebhookRef>,
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub formatter: FormatterOptions,
}

/// A delivery destination attached to exactly one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub kind: ConnectionKind,
    pub name: String,
    pub filters: Option<ConnectionFilters>,
    pub details: ConnectionDetails,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewConnection {
    pub id: Uuid,
    pub kind: ConnectionKind,
    pub name: ConnectionName,
    pub filters: Option<ConnectionFilters>,
    pub details: ConnectionDetails,
}

impl NewConnection {
    pub fn channel(name: ConnectionName, channel_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ConnectionKind::Channel,
            name,
            filters: None,
            details: ConnectionDetails {
                channel: Some(ChannelRef { id: channel_id }),
                ..ConnectionDetails::default()
            },
        }
    }

    pub fn webhook(name: ConnectionName, webhook: WebhookRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ConnectionKind::Webhook,
            name,
            filters: None,
            details: ConnectionDetails {
                webhook: Some(webhook),
                ..ConnectionDetails::default()
            },
        }
    }
}

/// Partial update of a connection.
///
/// `None` leaves a field untouched. Nullable fields are doubly optional:
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionPatch {
    pub name: Option<ConnectionName>,
    pub filters: Option<Option<ConnectionFilters>>,
    pub details: Option<DetailsPatch>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailsPatch {
    pub channel: Option<ChannelRef>,
    pub webhook: Option<WebhookPatch>,
    pub content: Option<Option<String>>,
    pub embeds: Option<Vec<Embed>>,
    pub formatter: Option<FormatterOptions>,
}

/// An empty `id` removes the whole webhook, not just its id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookPatch {
    pub id: String,
    pub token: Option<String>,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

impl ConnectionPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.filters.is_none()
            && self.details.as_ref().map_or(true, DetailsPatch::is_empty)
    }

    /// The channel this patch moves the connection to, if any.
    pub fn new_channel(&self) -> Option<&ChannelRef> {
        self.details.as_ref()?.channel.as_ref()
    }

    /// The webhook this patch points the connection at. A patch that removes
    /// the webhook points nowhere.
    pub fn new_webhook_mut(&mut self) -> Option<&mut WebhookPatch> {
        self.details
            .as_mut()?
            .webhook
            .as_mut()
            .filter(|webhook| !webhook.removes_webhook())
    }

    pub fn apply(&self, connection: &mut Connection) {
        if let Some(name) = &self.name {
            connection.name = name.as_ref().to_string();
        }
        if let Some(filters) = &self.filters {
            connection.filters = filters.clone();
        }
        if let Some(details) = &self.details {
            details.apply(&mut connection.details);
        }
    }
}

impl DetailsPatch {
    pub fn is_empty(&self) -> bool {
        self.channel.is_none()
            && self.webhook.is_none()
            && self.content.is_none()
            && self.embeds.is_none()
            && self.formatter.is_none()
    }

    fn apply(&self, details: &mut ConnectionDetails) {
        if let Some(channel) = &self.channel {
            details.channel = Some(channel.clone());
        }
        if let Some(webhook) = &self.webhook {
            details.webhook = webhook.apply(details.webhook.take());
        }
        if let Some(content) = &self.content {
            details.content = content.clone();
        }
        if let Some(embeds) = &self.embeds {
            details.embeds = embeds.clone();
        }
        if let Some(formatter) = &self.formatter {
            details.formatter = formatter.clone();
        }
    }
}

impl WebhookPatch {
    pub fn removes_webhook(&self) -> bool {
        self.id.is_empty()
    }

    fn apply(&self, current: Option<WebhookRef>) -> Option<WebhookRef> {
        if self.removes_webhook() {
            return None;
        }
        let mut webhook = current.unwrap_or_else(|| WebhookRef {
            id: String::new(),
            token: String::new(),
            name: None,
            icon_url: None,
        });
        webhook.id = self.id.clone();
        if let Some(token) = &self.token {
            webhook.token = token.clone();
        }
        if let Some(name) = &self.name {
            webhook.name = Some(name.clone());
        }
        if let Some(icon_url) = &self.icon_url {
            webhook.icon_url = Some(icon_url.clone());
        }
        Some(webhook)
    }
}
