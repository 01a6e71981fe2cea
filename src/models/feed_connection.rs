use crate::domain::{
    ChannelRef, Connection, ConnectionDetails, ConnectionFilters, ConnectionKind,
    ConnectionPatch, NewConnection, WebhookRef,
};
use crate::schema::feed_connections;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Queryable, Identifiable, Debug, Clone)]
#[table_name = "feed_connections"]
pub struct FeedConnection {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub kind: String,
    pub name: String,
    pub filters: Option<Value>,
    pub channel_id: Option<String>,
    pub webhook_id: Option<String>,
    pub webhook_token: Option<String>,
    pub webhook_name: Option<String>,
    pub webhook_icon_url: Option<String>,
    pub content: Option<String>,
    pub embeds: Value,
    pub formatter: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[table_name = "feed_connections"]
pub struct NewFeedConnection {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub kind: String,
    pub name: String,
    pub filters: Option<Value>,
    pub channel_id: Option<String>,
    pub webhook_id: Option<String>,
    pub webhook_token: Option<String>,
    pub webhook_name: Option<String>,
    pub webhook_icon_url: Option<String>,
    pub content: Option<String>,
    pub embeds: Value,
    pub formatter: Value,
    pub created_at: DateTime<Utc>,
}

/// Flattened, column-level form of a [`ConnectionPatch`].
#[derive(AsChangeset, Debug, Default, PartialEq)]
#[table_name = "feed_connections"]
pub struct FeedConnectionChangeset {
    pub name: Option<String>,
    pub filters: Option<Option<Value>>,
    pub channel_id: Option<Option<String>>,
    pub webhook_id: Option<Option<String>>,
    pub webhook_token: Option<Option<String>>,
    pub webhook_name: Option<Option<String>>,
    pub webhook_icon_url: Option<Option<String>>,
    pub content: Option<Option<String>>,
    pub embeds: Option<Value>,
    pub formatter: Option<Value>,
}

impl NewFeedConnection {
    pub fn new(
        feed_id: Uuid,
        connection: &NewConnection,
        created_at: DateTime<Utc>,
    ) -> Result<Self, anyhow::Error> {
        let details = &connection.details;
        let webhook = details.webhook.as_ref();
        Ok(Self {
            id: connection.id,
            feed_id,
            kind: connection.kind.as_str().to_string(),
            name: connection.name.as_ref().to_string(),
            filters: connection
                .filters
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .context("Failed to serialise connection filters.")?,
            channel_id: details.channel.as_ref().map(|c| c.id.clone()),
            webhook_id: webhook.map(|w| w.id.clone()),
            webhook_token: webhook.map(|w| w.token.clone()),
            webhook_name: webhook.and_then(|w| w.name.clone()),
            webhook_icon_url: webhook.and_then(|w| w.icon_url.clone()),
            content: details.content.clone(),
            embeds: serde_json::to_value(&details.embeds)
                .context("Failed to serialise connection embeds.")?,
            formatter: serde_json::to_value(&details.formatter)
                .context("Failed to serialise connection formatter options.")?,
            created_at,
        })
    }
}

impl FeedConnectionChangeset {
    pub fn from_patch(patch: &ConnectionPatch) -> Result<Self, anyhow::Error> {
        let mut changeset = FeedConnectionChangeset {
            name: patch.name.as_ref().map(|name| name.as_ref().to_string()),
            filters: match &patch.filters {
                None => None,
                Some(None) => Some(None),
                Some(Some(filters)) => Some(Some(
                    serde_json::to_value(filters)
                        .context("Failed to serialise connection filters.")?,
                )),
            },
            ..FeedConnectionChangeset::default()
        };

        let details = match &patch.details {
            Some(details) => details,
            None => return Ok(changeset),
        };
        changeset.channel_id = details.channel.as_ref().map(|c| Some(c.id.clone()));
        if let Some(webhook) = &details.webhook {
            if webhook.removes_webhook() {
                changeset.webhook_id = Some(None);
                changeset.webhook_token = Some(None);
                changeset.webhook_name = Some(None);
                changeset.webhook_icon_url = Some(None);
            } else {
                changeset.webhook_id = Some(Some(webhook.id.clone()));
                changeset.webhook_token = webhook.token.clone().map(Some);
                changeset.webhook_name = webhook.name.clone().map(Some);
                changeset.webhook_icon_url = webhook.icon_url.clone().map(Some);
            }
        }
        changeset.content = details.content.clone();
        changeset.embeds = details
            .embeds
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .context("Failed to serialise connection embeds.")?;
        changeset.formatter = details
            .formatter
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .context("Failed to serialise connection formatter options.")?;
        Ok(changeset)
    }

    /// Diesel refuses to run an UPDATE without any assignment.
    pub fn is_empty(&self) -> bool {
        self == &FeedConnectionChangeset::default()
    }
}

impl TryFrom<FeedConnection> for Connection {
    type Error = anyhow::Error;

    fn try_from(row: FeedConnection) -> Result<Self, Self::Error> {
        let kind = ConnectionKind::try_from(row.kind.as_str()).map_err(|e| anyhow!(e))?;
        let filters = row
            .filters
            .map(serde_json::from_value::<ConnectionFilters>)
            .transpose()
            .with_context(|| format!("Connection {} has malformed filters.", row.id))?;
        let embeds = serde_json::from_value(row.embeds)
            .with_context(|| format!("Connection {} has malformed embeds.", row.id))?;
        let formatter = serde_json::from_value(row.formatter)
            .with_context(|| format!("Connection {} has malformed formatter options.", row.id))?;
        let webhook = row.webhook_id.map(|id| WebhookRef {
            id,
            token: row.webhook_token.unwrap_or_default(),
            name: row.webhook_name,
            icon_url: row.webhook_icon_url,
        });

        Ok(Connection {
            id: row.id,
            feed_id: row.feed_id,
            kind,
            name: row.name,
            filters,
            details: ConnectionDetails {
                channel: row.channel_id.map(|id| ChannelRef { id }),
                webhook,
                content: row.content,
                embeds,
                formatter,
            },
            created_at: row.created_at,
        })
    }
}
