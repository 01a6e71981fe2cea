use crate::domain::{FeedPatch, FeedStatus, FeedSubscription, WebhookPointer};
use crate::schema::feeds;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[table_name = "feeds"]
pub struct Feed {
    pub id: Uuid,
    pub guild_id: String,
    pub title: String,
    pub url: String,
    pub channel_id: String,
    pub text: Option<String>,
    pub webhook_id: Option<String>,
    pub webhook_name: Option<String>,
    pub webhook_avatar: Option<String>,
    pub refresh_rate_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "feeds"]
pub struct NewFeed<'a> {
    pub id: &'a Uuid,
    pub guild_id: &'a str,
    pub title: &'a str,
    pub url: &'a str,
    pub channel_id: &'a str,
}

/// Column-level form of a [`FeedPatch`]. `None` columns are left out of
/// the UPDATE; `Some(None)` writes NULL.
#[derive(AsChangeset, Debug)]
#[table_name = "feeds"]
pub struct FeedChangeset {
    pub text: Option<String>,
    pub webhook_id: Option<Option<String>>,
    pub webhook_name: Option<Option<String>>,
    pub webhook_avatar: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

impl FeedChangeset {
    pub fn from_patch(patch: &FeedPatch, now: DateTime<Utc>) -> Self {
        let (webhook_id, webhook_name, webhook_avatar) = match &patch.webhook {
            None => (None, None, None),
            Some(webhook) if webhook.removes_webhook() => (Some(None), Some(None), Some(None)),
            Some(webhook) => (
                Some(Some(webhook.id.clone())),
                webhook.name.clone().map(Some),
                webhook.avatar.clone().map(Some),
            ),
        };
        Self {
            text: patch.text.clone(),
            webhook_id,
            webhook_name,
            webhook_avatar,
            updated_at: now,
        }
    }
}

impl Feed {
    pub fn into_subscription(
        self,
        status: FeedStatus,
        default_refresh_rate_seconds: u32,
    ) -> FeedSubscription {
        let webhook = self.webhook_id.map(|id| WebhookPointer {
            id,
            name: self.webhook_name,
            avatar: self.webhook_avatar,
        });
        let refresh_rate_seconds = self
            .refresh_rate_seconds
            .and_then(|seconds| u32::try_from(seconds).ok())
            .unwrap_or(default_refresh_rate_seconds);
        FeedSubscription {
            id: self.id,
            guild_id: self.guild_id,
            title: self.title,
            url: self.url,
            channel_id: self.channel_id,
            text: self.text,
            webhook,
            status,
            refresh_rate_seconds,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
