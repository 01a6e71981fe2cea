use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Failures older than this no longer mark a feed as failed.
pub const FAILURE_DECAY_HOURS: i64 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Ok,
    Failed,
}

impl FeedStatus {
    pub fn derive(failed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match failed_at {
            Some(failed_at) if now - failed_at < Duration::hours(FAILURE_DECAY_HOURS) => {
                FeedStatus::Failed
            }
            _ => FeedStatus::Ok,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPointer {
    pub id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// A polled feed as seen by callers, with its derived status attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSubscription {
    pub id: Uuid,
    pub guild_id: String,
    pub title: String,
    pub url: String,
    pub channel_id: String,
    pub text: Option<String>,
    pub webhook: Option<WebhookPointer>,
    pub status: FeedStatus,
    pub refresh_rate_seconds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Equality filters, AND'ed together. `None` does not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub ids: Option<Vec<Uuid>>,
}

impl FeedFilter {
    pub fn for_guild(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: Some(guild_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
}

impl FindOptions {
    /// Negative values are treated as zero.
    pub fn offset(&self) -> i64 {
        self.skip.max(0)
    }

    pub fn page_size(&self) -> i64 {
        self.limit.max(0)
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10,
            search: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPatch {
    pub text: Option<String>,
    pub webhook: Option<WebhookPointerPatch>,
}

/// An empty `id` removes the feed's webhook pointer altogether.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookPointerPatch {
    pub id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl WebhookPointerPatch {
    pub fn removes_webhook(&self) -> bool {
        self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub reason: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub alerted: bool,
}
