use crate::db::{self, DbPool};
use crate::domain::{
    FailureRecord, FeedFilter, FeedPatch, FeedStatus, FeedSubscription, FindOptions,
};
use crate::error::{error_chain_fmt, ErrorKind};
use crate::models::{Feed, FeedChangeset, FailureRecordRow, NewFailureRecord};
use crate::schema::{failure_records, feeds};
use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::pg::upsert::excluded;
use diesel::pg::Pg;
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(thiserror::Error)]
pub enum FeedError {
    #[error("Feed {0} does not exist.")]
    NotExists(Uuid),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::NotExists(_) => ErrorKind::NotExists,
            FeedError::UnexpectedError(_) => ErrorKind::Unexpected,
        }
    }
}

/// Query and update feed subscriptions. Status is never stored: it is
/// derived from `failure_records` on every read.
#[derive(Clone)]
pub struct FeedService {
    pool: DbPool,
    default_refresh_rate_seconds: u32,
}

fn filtered(filter: &FeedFilter, search: Option<&str>) -> feeds::BoxedQuery<'static, Pg> {
    let mut query = feeds::table.into_boxed();
    if let Some(guild_id) = &filter.guild_id {
        query = query.filter(feeds::guild_id.eq(guild_id.clone()));
    }
    if let Some(channel_id) = &filter.channel_id {
        query = query.filter(feeds::channel_id.eq(channel_id.clone()));
    }
    if let Some(ids) = &filter.ids {
        query = query.filter(feeds::id.eq_any(ids.clone()));
    }
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        let pattern = db::like_pattern(search);
        query = query.filter(
            feeds::url
                .ilike(pattern.clone())
                .or(feeds::title.ilike(pattern)),
        );
    }
    query
}

fn failures_for(
    conn: &PgConnection,
    urls: Vec<String>,
) -> QueryResult<HashMap<String, DateTime<Utc>>> {
    let rows = failure_records::table
        .filter(failure_records::url.eq_any(urls))
        .select((failure_records::url, failure_records::failed_at))
        .load::<(String, DateTime<Utc>)>(conn)?;
    Ok(rows.into_iter().collect())
}

impl FeedService {
    pub fn new(pool: DbPool, default_refresh_rate_seconds: u32) -> Self {
        Self {
            pool,
            default_refresh_rate_seconds,
        }
    }

    fn annotate(
        &self,
        feed: Feed,
        failures: &HashMap<String, DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> FeedSubscription {
        let status = FeedStatus::derive(failures.get(&feed.url).copied(), now);
        feed.into_subscription(status, self.default_refresh_rate_seconds)
    }

    #[tracing::instrument(name = "Finding feeds", skip(self))]
    pub async fn find_many(
        &self,
        filter: FeedFilter,
        options: FindOptions,
    ) -> Result<Vec<FeedSubscription>, FeedError> {
        let (rows, failures) = self
            .pool
            .run(move |conn| -> QueryResult<_> {
                let rows = filtered(&filter, options.search.as_deref())
                    .order((feeds::created_at.desc(), feeds::id.asc()))
                    .offset(options.offset())
                    .limit(options.page_size())
                    .load::<Feed>(conn)?;
                let failures =
                    failures_for(conn, rows.iter().map(|feed| feed.url.clone()).collect())?;
                Ok((rows, failures))
            })
            .await?
            .context("Failed to query feeds.")?;

        let now = db::current_time();
        Ok(rows
            .into_iter()
            .map(|feed| self.annotate(feed, &failures, now))
            .collect())
    }

    #[tracing::instrument(name = "Counting feeds", skip(self))]
    pub async fn count_many(
        &self,
        filter: FeedFilter,
        search: Option<String>,
    ) -> Result<i64, FeedError> {
        let count = self
            .pool
            .run(move |conn| {
                filtered(&filter, search.as_deref())
                    .count()
                    .get_result::<i64>(conn)
            })
            .await?
            .context("Failed to count feeds.")?;
        Ok(count)
    }

    #[tracing::instrument(name = "Finding a feed", skip(self))]
    pub async fn find_one(&self, id: Uuid) -> Result<Option<FeedSubscription>, FeedError> {
        let found = self
            .pool
            .run(move |conn| -> QueryResult<_> {
                let feed = feeds::table.find(id).first::<Feed>(conn).optional()?;
                match feed {
                    Some(feed) => {
                        let failures = failures_for(conn, vec![feed.url.clone()])?;
                        Ok(Some((feed, failures)))
                    }
                    None => Ok(None),
                }
            })
            .await?
            .context("Failed to look up the feed.")?;

        let now = db::current_time();
        Ok(found.map(|(feed, failures)| self.annotate(feed, &failures, now)))
    }

    /// `None` when no feed has this id.
    #[tracing::instrument(name = "Updating a feed", skip(self, patch))]
    pub async fn update_one(
        &self,
        id: Uuid,
        patch: FeedPatch,
    ) -> Result<Option<FeedSubscription>, FeedError> {
        let changeset = FeedChangeset::from_patch(&patch, db::current_time());
        let updated = self
            .pool
            .run(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|| {
                    let feed = diesel::update(feeds::table.find(id))
                        .set(&changeset)
                        .get_result::<Feed>(conn)
                        .optional()?;
                    match feed {
                        Some(feed) => {
                            let failures = failures_for(conn, vec![feed.url.clone()])?;
                            Ok(Some((feed, failures)))
                        }
                        None => Ok(None),
                    }
                })
            })
            .await?
            .context("Failed to update the feed.")?;

        let now = db::current_time();
        Ok(updated.map(|(feed, failures)| self.annotate(feed, &failures, now)))
    }

    /// Forget the feed's last failure so it is reported as healthy again.
    #[tracing::instrument(name = "Refreshing a feed", skip(self))]
    pub async fn refresh(&self, id: Uuid) -> Result<FeedSubscription, FeedError> {
        let feed = self
            .pool
            .run(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|| {
                    let feed = feeds::table.find(id).first::<Feed>(conn).optional()?;
                    if let Some(feed) = &feed {
                        diesel::delete(
                            failure_records::table.filter(failure_records::url.eq(&feed.url)),
                        )
                        .execute(conn)?;
                    }
                    Ok(feed)
                })
            })
            .await?
            .context("Failed to refresh the feed.")?
            .ok_or(FeedError::NotExists(id))?;

        Ok(feed.into_subscription(FeedStatus::Ok, self.default_refresh_rate_seconds))
    }

    /// Upsert the failure for `url`, resetting the alert flag.
    #[tracing::instrument(name = "Recording a feed failure", skip(self))]
    pub async fn record_failure(
        &self,
        url: String,
        reason: Option<String>,
    ) -> Result<FailureRecord, FeedError> {
        let failed_at = db::current_time();
        let row = self
            .pool
            .run(move |conn| {
                diesel::insert_into(failure_records::table)
                    .values(NewFailureRecord {
                        url: &url,
                        reason: reason.as_deref(),
                        failed_at: &failed_at,
                        alerted: false,
                    })
                    .on_conflict(failure_records::url)
                    .do_update()
                    .set((
                        failure_records::reason.eq(excluded(failure_records::reason)),
                        failure_records::failed_at.eq(excluded(failure_records::failed_at)),
                        failure_records::alerted.eq(false),
                    ))
                    .get_result::<FailureRecordRow>(conn)
            })
            .await?
            .context("Failed to record the feed failure.")?;
        Ok(row.into())
    }

    /// Returns whether a failure record existed for `url`.
    #[tracing::instrument(name = "Marking a feed failure as alerted", skip(self))]
    pub async fn mark_failure_alerted(&self, url: String) -> Result<bool, FeedError> {
        let updated = self
            .pool
            .run(move |conn| {
                diesel::update(failure_records::table.find(url))
                    .set(failure_records::alerted.eq(true))
                    .execute(conn)
            })
            .await?
            .context("Failed to mark the feed failure as alerted.")?;
        Ok(updated > 0)
    }
}
