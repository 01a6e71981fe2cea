use crate::db::{self, DbPool};
use crate::domain::{DeliveryOutcome, DeliveryRecord, DeliveryStatus, DeliveryWindow};
use crate::models::{DeliveryRecordRow, NewDeliveryRecord};
use crate::schema::delivery_records;
use anyhow::Context;
use diesel::prelude::*;
use uuid::Uuid;

/// Append-only log of delivery attempts, written by the delivery pipeline.
///
/// Answers volume questions only; throttling policy belongs to the caller.
#[derive(Clone)]
pub struct DeliveryAccounting {
    pool: DbPool,
}

impl DeliveryAccounting {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(
        name = "Recording a delivery attempt",
        skip(self, outcome),
        fields(status = outcome.status().as_str())
    )]
    pub async fn record(
        &self,
        feed_id: Uuid,
        outcome: DeliveryOutcome,
    ) -> Result<DeliveryRecord, anyhow::Error> {
        let id = Uuid::new_v4();
        let created_at = db::current_time();
        let row = self
            .pool
            .run(move |conn| {
                diesel::insert_into(delivery_records::table)
                    .values(NewDeliveryRecord::new(&id, &feed_id, &outcome, &created_at))
                    .get_result::<DeliveryRecordRow>(conn)
            })
            .await?
            .context("Failed to insert the delivery record.")?;

        DeliveryRecord::try_from(row)
    }

    /// Sent and rejected deliveries created within `[now - window_seconds, now]`.
    #[tracing::instrument(name = "Counting recent deliveries", skip(self))]
    pub async fn count_recent(
        &self,
        feed_id: Uuid,
        window_seconds: u32,
    ) -> Result<i64, anyhow::Error> {
        let window = DeliveryWindow::ending_at(db::current_time(), window_seconds);
        let statuses: Vec<&'static str> = [
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
            DeliveryStatus::Rejected,
        ]
        .iter()
        .filter(|status| status.counts_toward_volume())
        .map(DeliveryStatus::as_str)
        .collect();

        let count = self
            .pool
            .run(move |conn| {
                delivery_records::table
                    .filter(delivery_records::feed_id.eq(feed_id))
                    .filter(delivery_records::status.eq_any(statuses))
                    .filter(delivery_records::created_at.between(window.start, window.end))
                    .count()
                    .get_result::<i64>(conn)
            })
            .await?
            .context("Failed to count recent deliveries.")?;
        Ok(count)
    }

    /// Newest first. Negative paging values are treated as zero.
    #[tracing::instrument(name = "Loading delivery history", skip(self))]
    pub async fn history(
        &self,
        feed_id: Uuid,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryRecord>, anyhow::Error> {
        let rows = self
            .pool
            .run(move |conn| {
                delivery_records::table
                    .filter(delivery_records::feed_id.eq(feed_id))
                    .order((
                        delivery_records::created_at.desc(),
                        delivery_records::id.asc(),
                    ))
                    .offset(skip.max(0))
                    .limit(limit.max(0))
                    .load::<DeliveryRecordRow>(conn)
            })
            .await?
            .context("Failed to load the delivery history.")?;

        rows.into_iter().map(DeliveryRecord::try_from).collect()
    }
}
