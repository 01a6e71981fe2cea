use crate::domain::{DeliveryOutcome, DeliveryRecord, DeliveryStatus};
use crate::schema::delivery_records;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Queryable, Debug, Clone)]
pub struct DeliveryRecordRow {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub status: String,
    pub error_code: Option<String>,
    pub internal_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "delivery_records"]
pub struct NewDeliveryRecord<'a> {
    pub id: &'a Uuid,
    pub feed_id: &'a Uuid,
    pub status: &'a str,
    pub error_code: Option<&'a str>,
    pub internal_message: Option<&'a str>,
    pub created_at: &'a DateTime<Utc>,
}

impl<'a> NewDeliveryRecord<'a> {
    pub fn new(
        id: &'a Uuid,
        feed_id: &'a Uuid,
        outcome: &'a DeliveryOutcome,
        created_at: &'a DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            feed_id,
            status: outcome.status().as_str(),
            error_code: outcome.error_code(),
            internal_message: outcome.message(),
            created_at,
        }
    }
}

impl TryFrom<DeliveryRecordRow> for DeliveryRecord {
    type Error = anyhow::Error;

    fn try_from(row: DeliveryRecordRow) -> Result<Self, Self::Error> {
        let status = DeliveryStatus::try_from(row.status.as_str()).map_err(|e| anyhow!(e))?;
        let outcome = DeliveryOutcome::from_parts(status, row.error_code, row.internal_message)
            .map_err(|e| anyhow!(e))?;
        Ok(DeliveryRecord {
            id: row.id,
            feed_id: row.feed_id,
            outcome,
            created_at: row.created_at,
        })
    }
}
