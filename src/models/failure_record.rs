use crate::domain::FailureRecord;
use crate::schema::failure_records;
use chrono::{DateTime, Utc};

#[derive(Queryable, Debug, Clone)]
pub struct FailureRecordRow {
    pub url: String,
    pub reason: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub alerted: bool,
}

#[derive(Insertable)]
#[table_name = "failure_records"]
pub struct NewFailureRecord<'a> {
    pub url: &'a str,
    pub reason: Option<&'a str>,
    pub failed_at: &'a DateTime<Utc>,
    pub alerted: bool,
}

impl From<FailureRecordRow> for FailureRecord {
    fn from(row: FailureRecordRow) -> Self {
        FailureRecord {
            url: row.url,
            reason: row.reason,
            failed_at: row.failed_at,
            alerted: row.alerted,
        }
    }
}
