use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Rejected,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Rejected => "rejected",
        }
    }

    /// Whether a delivery in this status counts toward a feed's recent
    /// delivery volume. Failed attempts never reached the platform.
    pub fn counts_toward_volume(&self) -> bool {
        matches!(self, DeliveryStatus::Sent | DeliveryStatus::Rejected)
    }
}

impl TryFrom<&str> for DeliveryStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("{} is not a known delivery status.", other)),
        }
    }
}

/// What happened to one delivery attempt. Error details only exist for
/// attempts that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed { error_code: String, message: String },
    Rejected { error_code: String, message: String },
}

impl DeliveryOutcome {
    pub fn status(&self) -> DeliveryStatus {
        match self {
            DeliveryOutcome::Sent => DeliveryStatus::Sent,
            DeliveryOutcome::Failed { .. } => DeliveryStatus::Failed,
            DeliveryOutcome::Rejected { .. } => DeliveryStatus::Rejected,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Sent => None,
            DeliveryOutcome::Failed { error_code, .. }
            | DeliveryOutcome::Rejected { error_code, .. } => Some(error_code),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Sent => None,
            DeliveryOutcome::Failed { message, .. } | DeliveryOutcome::Rejected { message, .. } => {
                Some(message)
            }
        }
    }

    pub fn from_parts(
        status: DeliveryStatus,
        error_code: Option<String>,
        message: Option<String>,
    ) -> Result<Self, String> {
        match (status, error_code, message) {
            (DeliveryStatus::Sent, None, None) => Ok(DeliveryOutcome::Sent),
            (DeliveryStatus::Failed, Some(error_code), Some(message)) => {
                Ok(DeliveryOutcome::Failed {
                    error_code,
                    message,
                })
            }
            (DeliveryStatus::Rejected, Some(error_code), Some(message)) => {
                Ok(DeliveryOutcome::Rejected {
                    error_code,
                    message,
                })
            }
            (status, _, _) => Err(format!(
                "A {} delivery carries inconsistent error details.",
                status.as_str()
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub outcome: DeliveryOutcome,
    pub created_at: DateTime<Utc>,
}

/// Closed interval `[start, end]` of creation times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DeliveryWindow {
    pub fn ending_at(end: DateTime<Utc>, window_seconds: u32) -> Self {
        Self {
            start: end - Duration::seconds(i64::from(window_seconds)),
            end,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}
