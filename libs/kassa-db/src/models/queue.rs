use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueueRow {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: String,
    pub kind: String,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkingRow {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SuccessfulRow {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: String,
    pub kind: String,
    pub hold_time: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlockedRow {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: String,
    pub kind: String,
}
