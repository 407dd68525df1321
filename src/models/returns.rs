use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one completed route. Append-only and immutable once logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLog {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub dsp_name: String,
    pub return_count: u32,
    pub reasons: Vec<String>,
    pub logged_at: DateTime<Utc>,
}
