use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RescueStatus {
    Dispatched,
    Acknowledged,
}

/// One rescue assignment. Created once by a dispatcher, mutated once by the
/// rescuer's acknowledgement, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rescue {
    pub id: Uuid,
    pub rescuer_id: Uuid,
    pub rescuee_name: String,
    pub rescue_address: String,
    pub status: RescueStatus,
    pub dispatched_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}
