use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical duty state derived from the record's flags. `is_checked_in` is an
/// orthogonal flag layered on `OnDuty` and does not change the derived state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DutyState {
    OffDuty,
    OnDuty,
    OnDutyPendingRts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRecord {
    pub id: Uuid,
    pub name: String,
    pub dsp_name: String,
    pub activated: bool,
    pub is_on_duty: bool,
    pub on_duty_since: Option<DateTime<Utc>>,
    pub is_checked_in: bool,
    pub is_rts_confirmed: bool,
    pub is_rescuing: bool,
    pub updated_at: DateTime<Utc>,
}

impl DriverRecord {
    pub fn new(name: String, dsp_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            dsp_name,
            activated: false,
            is_on_duty: false,
            on_duty_since: None,
            is_checked_in: false,
            is_rts_confirmed: false,
            is_rescuing: false,
            updated_at: Utc::now(),
        }
    }

    pub fn duty_state(&self) -> DutyState {
        if !self.is_on_duty {
            DutyState::OffDuty
        } else if self.is_rts_confirmed {
            DutyState::OnDutyPendingRts
        } else {
            DutyState::OnDuty
        }
    }
}
