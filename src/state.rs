use chrono::Duration;

use crate::observability::metrics::Metrics;
use crate::store::PresenceStore;

pub struct AppState {
    pub store: PresenceStore,
    pub shift_duration: Duration,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(shift_duration: Duration, event_buffer_size: usize) -> Self {
        Self {
            store: PresenceStore::new(event_buffer_size),
            shift_duration,
            metrics: Metrics::new(),
        }
    }
}
