use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::engine::duty;
use crate::state::AppState;

/// Periodic reconciliation: expire overdue shifts even when no per-driver
/// controller happens to be running at the deadline. The sweep reuses the
/// same conditional write as the controllers, so overlapping with them is
/// harmless.
pub async fn run_expiry_sweep(state: Arc<AppState>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "expiry sweep started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let expired = sweep_once(&state);
        if expired > 0 {
            info!(expired, "expiry sweep took overdue drivers off duty");
        }
    }
}

/// One sweep pass; returns how many drivers it expired.
pub fn sweep_once(state: &AppState) -> usize {
    let shift = state.shift_duration;
    let now = Utc::now();

    let overdue: Vec<_> = state
        .store
        .list_drivers()
        .into_iter()
        .filter(|rec| duty::is_overdue(rec, shift, now))
        .map(|rec| rec.id)
        .collect();

    let mut expired = 0;
    for driver_id in overdue {
        match state
            .store
            .write_driver(driver_id, |rec| Ok(duty::expire_if_overdue(rec, shift, Utc::now())))
        {
            Ok((_, true)) => {
                expired += 1;
                state
                    .metrics
                    .expiry_fires_total
                    .with_label_values(&["expired"])
                    .inc();
                state
                    .metrics
                    .duty_transitions_total
                    .with_label_values(&["expired"])
                    .inc();
                info!(driver_id = %driver_id, "sweep expired overdue shift");
            }
            Ok((_, false)) => {
                // a controller beat us to it between the scan and the write
                state
                    .metrics
                    .expiry_fires_total
                    .with_label_values(&["noop"])
                    .inc();
            }
            Err(err) => {
                warn!(driver_id = %driver_id, error = %err, "sweep expiry write failed");
            }
        }
    }

    state
        .metrics
        .drivers_on_duty
        .set(state.store.on_duty_count() as i64);

    expired
}
