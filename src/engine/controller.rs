use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::duty;
use crate::models::driver::DriverRecord;
use crate::state::AppState;

// Idle arm used when no deadline is pending; the select branch is disabled
// so this sleep is never actually polled.
const IDLE_TIMER: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-driver duty controller. Subscribes to the driver's record stream and
/// keeps at most one expiry timer armed, recomputed from scratch on every
/// observed snapshot: a later snapshot may carry a newer `on_duty_since` after
/// a shift restart, so rescheduling on unchanged fields is required, not an
/// optimization. Any number of instances may watch the same driver; the
/// store's serialized write makes exactly one of them land the transition.
pub async fn run_duty_controller(state: Arc<AppState>, driver_id: Uuid) {
    let mut rx = state.store.subscribe(driver_id);
    let mut snapshot = state.store.get_driver(driver_id);

    info!(driver_id = %driver_id, "duty controller started");

    loop {
        // An observation whose deadline is already in the past transitions
        // immediately instead of arming a timer for zero.
        if let Some(rec) = snapshot.as_ref() {
            if duty::is_overdue(rec, state.shift_duration, Utc::now()) {
                snapshot = try_expire(&state, driver_id);
                continue;
            }
        }

        let deadline = snapshot
            .as_ref()
            .and_then(|rec| duty::next_deadline(rec, state.shift_duration));
        let timer = deadline.map(|at| {
            let remaining = (at - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            Instant::now() + remaining
        });

        tokio::select! {
            received = rx.recv() => match received {
                Ok(rec) => {
                    debug!(driver_id = %driver_id, state = ?rec.duty_state(), "observed snapshot");
                    snapshot = Some(rec);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(driver_id = %driver_id, skipped, "subscription lagged; refetching");
                    snapshot = state.store.get_driver(driver_id);
                }
                Err(RecvError::Closed) => break,
            },
            _ = sleep_until(timer.unwrap_or_else(|| Instant::now() + IDLE_TIMER)), if timer.is_some() => {
                snapshot = try_expire(&state, driver_id);
            }
        }
    }

    info!(driver_id = %driver_id, "duty controller stopped: subscription closed");
}

/// Conditional expiry write. A stale fire against a record that is already
/// off duty or restarted is a counted no-op, never an error.
fn try_expire(state: &AppState, driver_id: Uuid) -> Option<DriverRecord> {
    let shift = state.shift_duration;
    match state
        .store
        .write_driver(driver_id, |rec| Ok(duty::expire_if_overdue(rec, shift, Utc::now())))
    {
        Ok((rec, true)) => {
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
            state
                .metrics
                .drivers_on_duty
                .set(state.store.on_duty_count() as i64);
            info!(driver_id = %driver_id, "shift expired; driver taken off duty");
            Some(rec)
        }
        Ok((rec, false)) => {
            state
                .metrics
                .expiry_fires_total
                .with_label_values(&["noop"])
                .inc();
            debug!(driver_id = %driver_id, "stale expiry fire; no-op");
            Some(rec)
        }
        Err(err) => {
            warn!(driver_id = %driver_id, error = %err, "expiry write failed");
            None
        }
    }
}
