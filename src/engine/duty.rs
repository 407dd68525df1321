//! Pure duty-cycle transitions. Every function mutates a record in place and
//! reports whether anything changed, so the store only fans out real updates.
//! Guard failures come back as `AppError::InvalidTransition` rather than the
//! silent client-side gating the rest of the app used to rely on.

use chrono::{DateTime, Duration, Utc};

use crate::error::AppError;
use crate::models::driver::DriverRecord;

/// Put a driver on duty, stamping the shift start. Calling this on a driver
/// who is already on duty restarts the shift: `on_duty_since` is reset to
/// `now`, which also pushes the expiry deadline out.
pub fn set_on_duty(rec: &mut DriverRecord, now: DateTime<Utc>) -> Result<bool, AppError> {
    if !rec.activated {
        return Err(AppError::InvalidTransition(format!(
            "driver {} is not activated",
            rec.id
        )));
    }

    rec.is_on_duty = true;
    rec.on_duty_since = Some(now);
    Ok(true)
}

/// Take a driver off duty unconditionally. `on_duty_since` is cleared in the
/// same mutation so the on-duty flag and the timestamp never disagree.
pub fn set_off_duty(rec: &mut DriverRecord) -> bool {
    let changed = rec.is_on_duty || rec.on_duty_since.is_some();
    rec.is_on_duty = false;
    rec.on_duty_since = None;
    changed
}

/// Dispatcher marks the route complete, asking the driver to return to
/// station. The driver stays logically on duty until they acknowledge.
pub fn mark_route_complete(rec: &mut DriverRecord) -> Result<bool, AppError> {
    if !rec.is_on_duty {
        return Err(AppError::InvalidTransition(format!(
            "driver {} is not on duty",
            rec.id
        )));
    }
    if rec.is_rts_confirmed {
        return Ok(false);
    }

    rec.is_rts_confirmed = true;
    Ok(true)
}

/// Driver acknowledges return-to-station: clears the RTS flag, the on-duty
/// flag, and the check-in flag in one mutation.
pub fn acknowledge_rts(rec: &mut DriverRecord) -> Result<bool, AppError> {
    if !rec.is_rts_confirmed {
        return Err(AppError::InvalidTransition(format!(
            "driver {} has no pending return-to-station request",
            rec.id
        )));
    }

    rec.is_rts_confirmed = false;
    rec.is_on_duty = false;
    rec.on_duty_since = None;
    rec.is_checked_in = false;
    Ok(true)
}

/// Driver-only check-in/out toggle. Only meaningful while on duty.
pub fn set_checked_in(rec: &mut DriverRecord, checked_in: bool) -> Result<bool, AppError> {
    if !rec.is_on_duty {
        return Err(AppError::InvalidTransition(format!(
            "driver {} is not on duty",
            rec.id
        )));
    }

    let changed = rec.is_checked_in != checked_in;
    rec.is_checked_in = checked_in;
    Ok(changed)
}

pub fn expiry_deadline(since: DateTime<Utc>, shift: Duration) -> DateTime<Utc> {
    since + shift
}

/// The deadline a controller should arm its timer for, if any. Off-duty
/// records have none; an on-duty record without a shift start has nothing to
/// compute from and is left to the dispatcher.
pub fn next_deadline(rec: &DriverRecord, shift: Duration) -> Option<DateTime<Utc>> {
    if !rec.is_on_duty {
        return None;
    }
    rec.on_duty_since.map(|since| expiry_deadline(since, shift))
}

pub fn is_overdue(rec: &DriverRecord, shift: Duration, now: DateTime<Utc>) -> bool {
    next_deadline(rec, shift).is_some_and(|deadline| now >= deadline)
}

/// Conditional expiry: takes the driver off duty only when the shift deadline
/// has passed. A stale timer firing against a record that is already off duty,
/// or that was restarted with a newer `on_duty_since`, is a no-op. Expiry is a
/// pure function of `on_duty_since` and the shift constant, so any number of
/// concurrent controllers reach the same verdict.
pub fn expire_if_overdue(rec: &mut DriverRecord, shift: Duration, now: DateTime<Utc>) -> bool {
    if !is_overdue(rec, shift, now) {
        return false;
    }
    set_off_duty(rec)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::driver::{DriverRecord, DutyState};

    fn driver(activated: bool) -> DriverRecord {
        let mut rec = DriverRecord::new("test-driver".to_string(), "Acme Logistics".to_string());
        rec.id = Uuid::from_u128(1);
        rec.activated = activated;
        rec
    }

    fn on_duty_driver() -> DriverRecord {
        let mut rec = driver(true);
        set_on_duty(&mut rec, Utc::now()).unwrap();
        rec
    }

    #[test]
    fn set_on_duty_stamps_shift_start() {
        let mut rec = driver(true);
        let now = Utc::now();

        assert!(set_on_duty(&mut rec, now).unwrap());

        assert!(rec.is_on_duty);
        assert_eq!(rec.on_duty_since, Some(now));
        assert_eq!(rec.duty_state(), DutyState::OnDuty);
    }

    #[test]
    fn set_on_duty_rejects_unactivated_driver() {
        let mut rec = driver(false);

        let err = set_on_duty(&mut rec, Utc::now()).unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(!rec.is_on_duty);
        assert!(rec.on_duty_since.is_none());
    }

    #[test]
    fn repeat_set_on_duty_restarts_the_shift() {
        let mut rec = driver(true);
        let first = Utc::now() - Duration::hours(3);
        let second = Utc::now();

        set_on_duty(&mut rec, first).unwrap();
        set_on_duty(&mut rec, second).unwrap();

        assert_eq!(rec.on_duty_since, Some(second));
    }

    #[test]
    fn set_off_duty_clears_flag_and_timestamp_together() {
        let mut rec = on_duty_driver();

        assert!(set_off_duty(&mut rec));

        assert!(!rec.is_on_duty);
        assert!(rec.on_duty_since.is_none());
    }

    #[test]
    fn set_off_duty_on_off_duty_driver_is_noop() {
        let mut rec = driver(true);
        assert!(!set_off_duty(&mut rec));
    }

    #[test]
    fn mark_route_complete_requires_on_duty() {
        let mut rec = driver(true);

        let err = mark_route_complete(&mut rec).unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(!rec.is_rts_confirmed);
    }

    #[test]
    fn mark_route_complete_leaves_driver_on_duty() {
        let mut rec = on_duty_driver();
        let since = rec.on_duty_since;

        assert!(mark_route_complete(&mut rec).unwrap());

        assert!(rec.is_rts_confirmed);
        assert!(rec.is_on_duty);
        assert_eq!(rec.on_duty_since, since);
        assert_eq!(rec.duty_state(), DutyState::OnDutyPendingRts);
    }

    #[test]
    fn repeat_mark_route_complete_is_noop() {
        let mut rec = on_duty_driver();

        mark_route_complete(&mut rec).unwrap();
        assert!(!mark_route_complete(&mut rec).unwrap());
        assert!(rec.is_rts_confirmed);
    }

    #[test]
    fn acknowledge_rts_clears_all_three_flags_atomically() {
        let mut rec = on_duty_driver();
        set_checked_in(&mut rec, true).unwrap();
        mark_route_complete(&mut rec).unwrap();

        assert!(acknowledge_rts(&mut rec).unwrap());

        assert!(!rec.is_rts_confirmed);
        assert!(!rec.is_on_duty);
        assert!(!rec.is_checked_in);
        assert!(rec.on_duty_since.is_none());
        assert_eq!(rec.duty_state(), DutyState::OffDuty);
    }

    #[test]
    fn acknowledge_rts_without_pending_request_is_rejected() {
        let mut rec = on_duty_driver();

        let err = acknowledge_rts(&mut rec).unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(rec.is_on_duty);
    }

    #[test]
    fn check_in_requires_on_duty() {
        let mut rec = driver(true);
        let err = set_checked_in(&mut rec, true).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn check_in_toggle_reports_change() {
        let mut rec = on_duty_driver();

        assert!(set_checked_in(&mut rec, true).unwrap());
        assert!(!set_checked_in(&mut rec, true).unwrap());
        assert!(set_checked_in(&mut rec, false).unwrap());
    }

    #[test]
    fn overdue_shift_expires() {
        let mut rec = on_duty_driver();
        let shift = Duration::hours(9);
        rec.on_duty_since = Some(Utc::now() - shift - Duration::seconds(1));

        assert!(expire_if_overdue(&mut rec, shift, Utc::now()));

        assert!(!rec.is_on_duty);
        assert!(rec.on_duty_since.is_none());
    }

    #[test]
    fn shift_within_duration_does_not_expire() {
        let mut rec = on_duty_driver();
        let shift = Duration::hours(9);
        rec.on_duty_since = Some(Utc::now() - shift + Duration::minutes(5));

        assert!(!expire_if_overdue(&mut rec, shift, Utc::now()));
        assert!(rec.is_on_duty);
    }

    #[test]
    fn expiry_on_off_duty_record_is_noop() {
        let mut rec = driver(true);
        assert!(!expire_if_overdue(&mut rec, Duration::hours(9), Utc::now()));
    }

    #[test]
    fn on_duty_without_shift_start_never_expires() {
        let mut rec = driver(true);
        rec.is_on_duty = true;

        assert!(next_deadline(&rec, Duration::hours(9)).is_none());
        assert!(!expire_if_overdue(&mut rec, Duration::hours(9), Utc::now()));
        assert!(rec.is_on_duty);
    }

    #[test]
    fn controllers_sharing_observations_agree_on_expiry() {
        let shift = Duration::hours(9);
        let since = Utc::now() - Duration::hours(10);
        let now = Utc::now();

        let mut first = on_duty_driver();
        first.on_duty_since = Some(since);
        let mut second = first.clone();

        assert_eq!(
            is_overdue(&first, shift, now),
            is_overdue(&second, shift, now)
        );
        assert!(expire_if_overdue(&mut first, shift, now));
        assert!(expire_if_overdue(&mut second, shift, now));
        assert_eq!(first.is_on_duty, second.is_on_duty);
    }

    #[test]
    fn restarted_shift_pushes_deadline_out() {
        let shift = Duration::hours(9);
        let mut rec = on_duty_driver();
        rec.on_duty_since = Some(Utc::now() - Duration::hours(10));

        // dispatcher restarts the shift before the stale timer fires
        set_on_duty(&mut rec, Utc::now()).unwrap();

        assert!(!expire_if_overdue(&mut rec, shift, Utc::now()));
        assert!(rec.is_on_duty);
    }
}
