//! Deadline and severity arithmetic for proof-of-service SLAs

use chrono::{DateTime, Duration, Utc};

use crate::ops_issues::IssueSeverity;

/// Proof must exist by scheduled end plus the SLA window
pub fn proof_deadline(scheduled_end: DateTime<Utc>, sla_hours: i32) -> DateTime<Utc> {
    scheduled_end + Duration::hours(i64::from(sla_hours))
}

/// Whether a non-admin may still complete a booking
pub fn within_completion_window(
    scheduled_end: DateTime<Utc>,
    now: DateTime<Utc>,
    grace_hours: i64,
) -> bool {
    now <= scheduled_end + Duration::hours(grace_hours)
}

/// Severity of a missing-proof breach, measured as time elapsed since the
/// scheduled end of the service. Thresholds are exclusive.
pub fn breach_severity(scheduled_end: DateTime<Utc>, now: DateTime<Utc>) -> IssueSeverity {
    let overdue = now - scheduled_end;
    if overdue > Duration::hours(24) {
        IssueSeverity::Critical
    } else if overdue > Duration::hours(12) {
        IssueSeverity::High
    } else if overdue > Duration::hours(6) {
        IssueSeverity::Medium
    } else {
        IssueSeverity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_proof_deadline() {
        assert_eq!(proof_deadline(t0(), 2), t0() + Duration::hours(2));
        assert_eq!(proof_deadline(t0(), 0), t0());
    }

    #[test]
    fn test_completion_window_is_inclusive() {
        assert!(within_completion_window(t0(), t0(), 2));
        assert!(within_completion_window(t0(), t0() + Duration::hours(2), 2));
        assert!(!within_completion_window(
            t0(),
            t0() + Duration::hours(2) + Duration::seconds(1),
            2
        ));
        assert!(!within_completion_window(t0(), t0() + Duration::hours(3), 2));
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(breach_severity(t0(), t0() + Duration::hours(3)), IssueSeverity::Low);
        assert_eq!(breach_severity(t0(), t0() + Duration::hours(6)), IssueSeverity::Low);
        assert_eq!(breach_severity(t0(), t0() + Duration::hours(7)), IssueSeverity::Medium);
        assert_eq!(breach_severity(t0(), t0() + Duration::hours(13)), IssueSeverity::High);
        assert_eq!(breach_severity(t0(), t0() + Duration::hours(24)), IssueSeverity::High);
        assert_eq!(
            breach_severity(t0(), t0() + Duration::hours(25)),
            IssueSeverity::Critical
        );
    }
}
