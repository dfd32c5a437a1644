/// Station availability check.
///
/// A station counts as online when its most recent detection (from the hourly
/// snapshot) is no older than the freshness threshold.
///
/// Elapsed time is the true wall-clock difference between "now" (captured
/// once per run, truncated to whole seconds) and the detection instant,
/// converted to fractional hours. Day boundaries are not special: a detection
/// 25 hours ago is 25 hours old. A detection stamped in the future (clock
/// skew on the station) has a negative age and counts as online.

use crate::model::Snapshot;
use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use std::fmt;

/// Threshold used when none is configured.
pub const DEFAULT_THRESHOLD_HOURS: f64 = 1.5;

/// Online/offline verdict for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Online,
    Offline,
}

impl Verdict {
    pub fn from_online(online: bool) -> Self {
        if online { Verdict::Online } else { Verdict::Offline }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Online => write!(f, "ONLINE"),
            Verdict::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Hours between `last_detection_at` and `now`, with `now` truncated to the
/// second.
pub fn elapsed_hours(last_detection_at: DateTime<FixedOffset>, now: DateTime<Utc>) -> f64 {
    let now = now.trunc_subsecs(0);
    let elapsed = now - last_detection_at.with_timezone(&Utc);
    elapsed.num_milliseconds() as f64 / 3_600_000.0
}

/// True when the last detection is at most `threshold_hours` old.
///
/// `None` falls back to `DEFAULT_THRESHOLD_HOURS`; the run wiring always
/// passes the configured value (12 hours unless changed).
pub fn is_online(
    last_detection_at: DateTime<FixedOffset>,
    now: DateTime<Utc>,
    threshold_hours: Option<f64>,
) -> bool {
    let threshold = threshold_hours.unwrap_or(DEFAULT_THRESHOLD_HOURS);
    elapsed_hours(last_detection_at, now) <= threshold
}

/// Verdict for a snapshot. A snapshot without a last detection (failed
/// fetch, or a station that has never heard a bird) is offline.
pub fn evaluate(snapshot: &Snapshot, now: DateTime<Utc>, threshold_hours: Option<f64>) -> Verdict {
    match snapshot.last_detection_at {
        Some(last) => {
            let online = is_online(last, now, threshold_hours);
            log::debug!(
                "Last detection {} is {:.2} h old -> {}",
                last,
                elapsed_hours(last, now),
                Verdict::from_online(online)
            );
            Verdict::from_online(online)
        }
        None => {
            log::debug!("No last detection available ({}) -> OFFLINE", snapshot.status);
            Verdict::Offline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FetchStatus, Granularity};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn cdt(dt: DateTime<Utc>) -> DateTime<FixedOffset> {
        dt.with_timezone(&FixedOffset::west_opt(5 * 3600).unwrap())
    }

    #[test]
    fn test_exactly_at_threshold_is_online() {
        let last = cdt(now() - Duration::hours(12));
        assert!(is_online(last, now(), Some(12.0)));
    }

    #[test]
    fn test_just_past_threshold_is_offline() {
        let last = cdt(now() - Duration::hours(12) - Duration::seconds(1));
        assert!(!is_online(last, now(), Some(12.0)));
    }

    #[test]
    fn test_recent_detection_is_online() {
        let last = cdt(now() - Duration::minutes(30));
        assert!(is_online(last, now(), Some(12.0)));
    }

    #[test]
    fn test_missing_threshold_falls_back_to_ninety_minutes() {
        let last = cdt(now() - Duration::minutes(90));
        assert!(is_online(last, now(), None));

        let last = cdt(now() - Duration::minutes(91));
        assert!(!is_online(last, now(), None));
    }

    #[test]
    fn test_whole_days_count_toward_age() {
        // 24h 10m old: offline even though the time-of-day difference is small.
        let last = cdt(now() - Duration::hours(24) - Duration::minutes(10));
        assert!(!is_online(last, now(), Some(12.0)));
        assert!((elapsed_hours(last, now()) - 24.1667).abs() < 0.001);
    }

    #[test]
    fn test_future_detection_is_online() {
        let last = cdt(now() + Duration::minutes(5));
        assert!(is_online(last, now(), Some(12.0)));
    }

    #[test]
    fn test_offset_does_not_change_elapsed_time() {
        let instant = now() - Duration::hours(3);
        let in_utc = instant.fixed_offset();
        let in_cdt = cdt(instant);
        assert_eq!(elapsed_hours(in_utc, now()), elapsed_hours(in_cdt, now()));
        assert!((elapsed_hours(in_cdt, now()) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_now_is_truncated_to_seconds() {
        let last = cdt(now() - Duration::hours(12));
        let now_with_millis = now() + Duration::milliseconds(900);
        assert!(is_online(last, now_with_millis, Some(12.0)));
    }

    #[test]
    fn test_failed_snapshot_is_offline() {
        let snapshot = Snapshot::failed(Granularity::Hourly, FetchStatus::BadResponse(500));
        assert_eq!(evaluate(&snapshot, now(), Some(12.0)), Verdict::Offline);
    }

    #[test]
    fn test_verdict_strings() {
        assert_eq!(Verdict::Online.to_string(), "ONLINE");
        assert_eq!(Verdict::Offline.to_string(), "OFFLINE");
    }
}
