//! Clock abstraction for determinism.

use chrono::{DateTime, SubsecRound, Utc};

/// Abstraction over system time. Engines read it once per committed event.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Computes the persisted timestamp for the next event: the clock reading at
/// microsecond precision, never earlier than the previously committed event.
#[must_use]
pub fn next_occurred_at(now: DateTime<Utc>, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(6);
    match previous {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_next_occurred_at_truncates_to_microseconds() {
        let now = Utc.timestamp_nanos(1_768_471_200_123_456_789);

        let stamped = next_occurred_at(now, None);

        assert_eq!(stamped.timestamp_subsec_nanos() % 1_000, 0);
        assert_eq!(stamped.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_next_occurred_at_never_goes_backwards() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let later = earlier + Duration::seconds(5);

        assert_eq!(next_occurred_at(earlier, Some(later)), later);
        assert_eq!(next_occurred_at(later, Some(earlier)), later);
    }
}
