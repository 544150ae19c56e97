//! Local wall-clock abstraction.
//!
//! The time-sync handler compares a requested time against the device's own
//! clock.  Reading the clock through a trait keeps that handler pure and lets
//! tests pin "now" to any instant.

use chrono::{Local, NaiveDateTime, Timelike};

/// Source of the device's local time.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// Seconds since local midnight according to `clock`.
pub fn seconds_of_day(clock: &dyn Clock) -> u32 {
    clock.now().num_seconds_from_midnight()
}

/// The operating-system clock in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_seconds_of_day_derives_from_now() {
        // Arrange
        let mut clock = MockClock::new();
        clock.expect_now().returning(|| {
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(1, 2, 3)
                .unwrap()
        });

        // Act
        let seconds = seconds_of_day(&clock);

        // Assert
        assert_eq!(seconds, 3723);
    }

    #[test]
    fn test_system_clock_is_within_a_day() {
        assert!(seconds_of_day(&SystemClock) < 86_400);
    }
}
