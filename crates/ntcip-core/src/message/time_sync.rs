//! Time-sync payload (`0F 12`).
//!
//! ```text
//! data: [year][month][day][weekday][hour][minute][second]
//! ```
//!
//! `year` is the last two digits of the year and is not range-checked.
//! `weekday` runs from 1 (Monday) to 7 (Sunday).

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::MessageError;

/// Number of data bytes in a time-sync command.
pub const TIME_SYNC_LEN: usize = 7;

/// A validated time-sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSync {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeSync {
    /// Parses and validates the 7 data bytes of a time-sync command.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::WrongLength`] if `data` is not exactly 7 bytes,
    /// or [`MessageError::FieldOutOfRange`] for the first field outside its
    /// natural range.
    pub fn parse(data: &[u8]) -> Result<Self, MessageError> {
        let [year, month, day, weekday, hour, minute, second] = data else {
            return Err(MessageError::WrongLength {
                expected: TIME_SYNC_LEN,
                actual: data.len(),
            });
        };
        let time = Self {
            year: *year,
            month: *month,
            day: *day,
            weekday: *weekday,
            hour: *hour,
            minute: *minute,
            second: *second,
        };
        time.validate()?;
        Ok(time)
    }

    /// Checks every field against its natural range.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::FieldOutOfRange`] naming the first bad field.
    pub fn validate(&self) -> Result<(), MessageError> {
        let checks: [(&'static str, u8, u8, u8); 6] = [
            ("month", self.month, 1, 12),
            ("day", self.day, 1, 31),
            ("weekday", self.weekday, 1, 7),
            ("hour", self.hour, 0, 23),
            ("minute", self.minute, 0, 59),
            ("second", self.second, 0, 59),
        ];
        for (field, value, lo, hi) in checks {
            if !(lo..=hi).contains(&value) {
                return Err(MessageError::FieldOutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// Builds a request from a local wall-clock reading.
    pub fn from_datetime(now: &NaiveDateTime) -> Self {
        Self {
            year: (now.year().rem_euclid(100)) as u8,
            month: now.month() as u8,
            day: now.day() as u8,
            weekday: now.weekday().number_from_monday() as u8,
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second().min(59) as u8,
        }
    }

    /// The 7 wire bytes.
    pub fn to_bytes(&self) -> [u8; TIME_SYNC_LEN] {
        [
            self.year,
            self.month,
            self.day,
            self.weekday,
            self.hour,
            self.minute,
            self.second,
        ]
    }

    /// Seconds since midnight of the requested time.
    pub fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }

    /// Absolute difference in seconds between the requested time of day and
    /// `local_seconds`.  The date is ignored and midnight is not wrapped.
    pub fn drift_from(&self, local_seconds: u32) -> u32 {
        self.seconds_of_day().abs_diff(local_seconds)
    }
}
