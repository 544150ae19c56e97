//! Handlers for the implemented general-group commands.

use ntcip_core::message::{code, MessageGroup, Reply, TimeSync, RESET_PARAM};
use tracing::info;

use super::clock::seconds_of_day;
use super::dispatch::{HandlerContext, ValidationError};

/// Largest drift, in seconds, still answered with "setting accepted".
pub const DRIFT_TOLERANCE: u32 = 3;

/// `0F 10`: reset.  Always answers `0F 90 52 52`, whatever the data.
pub fn reset(ctx: &HandlerContext<'_>, _data: &[u8]) -> Result<Option<Vec<u8>>, ValidationError> {
    info!(seq = ctx.seq, addr = ctx.addr, "reset requested");
    Ok(Some(Reply::ResetAck { param: RESET_PARAM }.to_payload()))
}

/// `0F 12`: time sync.
///
/// Compares the requested time of day with the local clock.  Within
/// [`DRIFT_TOLERANCE`] the setting is accepted; beyond it the drift is
/// reported, clamped to 128 seconds.
pub fn time_sync(ctx: &HandlerContext<'_>, data: &[u8]) -> Result<Option<Vec<u8>>, ValidationError> {
    let requested = TimeSync::parse(data)?;
    let drift = requested.drift_from(seconds_of_day(ctx.clock));
    info!(
        seq = ctx.seq,
        drift,
        "time sync {:02}:{:02}:{:02}",
        requested.hour,
        requested.minute,
        requested.second
    );

    let reply = if drift > DRIFT_TOLERANCE {
        Reply::time_drift(drift)
    } else {
        Reply::SettingAccepted {
            group: MessageGroup::General as u8,
            code: code::TIME_SYNC,
        }
    };
    Ok(Some(reply.to_payload()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::MockClock;
    use chrono::NaiveDate;
    use ntcip_core::message::MessageError;

    fn clock_at(h: u32, m: u32, s: u32) -> MockClock {
        let mut clock = MockClock::new();
        clock.expect_now().returning(move || {
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap()
        });
        clock
    }

    #[test]
    fn test_reset_never_consults_clock() {
        // Arrange – a mock with no expectations panics if called
        let clock = MockClock::new();
        let ctx = HandlerContext {
            seq: 1,
            addr: 1,
            clock: &clock,
        };

        // Act
        let reply = reset(&ctx, &[0xFF]).unwrap();

        // Assert
        assert_eq!(reply, Some(vec![0x0F, 0x90, 0x52, 0x52]));
    }

    #[test]
    fn test_time_sync_across_midnight_reports_clamped_drift() {
        // Arrange – device at 00:00:01, request at 23:59:59
        let clock = clock_at(0, 0, 1);
        let ctx = HandlerContext {
            seq: 1,
            addr: 1,
            clock: &clock,
        };

        // Act
        let reply = time_sync(&ctx, &[24, 3, 14, 4, 23, 59, 59]).unwrap();

        // Assert – 86 398 s apart, clamped to 128
        assert_eq!(reply, Some(vec![0x0F, 0x92, 128]));
    }

    #[test]
    fn test_time_sync_exactly_128_seconds_is_reported_as_is() {
        let clock = clock_at(10, 0, 0);
        let ctx = HandlerContext {
            seq: 1,
            addr: 1,
            clock: &clock,
        };

        let reply = time_sync(&ctx, &[24, 3, 15, 5, 10, 2, 8]).unwrap();

        assert_eq!(reply, Some(vec![0x0F, 0x92, 128]));
    }

    #[test]
    fn test_time_sync_validation_error_names_field() {
        let clock = MockClock::new();
        let ctx = HandlerContext {
            seq: 1,
            addr: 1,
            clock: &clock,
        };

        let err = time_sync(&ctx, &[24, 3, 15, 9, 10, 0, 0]).unwrap_err();

        assert_eq!(
            err,
            ValidationError::Malformed(MessageError::FieldOutOfRange {
                field: "weekday",
                value: 9
            })
        );
    }
}
