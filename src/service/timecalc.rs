//! Pure time and overtime arithmetic. No store access, no clock reads.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{ApiError, ApiResult};

/// Regular-hours threshold applied when an employee has no shift bound.
pub const DEFAULT_STANDARD_HOURS: f64 = 8.0;

pub const MIN_WORK_MINUTES: i64 = 30;
pub const MAX_WORK_MINUTES: i64 = 1440;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Worked minutes between entry and exit, rounded to the nearest minute.
pub fn duration_minutes(entry: NaiveDateTime, exit: NaiveDateTime) -> i64 {
    let seconds = (exit - entry).num_seconds();
    (seconds as f64 / 60.0).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoursSplit {
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub total_hours: f64,
}

/// Splits a worked duration into regular and overtime hours against the
/// shift's standard hours. Everything up to the threshold is regular; the
/// remainder is overtime.
pub fn split_hours(minutes: i64, standard_hours: f64) -> HoursSplit {
    let total_hours = round2(minutes as f64 / 60.0);

    if total_hours > standard_hours {
        HoursSplit {
            regular_hours: standard_hours,
            overtime_hours: round2(total_hours - standard_hours),
            total_hours,
        }
    } else {
        HoursSplit {
            regular_hours: total_hours,
            overtime_hours: 0.0,
            total_hours,
        }
    }
}

/// Shift length in hours, wraparound-aware: an end at or before the start
/// means the shift runs past midnight into the next day.
pub fn shift_duration_hours(start: NaiveTime, end: NaiveTime) -> f64 {
    let mut minutes = (end - start).num_minutes();
    if minutes <= 0 {
        minutes += 24 * 60;
    }
    round2(minutes as f64 / 60.0)
}

pub fn parse_hhmm(value: &str) -> ApiResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ApiError::Validation(format!("Invalid time '{value}', expected HH:MM")))
}

pub fn days_in_month(year: i32, month: u32) -> ApiResult<i64> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ApiError::Validation(format!("Invalid month {year}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| ApiError::Validation(format!("Invalid month {year}-{month:02}")))?;
    Ok((next - first).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn eight_hour_day_is_480_minutes() {
        let minutes = duration_minutes(dt(2025, 1, 1, 9, 0), dt(2025, 1, 1, 17, 0));
        assert_eq!(minutes, 480);
    }

    #[test]
    fn ten_hours_against_eight_standard_splits_two_overtime() {
        let split = split_hours(600, 8.0);
        assert_eq!(split.regular_hours, 8.0);
        assert_eq!(split.overtime_hours, 2.0);
        assert_eq!(split.total_hours, 10.0);
    }

    #[test]
    fn under_threshold_has_no_overtime() {
        let split = split_hours(360, 8.0);
        assert_eq!(split.regular_hours, 6.0);
        assert_eq!(split.overtime_hours, 0.0);
    }

    #[test]
    fn half_hour_past_standard_is_half_overtime() {
        // 08:00 -> 16:30 with the default threshold
        let minutes = duration_minutes(dt(2025, 6, 10, 8, 0), dt(2025, 6, 10, 16, 30));
        assert_eq!(minutes, 510);
        let split = split_hours(minutes, DEFAULT_STANDARD_HOURS);
        assert_eq!(split.regular_hours, 8.0);
        assert_eq!(split.overtime_hours, 0.5);
        assert_eq!(split.total_hours, 8.5);
    }

    #[test]
    fn day_shift_duration() {
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(17, 30, 0).unwrap();
        assert_eq!(shift_duration_hours(start, end), 8.5);
    }

    #[test]
    fn overnight_shift_duration_wraps() {
        let start = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert_eq!(shift_duration_hours(start, end), 8.0);
    }

    #[test]
    fn parse_hhmm_rejects_garbage() {
        assert!(parse_hhmm("22:00").is_ok());
        assert!(parse_hhmm("25:99").is_err());
        assert!(parse_hhmm("night").is_err());
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2025, 2).unwrap(), 28);
        assert_eq!(days_in_month(2024, 2).unwrap(), 29);
        assert_eq!(days_in_month(2025, 12).unwrap(), 31);
        assert!(days_in_month(2025, 13).is_err());
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(8.333333), 8.33);
        assert_eq!(round2(0.666666), 0.67);
        assert_eq!(round2(10.0), 10.0);
    }
}
