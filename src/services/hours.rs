use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::BranchSchedule;

/// Parses a caller-supplied timestamp. Inputs that carry an offset are
/// honored as-is; naive inputs are interpreted in the branch's civil
/// timezone, then converted to UTC for storage.
pub fn parse_civil_timestamp(input: &str, tz: Tz) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M"))
        .map_err(|_| AppError::Validation(format!("invalid timestamp: {input}")))?;

    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        chrono::LocalResult::None => Err(AppError::Validation(format!(
            "timestamp does not exist in timezone {}: {input}",
            tz.name()
        ))),
    }
}

/// Checks a [start, end) interval against the branch's weekly operating
/// hours, evaluated in the branch's civil timezone. Single-day spans only.
pub fn validate_branch_hours(
    schedule: &BranchSchedule,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<(), AppError> {
    let start_local = start.with_timezone(&schedule.timezone);
    let end_local = end.with_timezone(&schedule.timezone);

    if !schedule.is_open_on(start_local.weekday()) {
        return Err(AppError::OutOfHours(format!(
            "branch is closed on {}",
            start_local.format("%A").to_string().to_lowercase()
        )));
    }

    if start_local.time() < schedule.open_time {
        return Err(AppError::OutOfHours(format!(
            "branch opens at {}",
            schedule.open_time.format("%H:%M")
        )));
    }

    if end_local.time() > schedule.close_time {
        return Err(AppError::OutOfHours(format!(
            "branch closes at {}",
            schedule.close_time.format("%H:%M")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Phnom_Penh;

    fn schedule() -> BranchSchedule {
        BranchSchedule::from_row("mon,tue,wed,thu,fri", "09:00", "17:00", "Asia/Phnom_Penh")
            .unwrap()
    }

    #[test]
    fn test_naive_input_is_branch_local() {
        // Phnom Penh is UTC+7 year-round.
        let dt = parse_civil_timestamp("2025-06-16 10:00:00", Phnom_Penh).unwrap();
        assert_eq!(queries_fmt(&dt), "2025-06-16 03:00:00");
    }

    #[test]
    fn test_offset_input_honored() {
        let dt = parse_civil_timestamp("2025-06-16T03:00:00Z", Phnom_Penh).unwrap();
        assert_eq!(queries_fmt(&dt), "2025-06-16 03:00:00");
    }

    #[test]
    fn test_invalid_input_rejected() {
        assert!(parse_civil_timestamp("not a date", Phnom_Penh).is_err());
    }

    #[test]
    fn test_within_hours_ok() {
        // 2025-06-16 is a Monday; 10:00-12:00 local.
        let start = parse_civil_timestamp("2025-06-16 10:00:00", Phnom_Penh).unwrap();
        let end = parse_civil_timestamp("2025-06-16 12:00:00", Phnom_Penh).unwrap();
        assert!(validate_branch_hours(&schedule(), &start, &end).is_ok());
    }

    #[test]
    fn test_closed_day_fails() {
        // 2025-06-15 is a Sunday.
        let start = parse_civil_timestamp("2025-06-15 10:00:00", Phnom_Penh).unwrap();
        let end = parse_civil_timestamp("2025-06-15 12:00:00", Phnom_Penh).unwrap();
        let err = validate_branch_hours(&schedule(), &start, &end).unwrap_err();
        assert!(matches!(err, AppError::OutOfHours(_)));
    }

    #[test]
    fn test_before_opening_fails() {
        let start = parse_civil_timestamp("2025-06-16 08:00:00", Phnom_Penh).unwrap();
        let end = parse_civil_timestamp("2025-06-16 10:00:00", Phnom_Penh).unwrap();
        assert!(validate_branch_hours(&schedule(), &start, &end).is_err());
    }

    #[test]
    fn test_after_closing_fails() {
        let start = parse_civil_timestamp("2025-06-16 16:00:00", Phnom_Penh).unwrap();
        let end = parse_civil_timestamp("2025-06-16 18:00:00", Phnom_Penh).unwrap();
        assert!(validate_branch_hours(&schedule(), &start, &end).is_err());
    }

    #[test]
    fn test_boundary_times_ok() {
        let start = parse_civil_timestamp("2025-06-16 09:00:00", Phnom_Penh).unwrap();
        let end = parse_civil_timestamp("2025-06-16 17:00:00", Phnom_Penh).unwrap();
        assert!(validate_branch_hours(&schedule(), &start, &end).is_ok());
    }

    fn queries_fmt(dt: &DateTime<Utc>) -> String {
        crate::db::queries::fmt_dt(dt)
    }
}
