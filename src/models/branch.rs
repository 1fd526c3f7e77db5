use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub branch_name: String,
    pub owner_id: String,
    pub is_active: bool,
    pub schedule: BranchSchedule,
}

/// Recurring weekly operating hours: a set of open weekdays with a single
/// open/close pair, in the branch's civil timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSchedule {
    pub work_days: Vec<String>,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub timezone: chrono_tz::Tz,
}

impl BranchSchedule {
    pub fn from_row(
        work_days: &str,
        open_time: &str,
        close_time: &str,
        timezone: &str,
    ) -> anyhow::Result<Self> {
        let days: Vec<String> = work_days
            .split(',')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        for day in &days {
            parse_weekday(day)?;
        }

        Ok(Self {
            work_days: days,
            open_time: parse_time(open_time)?,
            close_time: parse_time(close_time)?,
            timezone: timezone
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid timezone: {timezone}"))?,
        })
    }

    pub fn is_open_on(&self, weekday: Weekday) -> bool {
        let name = weekday_key(weekday);
        self.work_days.iter().any(|d| d == name)
    }

    pub fn to_human_readable(&self) -> String {
        let day_order = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
        let mut days = self.work_days.clone();
        days.sort_by_key(|d| day_order.iter().position(|o| o == d).unwrap_or(7));

        format!(
            "{} {}-{}",
            days.join(","),
            self.open_time.format("%H:%M"),
            self.close_time.format("%H:%M"),
        )
    }
}

fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    match s {
        "mon" | "tue" | "wed" | "thu" | "fri" | "sat" | "sun" => Ok(()),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| anyhow::anyhow!("invalid time format: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row_valid() {
        let schedule = BranchSchedule::from_row("mon,tue,wed", "09:00", "17:00", "Asia/Phnom_Penh")
            .unwrap();
        assert_eq!(schedule.work_days.len(), 3);
        assert!(schedule.is_open_on(Weekday::Mon));
        assert!(!schedule.is_open_on(Weekday::Sun));
    }

    #[test]
    fn test_from_row_invalid_day() {
        assert!(BranchSchedule::from_row("mon,xyz", "09:00", "17:00", "Asia/Phnom_Penh").is_err());
    }

    #[test]
    fn test_from_row_invalid_time() {
        assert!(BranchSchedule::from_row("mon", "25:00", "17:00", "Asia/Phnom_Penh").is_err());
    }

    #[test]
    fn test_from_row_invalid_timezone() {
        assert!(BranchSchedule::from_row("mon", "09:00", "17:00", "Mars/Olympus").is_err());
    }

    #[test]
    fn test_to_human_readable_sorted() {
        let schedule =
            BranchSchedule::from_row("fri,mon", "08:30", "22:00", "Asia/Phnom_Penh").unwrap();
        assert_eq!(schedule.to_human_readable(), "mon,fri 08:30-22:00");
    }
}
