//! # Periods and Date Ranges
//!
//! Calendar math for report filters and the monthly report job. All values
//! are UTC; the clock is always passed in.
//!
//! ## Monthly Job Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Apr 30 23:59     May 1 08:59    May 1 09:00          May 31           │
//! │        │                │              │                  │             │
//! │   due_period = None ────┘              └── due_period = Some("2024-04") │
//! │                                             (every tick until May ends; │
//! │                                              the job_runs claim makes   │
//! │                                              only the first one act)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::ValidationError;

// =============================================================================
// Month Period
// =============================================================================

/// A calendar month, displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl MonthPeriod {
    /// The month containing `at`.
    pub fn containing(at: DateTime<Utc>) -> Self {
        MonthPeriod {
            year: at.year(),
            month: at.month(),
        }
    }

    /// The month before this one.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            MonthPeriod {
                year: self.year - 1,
                month: 12,
            }
        } else {
            MonthPeriod {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The month after this one.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            MonthPeriod {
                year: self.year + 1,
                month: 1,
            }
        } else {
            MonthPeriod {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First instant of the month.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `[start, next month start)`.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start(), self.next().start())
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthPeriod {
    type Err = ValidationError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "month".to_string(),
            reason: "expected YYYY-MM".to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(MonthPeriod { year, month })
    }
}

// =============================================================================
// Monthly Schedule
// =============================================================================

/// When the previous month's report becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlySchedule {
    /// Hour (UTC) on the first day of the month from which the report is due.
    pub report_hour: u32,
}

impl MonthlySchedule {
    pub fn new(report_hour: u32) -> Self {
        MonthlySchedule {
            report_hour: report_hour.min(23),
        }
    }

    /// Returns the period to report on if it is due at `now`.
    ///
    /// Due from the first day of the month at `report_hour` until the month
    /// ends. Whether it already ran is the caller's business (`job_runs`).
    pub fn due_period(&self, now: DateTime<Utc>) -> Option<MonthPeriod> {
        let current = MonthPeriod::containing(now);
        let due_at = current.start() + Duration::hours(self.report_hour as i64);
        (now >= due_at).then(|| current.previous())
    }
}

// =============================================================================
// Date Range Filters
// =============================================================================

/// Inclusive `[from, to]` filter on creation timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Parses optional query values.
    ///
    /// Both accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain
    /// date in `to` covers the whole day.
    ///
    /// ## Example
    /// ```rust
    /// use kiosk_core::period::DateRange;
    ///
    /// let range = DateRange::parse(Some("2024-05-01"), Some("2024-05-31")).unwrap();
    /// assert_eq!(range.to.unwrap().to_rfc3339(), "2024-05-31T23:59:59.999+00:00");
    /// ```
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, ValidationError> {
        let from = from
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound("from", s, false))
            .transpose()?;
        let to = to
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound("to", s, true))
            .transpose()?;
        Ok(DateRange { from, to })
    }

    /// Range covering exactly one month.
    pub fn month(period: MonthPeriod) -> Self {
        let (start, end) = period.bounds();
        DateRange {
            from: Some(start),
            to: Some(end - Duration::milliseconds(1)),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |f| at >= f) && self.to.map_or(true, |t| at <= t)
    }
}

fn parse_bound(field: &str, value: &str, end_of_day: bool) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD or an RFC 3339 timestamp".to_string(),
        }
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .unwrap_or(NaiveTime::MIN);
    Ok(date.and_time(time).and_utc())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_month_period_parses() {
        let period: MonthPeriod = "2024-05".parse().unwrap();
        assert_eq!(period, MonthPeriod { year: 2024, month: 5 });
        assert!("2024-13".parse::<MonthPeriod>().is_err());
        assert!("2024-5".parse::<MonthPeriod>().is_err());
        assert!("May 2024".parse::<MonthPeriod>().is_err());
    }

    #[test]
    fn test_previous_month_wraps_year() {
        let jan = MonthPeriod::containing(at(2024, 1, 15, 0, 0));
        assert_eq!(jan.previous().to_string(), "2023-12");
        assert_eq!(jan.next().to_string(), "2024-02");
    }

    #[test]
    fn test_bounds() {
        let (start, end) = MonthPeriod { year: 2024, month: 2 }.bounds();
        assert_eq!(start, at(2024, 2, 1, 0, 0));
        assert_eq!(end, at(2024, 3, 1, 0, 0));
    }

    #[test]
    fn test_due_period() {
        let schedule = MonthlySchedule::new(9);
        assert_eq!(schedule.due_period(at(2024, 5, 1, 8, 59)), None);
        assert_eq!(
            schedule.due_period(at(2024, 5, 1, 9, 0)).map(|p| p.to_string()),
            Some("2024-04".to_string())
        );
        // still due later in the month, e.g. after a restart
        assert_eq!(
            schedule.due_period(at(2024, 5, 17, 3, 0)).map(|p| p.to_string()),
            Some("2024-04".to_string())
        );
    }

    #[test]
    fn test_date_range_parsing() {
        let range = DateRange::parse(Some("2024-05-01"), Some("2024-05-02")).unwrap();
        assert_eq!(range.from, Some(at(2024, 5, 1, 0, 0)));
        assert!(range.contains(at(2024, 5, 2, 23, 30)));
        assert!(!range.contains(at(2024, 5, 3, 0, 0)));

        let range = DateRange::parse(None, Some("2024-05-02T10:00:00Z")).unwrap();
        assert!(!range.contains(at(2024, 5, 2, 11, 0)));

        assert!(DateRange::parse(Some("yesterday"), None).is_err());
        assert_eq!(DateRange::parse(Some(""), None).unwrap(), DateRange::default());
    }

    #[test]
    fn test_month_range() {
        let range = DateRange::month(MonthPeriod { year: 2024, month: 4 });
        assert!(range.contains(at(2024, 4, 30, 23, 59)));
        assert!(!range.contains(at(2024, 5, 1, 0, 0)));
    }
}
