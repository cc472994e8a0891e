use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TrackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    Month,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    /// Instant at which the reporting period begins.
    ///
    /// A week reaches back exactly 7×24h from `now`; a month starts at local
    /// midnight of its first calendar day.
    pub fn start(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            Period::Week => now - Duration::days(7),
            Period::Month => now
                .date()
                .with_day(1)
                .unwrap_or(now.date())
                .and_time(NaiveTime::MIN),
        }
    }

    /// Earliest mark date counted in the period.
    ///
    /// A week counts the seven calendar dates ending on `now`'s date, so the
    /// dates counted never outnumber the days in the denominator.
    pub fn first_day(&self, now: NaiveDateTime) -> NaiveDate {
        let start = self.start(now);
        match self {
            Period::Week => start.date().succ_opt().unwrap_or(start.date()),
            Period::Month => start.date(),
        }
    }
}

impl FromStr for Period {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            _ => Err(TrackError::Configuration(format!(
                "unknown period '{}', expected week or month",
                s
            ))),
        }
    }
}

/// One member's line in a group report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub user_id: i64,
    pub username: String,
    pub marked_count: u32,
    pub total_possible: u32,
    pub percentage: f64,
}
