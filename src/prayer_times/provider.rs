//! Boundary to the source of daily prayer times.
//!
//! A provider answers one question: at what local instants do the five
//! prayers begin on a given date in a given city. It holds no state between
//! calls and never retries; callers decide whether a failure is worth
//! repeating.

use chrono::{NaiveDate, NaiveTime};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::models::{DailyTimings, Location, PrayerType};

#[derive(Error, Debug)]
pub enum TimingsError {
    /// Network or transport failure reaching the source.
    #[error("timings source unreachable: {0}")]
    Transport(String),

    #[error("timings source timed out after {0}")]
    Timeout(String),

    /// The source answered, but not with five usable times.
    #[error("malformed timings response: {0}")]
    Malformed(String),

    #[error("no prayer times known for {0}")]
    UnknownLocation(String),

    /// The location's parameters cannot produce times; asking again won't help.
    #[error("cannot compute prayer times: {0}")]
    Unsupported(String),
}

/// Source of prayer start times.
///
/// Implementations must be `Send + Sync` so a single instance can serve
/// concurrent mark attempts.
pub trait TimingsProvider: Send + Sync {
    /// Short name used in logs (e.g. `"aladhan"`).
    fn name(&self) -> &'static str;

    fn fetch(&self, date: NaiveDate, location: &Location) -> Result<DailyTimings, TimingsError>;
}

/// Parse one clock reading such as `"05:07"` or `"05:07 (EET)"`.
pub fn parse_clock(raw: &str) -> Result<NaiveTime, TimingsError> {
    let clock = raw.split_whitespace().next().unwrap_or("");
    NaiveTime::parse_from_str(clock, "%H:%M")
        .map_err(|e| TimingsError::Malformed(format!("bad time '{}': {}", raw, e)))
}

/// Anchor a name → `"HH:MM"` table to `date`.
///
/// Keys are matched case-insensitively against the prayer names, so both
/// `"Dhuhr"` and `"dhuhr"` work; unrelated keys such as `"Sunrise"` are
/// ignored. Every prayer must be present.
pub fn timings_from_clock(
    date: NaiveDate,
    raw: &HashMap<String, String>,
) -> Result<DailyTimings, TimingsError> {
    let mut times = BTreeMap::new();
    for prayer in PrayerType::ALL {
        let value = raw
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(prayer.as_str()))
            .map(|(_, v)| v)
            .ok_or_else(|| {
                TimingsError::Malformed(format!("missing time for {}", prayer.display_name()))
            })?;
        times.insert(prayer, date.and_time(parse_clock(value)?));
    }
    DailyTimings::new(date, times)
        .ok_or_else(|| TimingsError::Malformed("incomplete timings".to_string()))
}
