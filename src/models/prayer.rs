use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerType {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerType {
    pub const ALL: [PrayerType; 5] = [
        PrayerType::Fajr,
        PrayerType::Dhuhr,
        PrayerType::Asr,
        PrayerType::Maghrib,
        PrayerType::Isha,
    ];

    /// The prayer whose start closes this prayer's window, if any is left today.
    pub fn next(&self) -> Option<PrayerType> {
        match self {
            PrayerType::Fajr => Some(PrayerType::Dhuhr),
            PrayerType::Dhuhr => Some(PrayerType::Asr),
            PrayerType::Asr => Some(PrayerType::Maghrib),
            PrayerType::Maghrib => Some(PrayerType::Isha),
            PrayerType::Isha => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerType::Fajr => "fajr",
            PrayerType::Dhuhr => "dhuhr",
            PrayerType::Asr => "asr",
            PrayerType::Maghrib => "maghrib",
            PrayerType::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerType::Fajr => "Fajr",
            PrayerType::Dhuhr => "Dhuhr",
            PrayerType::Asr => "Asr",
            PrayerType::Maghrib => "Maghrib",
            PrayerType::Isha => "Isha",
        }
    }
}

impl std::fmt::Display for PrayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fajr" => Ok(PrayerType::Fajr),
            "dhuhr" | "zuhr" | "dhuhur" => Ok(PrayerType::Dhuhr),
            "asr" => Ok(PrayerType::Asr),
            "maghrib" => Ok(PrayerType::Maghrib),
            "isha" => Ok(PrayerType::Isha),
            _ => Err(anyhow::anyhow!("Unknown prayer type: {}", s)),
        }
    }
}

/// One day's prayer start instants, in local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTimings {
    pub date: NaiveDate,
    times: BTreeMap<PrayerType, NaiveDateTime>,
}

impl DailyTimings {
    /// Build from a full set of instants. Returns `None` if any prayer is missing.
    pub fn new(date: NaiveDate, times: BTreeMap<PrayerType, NaiveDateTime>) -> Option<Self> {
        if PrayerType::ALL.iter().all(|p| times.contains_key(p)) {
            Some(Self { date, times })
        } else {
            None
        }
    }

    pub fn get(&self, prayer: PrayerType) -> NaiveDateTime {
        // Construction guarantees every prayer is present.
        self.times[&prayer]
    }

    /// Whether the instants strictly increase in prayer order.
    pub fn is_monotonic(&self) -> bool {
        PrayerType::ALL
            .windows(2)
            .all(|pair| self.get(pair[0]) < self.get(pair[1]))
    }
}
