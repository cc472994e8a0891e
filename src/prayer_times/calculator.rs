use chrono::{FixedOffset, NaiveDate};
use salah::prelude::*;
use std::collections::BTreeMap;

use crate::config::settings::KnownLocation;
use crate::models::{DailyTimings, Location, PrayerType};
use crate::prayer_times::provider::{TimingsError, TimingsProvider};

/// Offline provider: computes times astronomically for configured locations.
pub struct SalahProvider {
    locations: Vec<KnownLocation>,
}

impl SalahProvider {
    /// Rejects unknown methods and madhabs up front.
    pub fn new(locations: Vec<KnownLocation>) -> anyhow::Result<Self> {
        for loc in &locations {
            parse_method(&loc.calc_method)?;
            parse_madhab(&loc.madhab)?;
            FixedOffset::east_opt(loc.timezone_offset * 60).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid timezone offset for {}: {}",
                    loc.city,
                    loc.timezone_offset
                )
            })?;
        }
        Ok(Self { locations })
    }

    fn find(&self, location: &Location) -> Option<&KnownLocation> {
        self.locations.iter().find(|l| {
            l.city.eq_ignore_ascii_case(&location.city)
                && l.country.eq_ignore_ascii_case(&location.country)
        })
    }

    fn compute_times(
        &self,
        known: &KnownLocation,
        date: NaiveDate,
    ) -> anyhow::Result<DailyTimings> {
        let coords = Coordinates::new(known.latitude, known.longitude);
        let method = parse_method(&known.calc_method)?;
        let madhab = parse_madhab(&known.madhab)?;
        let params = Configuration::with(method, madhab);

        let times = PrayerSchedule::new()
            .on(date)
            .for_location(coords)
            .with_configuration(params)
            .calculate()
            .map_err(|e| anyhow::anyhow!("Prayer calculation failed: {}", e))?;

        let offset = FixedOffset::east_opt(known.timezone_offset * 60)
            .ok_or_else(|| anyhow::anyhow!("Invalid timezone offset: {}", known.timezone_offset))?;

        // Keep the local clock reading but pin it to the requested date.
        let to_local = |utc: chrono::DateTime<chrono::Utc>| {
            date.and_time(utc.with_timezone(&offset).time())
        };

        let mut map = BTreeMap::new();
        map.insert(PrayerType::Fajr, to_local(times.time(Prayer::Fajr)));
        map.insert(PrayerType::Dhuhr, to_local(times.time(Prayer::Dhuhr)));
        map.insert(PrayerType::Asr, to_local(times.time(Prayer::Asr)));
        map.insert(PrayerType::Maghrib, to_local(times.time(Prayer::Maghrib)));
        map.insert(PrayerType::Isha, to_local(times.time(Prayer::Isha)));

        DailyTimings::new(date, map).ok_or_else(|| anyhow::anyhow!("incomplete timings"))
    }
}

impl TimingsProvider for SalahProvider {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn fetch(&self, date: NaiveDate, location: &Location) -> Result<DailyTimings, TimingsError> {
        let known = self
            .find(location)
            .ok_or_else(|| TimingsError::UnknownLocation(location.to_string()))?;
        self.compute_times(known, date)
            .map_err(|e| TimingsError::Unsupported(format!("{}: {:#}", location, e)))
    }
}

fn parse_method(s: &str) -> anyhow::Result<Method> {
    match s {
        "MuslimWorldLeague" => Ok(Method::MuslimWorldLeague),
        "Egyptian" => Ok(Method::Egyptian),
        "Karachi" => Ok(Method::Karachi),
        "UmmAlQura" => Ok(Method::UmmAlQura),
        "Dubai" => Ok(Method::Dubai),
        "MoonsightingCommittee" => Ok(Method::MoonsightingCommittee),
        "NorthAmerica" => Ok(Method::NorthAmerica),
        "Kuwait" => Ok(Method::Kuwait),
        "Qatar" => Ok(Method::Qatar),
        "Singapore" => Ok(Method::Singapore),
        "Tehran" => Ok(Method::Tehran),
        "Turkey" => Ok(Method::Turkey),
        "Other" => Ok(Method::Other),
        _ => Err(anyhow::anyhow!("Unknown calculation method: '{}'", s)),
    }
}

fn parse_madhab(s: &str) -> anyhow::Result<Madhab> {
    match s {
        "Hanafi" => Ok(Madhab::Hanafi),
        "Shafi" | "Shafi'i" => Ok(Madhab::Shafi),
        _ => Err(anyhow::anyhow!("Unknown madhab: '{}'", s)),
    }
}
