use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::repository::{GroupRepo, MarkRepo, UserRepo};
use crate::error::{TrackError, TrackResult};
use crate::models::{DailyTimings, Location, Mark, Period, PrayerType, ProgressEntry, User};
use crate::prayer_times::TimingsProvider;
use crate::tracking::{progress, window};

/// Today's picture for one user.
#[derive(Debug, Clone, Serialize)]
pub struct DayStatus {
    pub date: NaiveDate,
    pub location: String,
    pub prayers: Vec<PrayerSlot>,
    pub open: Option<PrayerType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrayerSlot {
    pub prayer: PrayerType,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub marked: bool,
}

/// Request-level operations over storage and a timings source.
pub struct Tracker<'a> {
    conn: &'a Connection,
    provider: &'a dyn TimingsProvider,
    default_country: String,
}

impl<'a> Tracker<'a> {
    pub fn new(
        conn: &'a Connection,
        provider: &'a dyn TimingsProvider,
        default_country: &str,
    ) -> Self {
        Self {
            conn,
            provider,
            default_country: default_country.to_string(),
        }
    }

    pub fn resolve_user(&self, username: &str) -> TrackResult<User> {
        UserRepo::find_by_name(self.conn, username)?
            .ok_or_else(|| TrackError::Configuration(format!("unknown user '{}'", username)))
    }

    pub fn location_of(&self, user: &User) -> TrackResult<Location> {
        Location::parse(&user.location, &self.default_country)
    }

    pub fn timings_for(&self, location: &Location, date: NaiveDate) -> TrackResult<DailyTimings> {
        let timings = self.provider.fetch(date, location)?;
        if !timings.is_monotonic() {
            log::warn!(
                "{} returned out-of-order timings for {} on {}",
                self.provider.name(),
                location,
                date
            );
        }
        Ok(timings)
    }

    /// Mark `prayer` on `date` for `user`, if `now` falls inside its window.
    pub fn attempt_mark(
        &self,
        user: &User,
        prayer: PrayerType,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> TrackResult<Mark> {
        let timings = self.timings_for(&self.location_of(user)?, date)?;
        if !window::can_mark(prayer, &timings, now) {
            log::info!("{} tried {} on {} outside its window", user.username, prayer, date);
            return Err(TrackError::OutOfWindow { prayer, date });
        }
        let mark = MarkRepo::record(self.conn, user.id, date, prayer, now)?;
        log::info!("{} marked {} on {}", user.username, prayer, date);
        Ok(mark)
    }

    /// Every mark `user` has in the given calendar month.
    pub fn calendar(&self, user: &User, year: i32, month: u32) -> TrackResult<Vec<Mark>> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            TrackError::Configuration(format!("invalid month {}-{:02}", year, month))
        })?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| TrackError::Configuration(format!("month out of range: {}", first)))?;
        MarkRepo::list(self.conn, user.id, first, next)
    }

    pub fn day_status(
        &self,
        user: &User,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> TrackResult<DayStatus> {
        let location = self.location_of(user)?;
        let timings = self.timings_for(&location, date)?;
        let next_day = date.succ_opt().unwrap_or(date);
        let marked: Vec<PrayerType> = MarkRepo::list(self.conn, user.id, date, next_day)?
            .into_iter()
            .map(|m| m.prayer)
            .collect();

        let prayers = PrayerType::ALL
            .into_iter()
            .map(|prayer| {
                let (start, end) = window::window(prayer, &timings);
                PrayerSlot {
                    prayer,
                    start,
                    end,
                    marked: marked.contains(&prayer),
                }
            })
            .collect();

        Ok(DayStatus {
            date,
            location: location.to_string(),
            prayers,
            open: window::open_prayer(&timings, now),
        })
    }

    pub fn group_report(
        &self,
        group_name: &str,
        period: Period,
        now: NaiveDateTime,
    ) -> TrackResult<Vec<ProgressEntry>> {
        let group = GroupRepo::find_by_name(self.conn, group_name)?.ok_or_else(|| {
            TrackError::Configuration(format!("unknown group '{}'", group_name))
        })?;
        let members = GroupRepo::members(self.conn, group.id)?;
        let start = period.start(now);
        let marks =
            MarkRepo::list_for_group(self.conn, group.id, period.first_day(now), now.date())?;
        log::debug!(
            "{} report for '{}': {} members, {} marks since {}",
            period.as_str(),
            group.name,
            members.len(),
            marks.len(),
            start
        );
        Ok(progress::build_report(&members, &marks, period, now))
    }
}

/// Parse `YYYY-MM` into a year and month.
pub fn parse_month(raw: &str) -> TrackResult<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
        .map_err(|_| TrackError::Configuration(format!("invalid month '{}', use YYYY-MM", raw)))?;
    Ok((date.year(), date.month()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::prayer_times::TimingsError;
    use crate::prayer_times::provider::timings_from_clock;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns the same clock table for any date, recording what it was asked.
    struct FixedProvider {
        clock: HashMap<String, String>,
        asked: Mutex<Vec<(NaiveDate, Location)>>,
    }

    impl FixedProvider {
        fn standard() -> Self {
            let clock = [
                ("Fajr", "05:00"),
                ("Dhuhr", "12:00"),
                ("Asr", "15:30"),
                ("Maghrib", "18:00"),
                ("Isha", "19:30"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
            Self {
                clock,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl TimingsProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fetch(&self, date: NaiveDate, location: &Location) -> Result<DailyTimings, TimingsError> {
            self.asked.lock().unwrap().push((date, location.clone()));
            timings_from_clock(date, &self.clock)
        }
    }

    struct DownProvider;

    impl TimingsProvider for DownProvider {
        fn name(&self) -> &'static str {
            "down"
        }

        fn fetch(&self, _date: NaiveDate, _location: &Location) -> Result<DailyTimings, TimingsError> {
            Err(TimingsError::Timeout("10s".to_string()))
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn mark_inside_window_is_recorded() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");
        let user = UserRepo::create(&conn, "amina", "Alexandria", None).unwrap();

        let mark = tracker
            .attempt_mark(&user, PrayerType::Dhuhr, day(1), at(1, 12, 0))
            .unwrap();
        assert_eq!(mark.prayer, PrayerType::Dhuhr);
        assert_eq!(mark.marked_at, at(1, 12, 0));

        let asked = provider.asked.lock().unwrap();
        assert_eq!(asked[0].0, day(1));
        assert_eq!(asked[0].1.city, "Alexandria");
        assert_eq!(asked[0].1.country, "Egypt");
    }

    #[test]
    fn mark_outside_window_is_rejected_and_not_stored() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");
        let user = UserRepo::create(&conn, "amina", "Cairo, Egypt", None).unwrap();

        let err = tracker
            .attempt_mark(&user, PrayerType::Fajr, day(1), at(1, 12, 30))
            .unwrap_err();
        assert!(matches!(err, TrackError::OutOfWindow { prayer: PrayerType::Fajr, .. }));
        assert!(tracker.calendar(&user, 2024, 3).unwrap().is_empty());
    }

    #[test]
    fn retrying_after_success_reports_duplicate() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");
        let user = UserRepo::create(&conn, "amina", "Cairo", None).unwrap();

        tracker
            .attempt_mark(&user, PrayerType::Isha, day(1), at(1, 21, 0))
            .unwrap();
        let err = tracker
            .attempt_mark(&user, PrayerType::Isha, day(1), at(1, 22, 0))
            .unwrap_err();
        assert!(matches!(err, TrackError::AlreadyMarked { .. }));
    }

    #[test]
    fn provider_outage_is_retryable() {
        let conn = memory_db();
        let tracker = Tracker::new(&conn, &DownProvider, "Egypt");
        let user = UserRepo::create(&conn, "amina", "Cairo", None).unwrap();

        let err = tracker
            .attempt_mark(&user, PrayerType::Dhuhr, day(1), at(1, 12, 30))
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn past_date_cannot_be_marked_today() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");
        let user = UserRepo::create(&conn, "amina", "Cairo", None).unwrap();

        let err = tracker
            .attempt_mark(&user, PrayerType::Dhuhr, day(1), at(2, 12, 30))
            .unwrap_err();
        assert!(matches!(err, TrackError::OutOfWindow { .. }));
    }

    #[test]
    fn unknown_references_are_configuration_errors() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");

        assert!(matches!(
            tracker.resolve_user("nobody"),
            Err(TrackError::Configuration(_))
        ));
        assert!(matches!(
            tracker.group_report("nowhere", Period::Week, at(8, 0, 0)),
            Err(TrackError::Configuration(_))
        ));

        let user = UserRepo::create(&conn, "amina", "", None).unwrap();
        assert!(matches!(
            tracker.attempt_mark(&user, PrayerType::Dhuhr, day(1), at(1, 12, 30)),
            Err(TrackError::Configuration(_))
        ));
    }

    #[test]
    fn day_status_shows_marks_and_open_window() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");
        let user = UserRepo::create(&conn, "amina", "Cairo", None).unwrap();
        tracker
            .attempt_mark(&user, PrayerType::Fajr, day(1), at(1, 5, 10))
            .unwrap();

        let status = tracker.day_status(&user, day(1), at(1, 16, 0)).unwrap();
        assert_eq!(status.location, "Cairo, Egypt");
        assert_eq!(status.open, Some(PrayerType::Asr));
        assert!(status.prayers[0].marked);
        assert!(!status.prayers[2].marked);
        assert_eq!(status.prayers[4].end, window::end_of_day(day(1)));

        // One fetch for the mark, one for the status.
        let asked = provider.asked.lock().unwrap();
        assert_eq!(asked.len(), 2);
        assert_eq!(asked[1].1.to_string(), status.location);
    }

    #[test]
    fn calendar_covers_one_month() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");
        let user = UserRepo::create(&conn, "amina", "Cairo", None).unwrap();
        MarkRepo::record(&conn, user.id, day(31), PrayerType::Isha, at(31, 20, 0)).unwrap();
        let april = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        MarkRepo::record(&conn, user.id, april, PrayerType::Fajr, april.and_hms_opt(5, 0, 0).unwrap())
            .unwrap();

        let march = tracker.calendar(&user, 2024, 3).unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].date, day(31));
        assert!(matches!(
            tracker.calendar(&user, 2024, 13),
            Err(TrackError::Configuration(_))
        ));
    }

    #[test]
    fn group_report_reads_membership_and_marks() {
        let conn = memory_db();
        let provider = FixedProvider::standard();
        let tracker = Tracker::new(&conn, &provider, "Egypt");
        let group = GroupRepo::create(&conn, "masjid").unwrap();
        let amina = UserRepo::create(&conn, "amina", "Cairo", Some(group.id)).unwrap();
        UserRepo::create(&conn, "bilal", "Cairo", Some(group.id)).unwrap();

        for d in 1..=3 {
            MarkRepo::record(&conn, amina.id, day(d), PrayerType::Fajr, at(d, 5, 0)).unwrap();
        }

        let report = tracker
            .group_report("masjid", Period::Week, at(8, 12, 30))
            .unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].username, "amina");
        assert_eq!(report[0].marked_count, 2);
        assert_eq!(report[0].total_possible, 35);
        assert_eq!(report[1].marked_count, 0);
    }

    #[test]
    fn parses_year_month() {
        assert_eq!(parse_month("2024-03").unwrap(), (2024, 3));
        assert!(parse_month("2024-3x").is_err());
        assert!(parse_month("March").is_err());
    }
}
