//! When a prayer may be marked.
//!
//! A prayer's window opens at its own start time and closes at the start of
//! the next prayer. Isha has no successor and stays open until the last
//! millisecond of its calendar day.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{DailyTimings, PrayerType};

/// 23:59:59.999 on `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::milliseconds(1)
}

/// Half-open `[start, end)` window for `prayer`.
pub fn window(prayer: PrayerType, timings: &DailyTimings) -> (NaiveDateTime, NaiveDateTime) {
    let start = timings.get(prayer);
    let end = match prayer.next() {
        Some(next) => timings.get(next),
        None => end_of_day(start.date()),
    };
    (start, end)
}

/// Whether `prayer` may be marked at `now`.
///
/// Out-of-order timings anywhere in the day close every window, since
/// overlapping windows would let two prayers be marked at once.
pub fn can_mark(prayer: PrayerType, timings: &DailyTimings, now: NaiveDateTime) -> bool {
    if !timings.is_monotonic() {
        return false;
    }
    let (start, end) = window(prayer, timings);
    start <= now && now < end
}

/// The prayer whose window contains `now`, if any.
pub fn open_prayer(timings: &DailyTimings, now: NaiveDateTime) -> Option<PrayerType> {
    PrayerType::ALL
        .into_iter()
        .find(|p| can_mark(*p, timings, now))
}
