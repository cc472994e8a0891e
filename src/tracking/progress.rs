use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::models::{Mark, Period, ProgressEntry, User};

pub const PRAYERS_PER_DAY: u32 = 5;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Whole days from `start` to `now`, counting a started day as a full one.
pub fn days_passed(start: NaiveDateTime, now: NaiveDateTime) -> u32 {
    let elapsed = (now - start).num_milliseconds();
    if elapsed <= 0 {
        return 0;
    }
    ((elapsed + MS_PER_DAY - 1) / MS_PER_DAY) as u32
}

/// `marked / total` as a percentage rounded half-up to one decimal, capped at 100.
pub fn percentage(marked: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let (m, t) = (marked as u64, total as u64);
    let tenths = ((2_000 * m + t) / (2 * t)).min(1_000);
    tenths as f64 / 10.0
}

/// Rank `members` by how many prayers they marked in `period`.
///
/// Every member gets an entry, even without marks. Ties are broken by
/// username, then by id. Marks of non-members are ignored.
pub fn build_report(
    members: &[User],
    marks: &[Mark],
    period: Period,
    now: NaiveDateTime,
) -> Vec<ProgressEntry> {
    let start = period.start(now);
    let total_possible = PRAYERS_PER_DAY * days_passed(start, now);
    let (first_day, last_day) = (period.first_day(now), now.date());

    let mut counts: HashMap<i64, u32> = HashMap::new();
    for mark in marks
        .iter()
        .filter(|m| m.date >= first_day && m.date <= last_day)
    {
        *counts.entry(mark.user_id).or_default() += 1;
    }

    let mut report: Vec<ProgressEntry> = members
        .iter()
        .map(|member| {
            let marked_count = counts.get(&member.id).copied().unwrap_or(0);
            ProgressEntry {
                user_id: member.id,
                username: member.username.clone(),
                marked_count,
                total_possible,
                percentage: percentage(marked_count, total_possible),
            }
        })
        .collect();

    report.sort_by(|a, b| {
        b.marked_count
            .cmp(&a.marked_count)
            .then_with(|| a.username.cmp(&b.username))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    report
}
