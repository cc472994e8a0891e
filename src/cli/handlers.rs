use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::cli::args::{GroupCommands, UserCommands};
use crate::config::AppConfig;
use crate::db::repository::{GroupRepo, UserRepo};
use crate::error::{TrackError, TrackResult};
use crate::models::{Location, Period, PrayerType};
use crate::tracking::service::parse_month;
use crate::tracking::Tracker;
use crate::utils::format::{format_duration_secs, format_percentage, progress_bar};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

// ─── Identity ────────────────────────────────────────────────────────────────

/// The username the command runs as: `--user`, else `identity.user`.
pub fn caller(cli_user: Option<&str>, config: &AppConfig) -> TrackResult<String> {
    cli_user
        .map(str::to_string)
        .or_else(|| config.identity.user.clone())
        .ok_or_else(|| {
            TrackError::Configuration(
                "no user given: pass --user or set identity.user in config.toml".to_string(),
            )
        })
}

fn parse_date(raw: Option<&str>) -> TrackResult<NaiveDate> {
    match raw {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            TrackError::Configuration(format!("invalid date '{}', use YYYY-MM-DD", s))
        }),
    }
}

// ─── Times ───────────────────────────────────────────────────────────────────

pub fn handle_times(tracker: &Tracker, username: &str, date: Option<&str>) -> Result<()> {
    let user = tracker.resolve_user(username)?;
    let date = parse_date(date)?;
    let now = Local::now().naive_local();
    let status = tracker.day_status(&user, date, now)?;

    println!();
    println_colored!(GOLD, "  Prayer Times — {} ({})", status.location, status.date);
    println!();

    for slot in &status.prayers {
        let time_str = slot.start.format("%H:%M").to_string();
        let mark = if slot.marked { "✓" } else { " " };
        if status.open == Some(slot.prayer) {
            println_colored!(
                AMBER,
                "  {} {:<10}  {}  open until {}",
                mark,
                slot.prayer.display_name(),
                time_str,
                slot.end.format("%H:%M")
            );
        } else if slot.marked {
            println_colored!(GREEN, "  {} {:<10}  {}", mark, slot.prayer.display_name(), time_str);
        } else if slot.start < now {
            println_colored!(DIM, "  {} {:<10}  {}", mark, slot.prayer.display_name(), time_str);
        } else {
            println_colored!(BOLD, "  {} {:<10}  {}", mark, slot.prayer.display_name(), time_str);
        }
    }

    if let Some(next) = status.prayers.iter().find(|s| s.start > now) {
        let secs = (next.start - now).num_seconds();
        println!();
        println_colored!(
            AMBER,
            "  Next: {} in {}",
            next.prayer.display_name(),
            format_duration_secs(secs)
        );
    }
    println!();
    Ok(())
}

// ─── Mark prayer ─────────────────────────────────────────────────────────────

pub fn handle_mark(
    tracker: &Tracker,
    username: &str,
    prayer_str: &str,
    date: Option<&str>,
) -> Result<()> {
    let prayer = PrayerType::from_str(prayer_str).map_err(|_| {
        TrackError::Configuration(format!(
            "unknown prayer '{}', use: fajr, dhuhr, asr, maghrib, isha",
            prayer_str
        ))
    })?;
    let user = tracker.resolve_user(username)?;
    let date = parse_date(date)?;
    let now = Local::now().naive_local();

    let mark = tracker.attempt_mark(&user, prayer, date, now)?;
    println_colored!(
        GREEN,
        "  ✓ {} marked for {} at {}",
        mark.prayer.display_name(),
        mark.date,
        mark.marked_at.format("%H:%M")
    );
    Ok(())
}

// ─── Calendar ────────────────────────────────────────────────────────────────

pub fn handle_calendar(
    tracker: &Tracker,
    username: &str,
    month: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = tracker.resolve_user(username)?;
    let (year, month) = match month {
        Some(m) => parse_month(m)?,
        None => {
            let today = Local::now().date_naive();
            (today.year(), today.month())
        }
    };
    let marks = tracker.calendar(&user, year, month)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&marks)?);
        return Ok(());
    }

    let mut by_day: BTreeMap<NaiveDate, Vec<PrayerType>> = BTreeMap::new();
    for mark in &marks {
        by_day.entry(mark.date).or_default().push(mark.prayer);
    }

    println!();
    println_colored!(GOLD, "  {} — {}-{:02}", user.username, year, month);
    println!();
    if by_day.is_empty() {
        println_colored!(DIM, "  No prayers marked this month");
    }
    for (date, prayers) in &by_day {
        let dots: String = PrayerType::ALL
            .iter()
            .map(|p| if prayers.contains(p) { "● " } else { "○ " })
            .collect();
        println!("  {}  {} {}/5", date, dots, prayers.len());
    }
    println!();
    println_colored!(DIM, "  {} prayers marked", marks.len());
    println!();
    Ok(())
}

// ─── Progress ────────────────────────────────────────────────────────────────

pub fn handle_progress(tracker: &Tracker, group: &str, period: &str, json: bool) -> Result<()> {
    let period = Period::from_str(period)?;
    let now = Local::now().naive_local();
    let report = tracker.group_report(group, period, now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println_colored!(GOLD, "  {} — this {}", group, period.as_str());
    println!();
    if report.is_empty() {
        println_colored!(DIM, "  No members yet");
    }
    for (rank, entry) in report.iter().enumerate() {
        println!(
            "  {:>2}. {:<16} {}  {:>3}/{:<3} {:>6}",
            rank + 1,
            entry.username,
            progress_bar(entry.marked_count, entry.total_possible, 12),
            entry.marked_count,
            entry.total_possible,
            format_percentage(entry.percentage)
        );
    }
    println!();
    Ok(())
}

// ─── Users & groups ──────────────────────────────────────────────────────────

pub fn handle_user(
    conn: &Connection,
    config: &AppConfig,
    cli_user: Option<&str>,
    action: &UserCommands,
) -> Result<()> {
    match action {
        UserCommands::Add {
            name,
            location,
            group,
        } => {
            // Validate early so a bad location never gets stored.
            let parsed = Location::parse(location, &config.location.default_country)?;
            let group_id = match group {
                Some(g) => Some(
                    GroupRepo::find_by_name(conn, g)?
                        .ok_or_else(|| TrackError::Configuration(format!("unknown group '{}'", g)))?
                        .id,
                ),
                None => None,
            };
            UserRepo::create(conn, name, location, group_id)?;
            println_colored!(GREEN, "  ✓ Added {} ({})", name, parsed);
        }
        UserCommands::Join { group } => {
            let username = caller(cli_user, config)?;
            let user = UserRepo::find_by_name(conn, &username)?
                .ok_or_else(|| TrackError::Configuration(format!("unknown user '{}'", username)))?;
            let target = GroupRepo::find_by_name(conn, group)?
                .ok_or_else(|| TrackError::Configuration(format!("unknown group '{}'", group)))?;
            UserRepo::set_group(conn, user.id, target.id)?;
            println_colored!(GREEN, "  ✓ {} joined {}", user.username, target.name);
        }
        UserCommands::List => {
            let users = UserRepo::list(conn)?;
            let groups: BTreeMap<i64, String> = GroupRepo::list(conn)?
                .into_iter()
                .map(|g| (g.id, g.name))
                .collect();
            println!();
            for user in &users {
                let group = user
                    .group_id
                    .and_then(|id| groups.get(&id).cloned())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {:<16} {:<24} {}", user.username, user.location, group);
            }
            if users.is_empty() {
                println_colored!(DIM, "  No users registered");
            }
            println!();
        }
    }
    Ok(())
}

pub fn handle_group(conn: &Connection, action: &GroupCommands) -> Result<()> {
    match action {
        GroupCommands::Create { name } => {
            let group = GroupRepo::create(conn, name)?;
            println_colored!(GREEN, "  ✓ Created group {}", group.name);
        }
        GroupCommands::List => {
            let groups = GroupRepo::list(conn)?;
            println!();
            for group in &groups {
                let members = GroupRepo::members(conn, group.id)?;
                println!("  {:<20} {} members", group.name, members.len());
            }
            if groups.is_empty() {
                println_colored!(DIM, "  No groups yet");
            }
            println!();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_config_identity() {
        let mut config = AppConfig::default();
        config.identity.user = Some("amina".to_string());
        assert_eq!(caller(Some("omar"), &config).unwrap(), "omar");
        assert_eq!(caller(None, &config).unwrap(), "amina");
    }

    #[test]
    fn missing_identity_is_configuration_error() {
        let config = AppConfig::default();
        assert!(matches!(
            caller(None, &config),
            Err(TrackError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date(Some("2024-02-30")).is_err());
        assert_eq!(
            parse_date(Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }
}
