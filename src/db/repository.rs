use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

use crate::error::{TrackError, TrackResult};
use crate::models::{Group, Mark, MarkStatus, PrayerType, User};

const DATE_FMT: &str = "%Y-%m-%d";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

// ─── Users ──────────────────────────────────────────────────────────────────

pub struct UserRepo;

impl UserRepo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            location: row.get(2)?,
            group_id: row.get(3)?,
        })
    }

    pub fn create(
        conn: &Connection,
        username: &str,
        location: &str,
        group_id: Option<i64>,
    ) -> TrackResult<User> {
        let inserted = conn
            .execute(
                "INSERT INTO users (username, location, group_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO NOTHING",
                params![username, location, group_id],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    TrackError::Configuration(format!("unknown group id {:?}", group_id))
                } else {
                    e.into()
                }
            })?;
        if inserted == 0 {
            return Err(TrackError::Configuration(format!(
                "user '{}' already exists",
                username
            )));
        }
        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            location: location.to_string(),
            group_id,
        })
    }

    pub fn find_by_name(conn: &Connection, username: &str) -> TrackResult<Option<User>> {
        let user = conn
            .query_row(
                "SELECT id, username, location, group_id FROM users WHERE username = ?1",
                params![username],
                Self::from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list(conn: &Connection) -> TrackResult<Vec<User>> {
        let mut stmt = conn.prepare(
            "SELECT id, username, location, group_id FROM users ORDER BY username, id",
        )?;
        let users = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Move a user into `group_id`, replacing any previous membership.
    pub fn set_group(conn: &Connection, user_id: i64, group_id: i64) -> TrackResult<()> {
        let updated = conn
            .execute(
                "UPDATE users SET group_id = ?1 WHERE id = ?2",
                params![group_id, user_id],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    TrackError::Configuration(format!("unknown group id {}", group_id))
                } else {
                    e.into()
                }
            })?;
        if updated == 0 {
            return Err(TrackError::Configuration(format!(
                "unknown user id {}",
                user_id
            )));
        }
        Ok(())
    }
}

// ─── Groups ─────────────────────────────────────────────────────────────────

pub struct GroupRepo;

impl GroupRepo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
        Ok(Group {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    pub fn create(conn: &Connection, name: &str) -> TrackResult<Group> {
        let inserted = conn.execute(
            "INSERT INTO groups (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        if inserted == 0 {
            return Err(TrackError::Configuration(format!(
                "group '{}' already exists",
                name
            )));
        }
        Ok(Group {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> TrackResult<Option<Group>> {
        let group = conn
            .query_row(
                "SELECT id, name FROM groups WHERE name = ?1",
                params![name],
                Self::from_row,
            )
            .optional()?;
        Ok(group)
    }

    pub fn list(conn: &Connection) -> TrackResult<Vec<Group>> {
        let mut stmt = conn.prepare("SELECT id, name FROM groups ORDER BY name")?;
        let groups = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn members(conn: &Connection, group_id: i64) -> TrackResult<Vec<User>> {
        let mut stmt = conn.prepare(
            "SELECT id, username, location, group_id FROM users
             WHERE group_id = ?1 ORDER BY username, id",
        )?;
        let users = stmt
            .query_map(params![group_id], UserRepo::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

// ─── Marks ──────────────────────────────────────────────────────────────────

/// Append-only ledger of prayer marks.
///
/// Uniqueness of `(user_id, date, prayer)` is held by the table constraint;
/// `record` relies on the insert itself rather than a prior lookup.
pub struct MarkRepo;

impl MarkRepo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Mark> {
        let date: String = row.get(2)?;
        let prayer: String = row.get(3)?;
        let marked_at: String = row.get(4)?;
        let status: String = row.get(5)?;
        Ok(Mark {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: NaiveDate::parse_from_str(&date, DATE_FMT).map_err(|e| conversion_error(2, e))?,
            prayer: PrayerType::from_str(&prayer).map_err(|e| conversion_error(3, e))?,
            marked_at: NaiveDateTime::parse_from_str(&marked_at, TIMESTAMP_FMT)
                .map_err(|e| conversion_error(4, e))?,
            status: MarkStatus::from_str(&status).map_err(|e| conversion_error(5, e))?,
        })
    }

    pub fn record(
        conn: &Connection,
        user_id: i64,
        date: NaiveDate,
        prayer: PrayerType,
        marked_at: NaiveDateTime,
    ) -> TrackResult<Mark> {
        let status = MarkStatus::Done;
        let inserted = conn
            .execute(
                "INSERT INTO marks (user_id, date, prayer_type, marked_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, date, prayer_type) DO NOTHING",
                params![
                    user_id,
                    date.format(DATE_FMT).to_string(),
                    prayer.as_str(),
                    marked_at.format(TIMESTAMP_FMT).to_string(),
                    status.as_str(),
                ],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    TrackError::Configuration(format!("unknown user id {}", user_id))
                } else {
                    e.into()
                }
            })?;

        if inserted == 0 {
            return Err(TrackError::AlreadyMarked { prayer, date });
        }

        Ok(Mark {
            id: conn.last_insert_rowid(),
            user_id,
            date,
            prayer,
            marked_at,
            status,
        })
    }

    /// Marks with `start <= date < end`, in day then prayer order.
    pub fn list(
        conn: &Connection,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> TrackResult<Vec<Mark>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, date, prayer_type, marked_at, status
             FROM marks WHERE user_id = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date, CASE prayer_type
               WHEN 'fajr' THEN 1 WHEN 'dhuhr' THEN 2 WHEN 'asr' THEN 3
               WHEN 'maghrib' THEN 4 WHEN 'isha' THEN 5 END",
        )?;
        let marks = stmt
            .query_map(
                params![
                    user_id,
                    start.format(DATE_FMT).to_string(),
                    end.format(DATE_FMT).to_string()
                ],
                Self::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(marks)
    }

    /// Marks of every current member of `group_id` with `start <= date <= end`.
    pub fn list_for_group(
        conn: &Connection,
        group_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> TrackResult<Vec<Mark>> {
        let mut stmt = conn.prepare(
            "SELECT m.id, m.user_id, m.date, m.prayer_type, m.marked_at, m.status
             FROM marks m JOIN users u ON u.id = m.user_id
             WHERE u.group_id = ?1 AND m.date >= ?2 AND m.date <= ?3
             ORDER BY m.user_id, m.date",
        )?;
        let marks = stmt
            .query_map(
                params![
                    group_id,
                    start.format(DATE_FMT).to_string(),
                    end.format(DATE_FMT).to_string()
                ],
                Self::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::migrations::run_migrations;
    use std::sync::{Arc, Barrier};

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
    fn second_mark_for_same_prayer_is_rejected() {
        let conn = memory_db();
        let user = UserRepo::create(&conn, "amina", "Cairo, Egypt", None).unwrap();

        let mark = MarkRepo::record(&conn, user.id, day(1), PrayerType::Dhuhr, at(1, 12, 0)).unwrap();
        assert_eq!(mark.status, MarkStatus::Done);

        let err = MarkRepo::record(&conn, user.id, day(1), PrayerType::Dhuhr, at(1, 12, 5))
            .unwrap_err();
        assert!(matches!(
            err,
            TrackError::AlreadyMarked { prayer: PrayerType::Dhuhr, .. }
        ));

        // Same prayer on another day, or another prayer on the same day, is fine.
        MarkRepo::record(&conn, user.id, day(2), PrayerType::Dhuhr, at(2, 12, 0)).unwrap();
        MarkRepo::record(&conn, user.id, day(1), PrayerType::Asr, at(1, 15, 40)).unwrap();
    }

    #[test]
    fn unknown_user_cannot_mark() {
        let conn = memory_db();
        let err = MarkRepo::record(&conn, 42, day(1), PrayerType::Fajr, at(1, 5, 0)).unwrap_err();
        assert!(matches!(err, TrackError::Configuration(_)));
    }

    #[test]
    fn list_is_half_open_and_ordered() {
        let conn = memory_db();
        let user = UserRepo::create(&conn, "amina", "Cairo", None).unwrap();
        MarkRepo::record(&conn, user.id, day(1), PrayerType::Isha, at(1, 20, 0)).unwrap();
        MarkRepo::record(&conn, user.id, day(1), PrayerType::Fajr, at(1, 5, 0)).unwrap();
        MarkRepo::record(&conn, user.id, day(2), PrayerType::Asr, at(2, 15, 40)).unwrap();
        MarkRepo::record(&conn, user.id, day(3), PrayerType::Fajr, at(3, 5, 0)).unwrap();

        let marks = MarkRepo::list(&conn, user.id, day(1), day(3)).unwrap();
        let got: Vec<_> = marks.iter().map(|m| (m.date, m.prayer)).collect();
        assert_eq!(
            got,
            vec![
                (day(1), PrayerType::Fajr),
                (day(1), PrayerType::Isha),
                (day(2), PrayerType::Asr),
            ]
        );
        assert_eq!(marks[0].marked_at, at(1, 5, 0));
    }

    #[test]
    fn group_listing_only_covers_members() {
        let conn = memory_db();
        let group = GroupRepo::create(&conn, "masjid").unwrap();
        let member = UserRepo::create(&conn, "amina", "Cairo", Some(group.id)).unwrap();
        let outsider = UserRepo::create(&conn, "omar", "Cairo", None).unwrap();
        MarkRepo::record(&conn, member.id, day(2), PrayerType::Fajr, at(2, 5, 0)).unwrap();
        MarkRepo::record(&conn, outsider.id, day(2), PrayerType::Fajr, at(2, 5, 0)).unwrap();

        let marks = MarkRepo::list_for_group(&conn, group.id, day(1), day(2)).unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].user_id, member.id);

        let members = GroupRepo::members(&conn, group.id).unwrap();
        assert_eq!(members, vec![member]);
    }

    #[test]
    fn duplicate_names_are_configuration_errors() {
        let conn = memory_db();
        GroupRepo::create(&conn, "masjid").unwrap();
        assert!(matches!(
            GroupRepo::create(&conn, "masjid"),
            Err(TrackError::Configuration(_))
        ));
        UserRepo::create(&conn, "amina", "Cairo", None).unwrap();
        assert!(matches!(
            UserRepo::create(&conn, "amina", "Giza", None),
            Err(TrackError::Configuration(_))
        ));
        assert!(matches!(
            UserRepo::create(&conn, "omar", "Giza", Some(99)),
            Err(TrackError::Configuration(_))
        ));
    }

    #[test]
    fn set_group_moves_membership() {
        let conn = memory_db();
        let a = GroupRepo::create(&conn, "a").unwrap();
        let b = GroupRepo::create(&conn, "b").unwrap();
        let user = UserRepo::create(&conn, "amina", "Cairo", Some(a.id)).unwrap();

        UserRepo::set_group(&conn, user.id, b.id).unwrap();
        assert!(GroupRepo::members(&conn, a.id).unwrap().is_empty());
        assert_eq!(GroupRepo::members(&conn, b.id).unwrap().len(), 1);
        assert!(matches!(
            UserRepo::set_group(&conn, 999, b.id),
            Err(TrackError::Configuration(_))
        ));
    }

    #[test]
    fn concurrent_marks_yield_exactly_one_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        // Out-of-the-box storage settings, as used when config.toml is absent.
        let storage = AppConfig::from_toml("").unwrap().storage;
        assert!(storage.busy_timeout_ms > 0);

        let user_id = {
            let conn = crate::db::open(&path, &storage).unwrap();
            run_migrations(&conn).unwrap();
            UserRepo::create(&conn, "amina", "Cairo", None).unwrap().id
        };

        const WRITERS: usize = 16;
        let barrier = Arc::new(Barrier::new(WRITERS));
        let results: Vec<TrackResult<Mark>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..WRITERS)
                .map(|_| {
                    let barrier = Arc::clone(&barrier);
                    let path = path.clone();
                    let storage = storage.clone();
                    s.spawn(move || {
                        let conn = crate::db::open(&path, &storage).unwrap();
                        barrier.wait();
                        MarkRepo::record(&conn, user_id, day(1), PrayerType::Asr, at(1, 15, 31))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let dupes = results
            .iter()
            .filter(|r| matches!(r, Err(TrackError::AlreadyMarked { .. })))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(dupes, WRITERS - 1);
    }
}
