use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS groups (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            location    TEXT NOT NULL,
            group_id    INTEGER REFERENCES groups(id),
            created_at  TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS marks (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL REFERENCES users(id),
            date         TEXT NOT NULL,
            prayer_type  TEXT NOT NULL CHECK(prayer_type IN ('fajr','dhuhr','asr','maghrib','isha')),
            marked_at    TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'done' CHECK(status IN ('done')),
            UNIQUE(user_id, date, prayer_type)
        );

        CREATE INDEX IF NOT EXISTS idx_marks_user_date ON marks(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_users_group ON users(group_id);
    ")?;
    Ok(())
}
