//! SQLite schema.
//!
//! Migrations are plain SQL scripts applied in order. The number applied so
//! far lives in `PRAGMA user_version`, so opening a database twice is a no-op.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Scripts, oldest first. Never edit one that has shipped; append a new one.
const MIGRATIONS: &[&str] = &[
    // 1: chain snapshots, anchor cursors, registered users.
    r#"
    CREATE TABLE event_chains (
        subject     TEXT PRIMARY KEY,
        version     INTEGER NOT NULL,
        chain_json  TEXT NOT NULL,
        event_count INTEGER NOT NULL,
        updated_at  INTEGER NOT NULL
    );

    CREATE TABLE anchor_cursors (
        subject    TEXT PRIMARY KEY,
        last_hash  TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE registered_users (
        address    TEXT PRIMARY KEY,
        public_key TEXT NOT NULL,
        email      TEXT NOT NULL,
        role       TEXT NOT NULL,
        approved   INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX idx_registered_users_email ON registered_users(email);
    "#,
];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// Each pending script runs in its own transaction together with the
/// version bump. A database written by a newer build is refused.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let applied = schema_version(conn)?;
    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema version {applied} is newer than this build ({CURRENT_VERSION})"
        )));
    }

    for (index, script) in MIGRATIONS.iter().enumerate().skip(applied as usize) {
        let version = index as u32 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::debug!(version, "applied schema migration");
    }
    Ok(())
}

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
