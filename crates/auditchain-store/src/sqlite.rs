//! SQLite implementation of the store traits.
//!
//! The primary backend. Uses rusqlite with bundled SQLite, wrapped in async
//! via `tokio::task::spawn_blocking`. Chain saves and cursor moves are single
//! conditional statements, so the compare-and-swap holds for every process
//! sharing the database file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use auditchain_core::{Address, AnchorCursor, Blake3Hash, Ed25519PublicKey, EventChain};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{AuthorizationLookup, ChainStore, UserRecord, VersionedChain};

/// SQLite-based store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path, creating and migrating it
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or replace a user record.
    pub async fn put_user(&self, user: UserRecord) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO registered_users (address, public_key, email, role, approved)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(address) DO UPDATE SET
                    public_key = excluded.public_key,
                    email = excluded.email,
                    role = excluded.role,
                    approved = excluded.approved",
                params![
                    user.address.as_str(),
                    user.public_key.to_hex(),
                    user.email,
                    user.role.as_str(),
                    user.approved,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

fn current_version(conn: &Connection, subject: &str) -> Result<u64> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM event_chains WHERE subject = ?1",
            params![subject],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0) as u64)
}

fn parse_address(s: &str) -> Result<Address> {
    Address::parse(s).map_err(|e| StoreError::InvalidData(format!("stored address {s}: {e}")))
}

fn parse_hash(s: &str) -> Result<Blake3Hash> {
    Blake3Hash::from_hex(s).map_err(|e| StoreError::InvalidData(format!("stored hash: {e}")))
}

#[async_trait]
impl ChainStore for SqliteStore {
    async fn load_chain(&self, subject: &Address) -> Result<Option<VersionedChain>> {
        let subject = subject.clone();

        self.run(move |conn| {
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT version, chain_json FROM event_chains WHERE subject = ?1",
                    params![subject.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((version, json)) = row else {
                return Ok(None);
            };

            let chain: EventChain = serde_json::from_str(&json)?;
            if chain.subject() != &subject {
                return Err(StoreError::InvalidData(format!(
                    "chain stored under {} belongs to {}",
                    subject,
                    chain.subject()
                )));
            }

            Ok(Some(VersionedChain {
                version: version as u64,
                chain,
            }))
        })
        .await
    }

    async fn save_chain(&self, expected_version: u64, chain: &EventChain) -> Result<u64> {
        let subject = chain.subject().to_string();
        let json = serde_json::to_string(chain)?;
        let event_count = chain.len() as i64;

        self.run(move |conn| {
            let now = now_millis();
            let new_version = expected_version + 1;

            let changed = if expected_version == 0 {
                conn.execute(
                    "INSERT INTO event_chains (subject, version, chain_json, event_count, updated_at)
                     VALUES (?1, 1, ?2, ?3, ?4)
                     ON CONFLICT(subject) DO NOTHING",
                    params![subject, json, event_count, now],
                )?
            } else {
                conn.execute(
                    "UPDATE event_chains
                     SET version = ?1, chain_json = ?2, event_count = ?3, updated_at = ?4
                     WHERE subject = ?5 AND version = ?6",
                    params![
                        new_version as i64,
                        json,
                        event_count,
                        now,
                        subject,
                        expected_version as i64
                    ],
                )?
            };

            if changed == 0 {
                let actual = current_version(conn, &subject)?;
                return Err(StoreError::VersionConflict {
                    subject,
                    expected: expected_version,
                    actual,
                });
            }

            Ok(new_version)
        })
        .await
    }

    async fn list_subjects(&self) -> Result<Vec<Address>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT subject FROM event_chains ORDER BY subject")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.iter().map(|s| parse_address(s)).collect()
        })
        .await
    }

    async fn cursor(&self, subject: &Address) -> Result<AnchorCursor> {
        let subject = subject.clone();

        self.run(move |conn| {
            let last: Option<String> = conn
                .query_row(
                    "SELECT last_hash FROM anchor_cursors WHERE subject = ?1",
                    params![subject.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(AnchorCursor {
                last_anchored: last.as_deref().map(parse_hash).transpose()?,
                subject,
            })
        })
        .await
    }

    async fn advance_cursor(
        &self,
        subject: &Address,
        expected: Option<Blake3Hash>,
        to: Blake3Hash,
    ) -> Result<()> {
        let subject = subject.to_string();

        self.run(move |conn| {
            let now = now_millis();
            let changed = match expected {
                None => conn.execute(
                    "INSERT INTO anchor_cursors (subject, last_hash, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(subject) DO NOTHING",
                    params![subject, to.to_hex(), now],
                )?,
                Some(prev) => conn.execute(
                    "UPDATE anchor_cursors SET last_hash = ?1, updated_at = ?2
                     WHERE subject = ?3 AND last_hash = ?4",
                    params![to.to_hex(), now, subject, prev.to_hex()],
                )?,
            };

            if changed == 0 {
                return Err(StoreError::CursorConflict { subject });
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl AuthorizationLookup for SqliteStore {
    async fn lookup(&self, address: &Address) -> Result<Option<UserRecord>> {
        let address = address.clone();

        self.run(move |conn| {
            let row: Option<(String, String, String, bool)> = conn
                .query_row(
                    "SELECT public_key, email, role, approved
                     FROM registered_users WHERE address = ?1",
                    params![address.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let Some((public_key, email, role, approved)) = row else {
                return Ok(None);
            };

            Ok(Some(UserRecord {
                public_key: Ed25519PublicKey::from_hex(&public_key)
                    .map_err(|e| StoreError::InvalidData(format!("stored public key: {e}")))?,
                email,
                role: role.parse()?,
                approved,
                address,
            }))
        })
        .await
    }
}
