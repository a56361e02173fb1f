//! # nompool-db
//!
//! Booking journal for the pool daemon.
//! A single SQLite database at `$NOMPOOL_DATA_DIR/journal.db`.
//!
//! - WAL mode
//! - Amounts and timestamps stored as INTEGER, rejected if they exceed `i64`
//! - Bookings deduplicated by their content hash
//! - Schema version stored in `PRAGMA user_version`

pub mod migrations;
pub mod queries;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Stored value does not map back onto a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Value too large for an SQLite INTEGER.
    #[error("value out of range: {0}")]
    OutOfRange(u64),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the journal at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory journal (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// `u64` → SQLite INTEGER.
pub(crate) fn to_sql(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| DbError::OutOfRange(value))
}

/// SQLite INTEGER → `u64`.
pub(crate) fn from_sql(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| DbError::Corrupt(format!("negative integer {value}")))
}
