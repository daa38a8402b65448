//! Database module for persisted engine state.
//!
//! This module provides SQLite-based persistent storage for:
//! - The last selected source and the channel-lock flag
//! - The last program per ownership class
//! - EDID records per HDMI port
//! - The last signal snapshot per source
//! - Channel rows written by the scanner and cleared when a scan starts

mod channel;
mod models;
mod schema;
mod settings;

pub use models::*;

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;
use thiserror::Error;

use crate::device::DeviceError;

/// Database error types.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid stored value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

impl From<DatabaseError> for DeviceError {
    fn from(e: DatabaseError) -> Self {
        DeviceError::Storage(e.to_string())
    }
}

/// Main database connection wrapper.
///
/// The connection sits behind a mutex so one handle can serve as the
/// engine's settings and channel store from any thread.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize_schema()?;

        Ok(db)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(schema::SCHEMA_SQL)?;
        self.apply_migrations()?;
        Ok(())
    }

    /// Add a column to a table if it doesn't exist.
    fn add_column_if_not_exists(&self, table: &str, column: &str, column_type: &str) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let column_exists = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|r| r.ok())
            .any(|name| name == column);

        if !column_exists {
            let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_type);
            conn.execute(&sql, [])?;
            log::info!("Migration: Added column {} to table {}", column, table);
        }

        Ok(())
    }

    fn apply_migrations(&self) -> Result<()> {
        // Migration 001: skip flag for channel up/down
        self.add_column_if_not_exists("channels", "skipped", "INTEGER DEFAULT 0")?;
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
