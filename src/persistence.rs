//! SQLite-backed key/value store for persisted records.
//!
//! Every record is stored as a JSON string under a fixed key, and a write
//! always replaces the previous value for that key.

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const KEY_STATS: &str = "stats";
pub const KEY_STREAK: &str = "streak";
pub const KEY_SETTINGS: &str = "settings";
pub const KEY_PRO_STATUS: &str = "pro_status";
pub const KEY_TIMER_STATE: &str = "timer_state";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryCreation(#[source] std::io::Error),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DatabaseError::DirectoryCreation)?;
        }

        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;
        debug!(path = %path.display(), "Opened database");

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing).
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Returns the raw stored string for `key`.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Stores a raw string under `key`, replacing any previous value.
    pub fn set_raw(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }

    /// Loads and decodes the record under `key`.
    ///
    /// A value that no longer decodes is treated as absent.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        let Some(json) = self.get_raw(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable stored record");
                Ok(None)
            }
        }
    }

    /// Encodes and stores `value` under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, &json)
    }

    /// Deletes the record under `key`, if any.
    pub fn remove(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimerSettings;

    #[test]
    fn test_database_creation() {
        let db = Database::new_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_load_missing_key() {
        let db = Database::new_in_memory().unwrap();
        let settings: Option<TimerSettings> = db.load(KEY_SETTINGS).unwrap();
        assert!(settings.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let db = Database::new_in_memory().unwrap();

        let custom = TimerSettings {
            focus_minutes: 30,
            short_break_minutes: 10,
            long_break_minutes: 20,
            sessions_before_long_break: 3,
            sound_enabled: false,
            notifications_enabled: true,
        };
        db.save(KEY_SETTINGS, &custom).unwrap();

        let loaded: TimerSettings = db.load(KEY_SETTINGS).unwrap().unwrap();
        assert_eq!(loaded, custom);
    }

    #[test]
    fn test_save_overwrites() {
        let db = Database::new_in_memory().unwrap();

        let first = TimerSettings {
            focus_minutes: 30,
            ..TimerSettings::default()
        };
        db.save(KEY_SETTINGS, &first).unwrap();

        let second = TimerSettings {
            focus_minutes: 45,
            ..TimerSettings::default()
        };
        db.save(KEY_SETTINGS, &second).unwrap();

        let loaded: TimerSettings = db.load(KEY_SETTINGS).unwrap().unwrap();
        assert_eq!(loaded.focus_minutes, 45);
    }

    #[test]
    fn test_corrupt_value_reads_as_absent() {
        let db = Database::new_in_memory().unwrap();
        db.set_raw(KEY_SETTINGS, "{not json").unwrap();

        let loaded: Option<TimerSettings> = db.load(KEY_SETTINGS).unwrap();
        assert!(loaded.is_none());
        // The raw value is left untouched for the next writer to replace.
        assert_eq!(db.get_raw(KEY_SETTINGS).unwrap().as_deref(), Some("{not json"));
    }

    #[test]
    fn test_remove() {
        let db = Database::new_in_memory().unwrap();
        db.set_raw(KEY_STATS, "{}").unwrap();
        db.remove(KEY_STATS).unwrap();
        assert!(db.get_raw(KEY_STATS).unwrap().is_none());
    }

    #[test]
    fn test_file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("nudge.db");

        {
            let db = Database::open(&path).unwrap();
            db.set_raw(KEY_STREAK, r#"{"currentStreak":2,"longestStreak":2}"#)
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.get_raw(KEY_STREAK).unwrap().is_some());
    }
}
