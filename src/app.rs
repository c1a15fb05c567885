//! Main application state and wiring.

use crate::clock::{Clock, SystemClock};
use crate::engine::TimerEngine;
use crate::models::{DataExport, SettingsError, TimerSettings};
use crate::persistence::{Database, DatabaseError};
use crate::stats::{StatsStore, WeeklyReport};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Backup file is not valid: {0}")]
    Backup(#[from] serde_json::Error),
}

/// The timer engine and the stats store sharing one database.
pub struct App {
    pub engine: TimerEngine,
    pub stats: Rc<StatsStore>,
}

impl App {
    /// Opens the database at `path` and restores the previous state.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let db = Rc::new(Database::open(path)?);
        Self::with_database(db, Rc::new(SystemClock))
    }

    /// Builds the application on an existing database and clock.
    pub fn with_database(db: Rc<Database>, clock: Rc<dyn Clock>) -> Result<Self, AppError> {
        let stats = Rc::new(StatsStore::new(Rc::clone(&db), Rc::clone(&clock)));
        stats.init()?;
        let settings = stats.settings()?;
        let engine = TimerEngine::new(settings, stats.clone(), db, clock);

        Ok(Self { engine, stats })
    }

    /// Applies new settings to the timer and saves them.
    pub fn update_settings(&mut self, settings: TimerSettings) -> Result<(), AppError> {
        self.engine.update_settings(settings.clone())?;
        self.stats.save_settings(&settings)?;
        info!(?settings, "Settings updated");
        Ok(())
    }

    /// The weekly report, or `None` without an active Pro plan.
    pub fn weekly_report(&self) -> Result<Option<WeeklyReport>, AppError> {
        if !self.stats.is_pro()? {
            return Ok(None);
        }
        Ok(Some(self.stats.weekly_report()?))
    }

    /// Writes a JSON backup to `path`.
    pub fn export_to(&self, path: &Path) -> Result<(), AppError> {
        let data = self.stats.export_data()?;
        std::fs::write(path, serde_json::to_string_pretty(&data)?)?;
        info!(path = %path.display(), "Exported data");
        Ok(())
    }

    /// Restores a JSON backup from `path`.
    pub fn import_from(&mut self, path: &Path) -> Result<(), AppError> {
        let json = std::fs::read_to_string(path)?;
        let data: DataExport = serde_json::from_str(&json)?;
        if let Some(settings) = &data.settings {
            settings.validate()?;
        }
        self.stats.import_data(&data)?;
        if let Some(settings) = data.settings {
            self.engine.update_settings(settings)?;
        }
        Ok(())
    }
}
