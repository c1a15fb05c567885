//! Focus statistics, streaks and the Pro-status gate.
//!
//! Every operation reads the current record from the database, applies the
//! change and writes the whole record back, so the database stays the single
//! source of truth between calls.

use crate::clock::Clock;
use crate::models::{
    DataExport, ProStatus, StatsRecord, StreakRecord, TimerSettings, WeeklyEntry,
};
use crate::persistence::{
    Database, DatabaseError, KEY_PRO_STATUS, KEY_SETTINGS, KEY_STATS, KEY_STREAK,
};
use chrono::{Duration, NaiveDate};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Receiver of focus credit from the timer.
pub trait FocusRecorder {
    /// Credits `minutes` of focus time to today and the lifetime total.
    fn add_focus_time(&self, minutes: u32) -> Result<(), DatabaseError>;

    /// Counts one completed focus session.
    fn increment_sessions(&self) -> Result<(), DatabaseError>;
}

/// Numbers shown in the stats panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSummary {
    pub today_focus_minutes: u32,
    pub today_sessions: u32,
    pub total_focus_minutes: u32,
    pub all_time_sessions: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
}

pub struct StatsStore {
    db: Rc<Database>,
    clock: Rc<dyn Clock>,
}

impl StatsStore {
    pub fn new(db: Rc<Database>, clock: Rc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Creates the stats record on first use and runs the day rollover.
    pub fn init(&self) -> Result<(), DatabaseError> {
        if self.db.load::<StatsRecord>(KEY_STATS)?.is_none() {
            self.db.save(KEY_STATS, &StatsRecord::new(self.clock.today()))?;
        }
        self.check_new_day()?;
        Ok(())
    }

    /// Current stats record, or an empty one anchored at today.
    pub fn stats(&self) -> Result<StatsRecord, DatabaseError> {
        Ok(self
            .db
            .load(KEY_STATS)?
            .unwrap_or_else(|| StatsRecord::new(self.clock.today())))
    }

    /// Current streak record, or an empty one.
    pub fn streak(&self) -> Result<StreakRecord, DatabaseError> {
        Ok(self.db.load(KEY_STREAK)?.unwrap_or_default())
    }

    fn update_stats<F>(&self, updater: F) -> Result<(), DatabaseError>
    where
        F: FnOnce(&mut StatsRecord),
    {
        let mut stats = self.stats()?;
        updater(&mut stats);
        self.db.save(KEY_STATS, &stats)
    }

    /// Adds focus minutes to today and the lifetime total.
    pub fn add_focus_time(&self, minutes: u32) -> Result<(), DatabaseError> {
        debug!(minutes, "Recording focus time");
        self.update_stats(|stats| {
            stats.total_focus_minutes += minutes;
            stats.today_focus_minutes += minutes;
        })
    }

    /// Counts one completed session in every session counter.
    pub fn increment_sessions(&self) -> Result<(), DatabaseError> {
        self.update_stats(|stats| {
            stats.total_sessions += 1;
            stats.today_sessions += 1;
            stats.all_time_sessions += 1;
        })
    }

    /// Archives the previous day and resets today's counters when the date
    /// has changed since the last recorded activity.
    ///
    /// Returns true if a rollover happened. Calling it again on the same day
    /// changes nothing.
    pub fn check_new_day(&self) -> Result<bool, DatabaseError> {
        let today = self.clock.today();
        let mut stats = self.stats()?;
        let previous = stats.last_active_date;

        let Some(was_active) = stats.roll_over(today) else {
            return Ok(false);
        };

        if today < previous {
            warn!(%previous, %today, "Calendar date moved backwards");
        }
        info!(%previous, %today, was_active, "Day rollover");

        self.update_streak(was_active)?;
        self.db.save(KEY_STATS, &stats)?;
        Ok(true)
    }

    /// Applies a closed day's activity to the streak and persists it.
    pub fn update_streak(&self, was_active: bool) -> Result<StreakRecord, DatabaseError> {
        let mut streak = self.streak()?;
        streak.record_day(was_active, self.clock.today());
        self.db.save(KEY_STREAK, &streak)?;
        Ok(streak)
    }

    /// Streak as it should be displayed: broken if the last active day is
    /// more than one day ago.
    pub fn check_streak(&self) -> Result<StreakRecord, DatabaseError> {
        let mut streak = self.streak()?;
        if streak.expire_if_stale(self.clock.today()) {
            self.db.save(KEY_STREAK, &streak)?;
        }
        Ok(streak)
    }

    /// Today and totals, with the display-time streak check applied.
    pub fn summary(&self) -> Result<StatsSummary, DatabaseError> {
        let stats = self.stats()?;
        let streak = self.check_streak()?;
        Ok(StatsSummary {
            today_focus_minutes: stats.today_focus_minutes,
            today_sessions: stats.today_sessions,
            total_focus_minutes: stats.total_focus_minutes,
            all_time_sessions: stats.all_time_sessions,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
        })
    }

    /// The last seven days ending today, oldest first.
    pub fn weekly_report(&self) -> Result<WeeklyReport, DatabaseError> {
        Ok(WeeklyReport::new(self.stats()?, self.clock.today()))
    }

    /// Loads the timer settings, falling back to defaults when missing or
    /// invalid.
    pub fn settings(&self) -> Result<TimerSettings, DatabaseError> {
        let settings: TimerSettings = self.db.load(KEY_SETTINGS)?.unwrap_or_default();
        if let Err(e) = settings.validate() {
            warn!(error = %e, "Stored settings are invalid, using defaults");
            return Ok(TimerSettings::default());
        }
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &TimerSettings) -> Result<(), DatabaseError> {
        self.db.save(KEY_SETTINGS, settings)
    }

    /// Raw Pro status as last written.
    pub fn pro_status(&self) -> Result<ProStatus, DatabaseError> {
        Ok(self.db.load(KEY_PRO_STATUS)?.unwrap_or_default())
    }

    pub fn set_pro_status(&self, status: &ProStatus) -> Result<(), DatabaseError> {
        self.db.save(KEY_PRO_STATUS, status)
    }

    /// Records a Pro plan, optionally expiring after `days`.
    pub fn activate_pro(&self, plan: &str, days: Option<u32>) -> Result<ProStatus, DatabaseError> {
        let status = ProStatus {
            is_pro: true,
            plan: Some(plan.to_string()),
            expires_at: days.map(|d| self.clock.now() + Duration::days(i64::from(d))),
        };
        self.set_pro_status(&status)?;
        info!(plan, ?status.expires_at, "Pro plan activated");
        Ok(status)
    }

    /// Returns true if Pro is active. An expired status is cleared in
    /// storage as part of this read.
    pub fn is_pro(&self) -> Result<bool, DatabaseError> {
        let status = self.pro_status()?;
        if !status.is_pro {
            return Ok(false);
        }
        if status.is_expired(self.clock.now()) {
            info!(plan = ?status.plan, "Pro status expired");
            self.set_pro_status(&ProStatus::default())?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Collects stats, streak and settings into a backup document.
    pub fn export_data(&self) -> Result<DataExport, DatabaseError> {
        Ok(DataExport {
            stats: self.db.load(KEY_STATS)?,
            streak: self.db.load(KEY_STREAK)?,
            settings: self.db.load(KEY_SETTINGS)?,
            exported_at: self.clock.now(),
        })
    }

    /// Restores whichever records the backup carries.
    pub fn import_data(&self, data: &DataExport) -> Result<(), DatabaseError> {
        if let Some(stats) = &data.stats {
            self.db.save(KEY_STATS, stats)?;
        }
        if let Some(streak) = &data.streak {
            self.db.save(KEY_STREAK, streak)?;
        }
        if let Some(settings) = &data.settings {
            self.save_settings(settings)?;
        }
        info!(exported_at = %data.exported_at, "Imported backup");
        Ok(())
    }

    /// Removes every stored record and starts over with defaults.
    pub fn clear_all(&self) -> Result<(), DatabaseError> {
        for key in [KEY_STATS, KEY_STREAK, KEY_SETTINGS, KEY_PRO_STATUS] {
            self.db.remove(key)?;
        }
        info!("Cleared all stored data");
        self.init()
    }
}

impl FocusRecorder for StatsStore {
    fn add_focus_time(&self, minutes: u32) -> Result<(), DatabaseError> {
        StatsStore::add_focus_time(self, minutes)
    }

    fn increment_sessions(&self) -> Result<(), DatabaseError> {
        StatsStore::increment_sessions(self)
    }
}

/// Seven-day report iterator, oldest day first.
///
/// Cloning yields a fresh iterator over the same days.
#[derive(Debug, Clone)]
pub struct WeeklyReport {
    stats: StatsRecord,
    today: NaiveDate,
    days_back: std::ops::RangeInclusive<i64>,
}

impl WeeklyReport {
    fn new(stats: StatsRecord, today: NaiveDate) -> Self {
        Self {
            stats,
            today,
            days_back: 0..=6,
        }
    }

    fn entry(&self, days_back: i64) -> WeeklyEntry {
        let date = self.today - Duration::days(days_back);
        if date == self.today {
            WeeklyEntry {
                date,
                focus_minutes: self.stats.today_focus_minutes,
                sessions: self.stats.today_sessions,
            }
        } else {
            let totals = self
                .stats
                .weekly_history
                .get(&date)
                .copied()
                .unwrap_or_default();
            WeeklyEntry {
                date,
                focus_minutes: totals.focus_minutes,
                sessions: totals.sessions,
            }
        }
    }
}

impl Iterator for WeeklyReport {
    type Item = WeeklyEntry;

    fn next(&mut self) -> Option<Self::Item> {
        // Walk from six days ago towards today.
        let days_back = self.days_back.next_back()?;
        Some(self.entry(days_back))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.days_back.size_hint()
    }
}

impl ExactSizeIterator for WeeklyReport {}
