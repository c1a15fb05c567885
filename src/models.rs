//! Data models for the Nudge focus timer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum number of archived days kept in the weekly history.
/// Longest interval a duration setting may ask for, one day.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

pub const WEEKLY_HISTORY_DAYS: usize = 7;

/// The kind of interval the timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    /// Focused work interval.
    #[default]
    Focus,
    /// Short rest between focus sessions.
    ShortBreak,
    /// Long rest after a full cycle of focus sessions.
    LongBreak,
}

impl TimerMode {
    /// Returns true for either break mode.
    pub fn is_break(self) -> bool {
        matches!(self, Self::ShortBreak | Self::LongBreak)
    }

    /// Human readable badge for the mode.
    pub fn label(self) -> &'static str {
        match self {
            Self::Focus => "Focus Time",
            Self::ShortBreak => "Short Break",
            Self::LongBreak => "Long Break",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("{0} must be at least 1")]
    NotPositive(&'static str),
    #[error("{0} must be at most 1440 minutes")]
    TooLarge(&'static str),
    #[error("Settings cannot be changed while the timer is running")]
    TimerRunning,
}

/// User-configurable settings for the focus timer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TimerSettings {
    /// Duration of a focus session in minutes.
    pub focus_minutes: u32,
    /// Duration of a short break in minutes.
    pub short_break_minutes: u32,
    /// Duration of a long break in minutes.
    pub long_break_minutes: u32,
    /// Number of focus sessions before a long break.
    pub sessions_before_long_break: u32,
    /// Whether to play sounds on timer events.
    pub sound_enabled: bool,
    /// Whether to show desktop notifications.
    pub notifications_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            sessions_before_long_break: 4,
            sound_enabled: true,
            notifications_enabled: true,
        }
    }
}

impl TimerSettings {
    /// Checks that every duration and the long-break cadence are positive
    /// and that no duration exceeds a day.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let durations = [
            ("focusMinutes", self.focus_minutes),
            ("shortBreakMinutes", self.short_break_minutes),
            ("longBreakMinutes", self.long_break_minutes),
        ];
        let cadence = ("sessionsBeforeLongBreak", self.sessions_before_long_break);
        if let Some((name, _)) = durations.iter().chain([&cadence]).find(|(_, value)| *value == 0) {
            return Err(SettingsError::NotPositive(*name));
        }
        match durations.iter().find(|(_, value)| *value > MAX_DURATION_MINUTES) {
            Some((name, _)) => Err(SettingsError::TooLarge(*name)),
            None => Ok(()),
        }
    }

    /// Configured duration of `mode` in minutes.
    pub fn duration_mins(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        }
    }

    /// Configured duration of `mode` in seconds, capped at
    /// `MAX_DURATION_MINUTES`.
    pub fn duration_secs(&self, mode: TimerMode) -> u32 {
        self.duration_mins(mode).min(MAX_DURATION_MINUTES) * 60
    }
}

/// Countdown state of the focus timer.
///
/// `is_running` and `is_paused` are tracked independently so a paused
/// interval can be told apart from one that never started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    pub is_running: bool,
    pub is_paused: bool,
    #[serde(rename = "timeRemaining")]
    pub time_remaining_secs: u32,
    #[serde(rename = "totalTime")]
    pub total_secs: u32,
    pub current_session: u32,
    pub completed_sessions: u32,
}

impl TimerState {
    /// Creates a stopped focus state at the start of a fresh cycle.
    pub fn new(settings: &TimerSettings) -> Self {
        let total_secs = settings.duration_secs(TimerMode::Focus);
        Self {
            mode: TimerMode::Focus,
            is_running: false,
            is_paused: false,
            time_remaining_secs: total_secs,
            total_secs,
            current_session: 1,
            completed_sessions: 0,
        }
    }

    /// Seconds of the current interval already consumed.
    pub fn elapsed_secs(&self) -> u32 {
        self.total_secs.saturating_sub(self.time_remaining_secs)
    }

    /// Fraction of the interval still remaining, from 1.0 down to 0.0.
    pub fn progress(&self) -> f32 {
        if self.total_secs == 0 {
            return 0.0;
        }
        (self.time_remaining_secs as f32 / self.total_secs as f32).clamp(0.0, 1.0)
    }

    /// Returns true if the current interval has not been started yet.
    pub fn is_fresh(&self) -> bool {
        !self.is_running && !self.is_paused && self.time_remaining_secs == self.total_secs
    }
}

/// Persisted copy of the timer state plus the task label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    #[serde(flatten)]
    pub state: TimerState,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub saved_on: Option<NaiveDate>,
}

/// Focus totals for a single archived day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotals {
    pub focus_minutes: u32,
    pub sessions: u32,
}

/// Lifetime and daily focus aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    pub total_focus_minutes: u32,
    pub total_sessions: u32,
    pub all_time_sessions: u32,
    pub today_focus_minutes: u32,
    pub today_sessions: u32,
    pub last_active_date: NaiveDate,
    #[serde(default)]
    pub weekly_history: BTreeMap<NaiveDate, DayTotals>,
}

impl StatsRecord {
    /// Creates an empty record anchored at `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            total_focus_minutes: 0,
            total_sessions: 0,
            all_time_sessions: 0,
            today_focus_minutes: 0,
            today_sessions: 0,
            last_active_date: today,
            weekly_history: BTreeMap::new(),
        }
    }

    /// Archives the last active day and resets the daily counters.
    ///
    /// Returns `None` if `today` is the last active date, otherwise whether
    /// the closed day had any focus time.
    pub fn roll_over(&mut self, today: NaiveDate) -> Option<bool> {
        if self.last_active_date == today {
            return None;
        }

        self.weekly_history.insert(
            self.last_active_date,
            DayTotals {
                focus_minutes: self.today_focus_minutes,
                sessions: self.today_sessions,
            },
        );
        while self.weekly_history.len() > WEEKLY_HISTORY_DAYS {
            self.weekly_history.pop_first();
        }

        let was_active = self.today_focus_minutes > 0;
        self.today_focus_minutes = 0;
        self.today_sessions = 0;
        self.last_active_date = today;
        Some(was_active)
    }
}

/// Consecutive active day tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub last_active_date: Option<NaiveDate>,
}

impl StreakRecord {
    /// Applies the result of a closed day to the streak.
    pub fn record_day(&mut self, was_active: bool, today: NaiveDate) {
        if !was_active {
            self.current_streak = 0;
            return;
        }

        match self.last_active_date {
            None => self.current_streak = 1,
            Some(last) => match (today - last).num_days() {
                1 => self.current_streak += 1,
                gap if gap > 1 => self.current_streak = 1,
                // Same day or clock moved backwards: leave the counter alone.
                _ => {}
            },
        }

        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_active_date = Some(today);
    }

    /// Breaks the streak if more than one day passed since the last active day.
    /// Returns true if the record changed.
    pub fn expire_if_stale(&mut self, today: NaiveDate) -> bool {
        match self.last_active_date {
            Some(last) if (today - last).num_days() > 1 && self.current_streak != 0 => {
                self.current_streak = 0;
                true
            }
            _ => false,
        }
    }
}

/// Subscription flag written by the external payment flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProStatus {
    pub is_pro: bool,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProStatus {
    /// Returns true if the status carries an expiry that has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }
}

/// One day of the weekly report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyEntry {
    pub date: NaiveDate,
    pub focus_minutes: u32,
    pub sessions: u32,
}

/// Backup document produced by export and consumed by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    #[serde(default)]
    pub stats: Option<StatsRecord>,
    #[serde(default)]
    pub streak: Option<StreakRecord>,
    #[serde(default)]
    pub settings: Option<TimerSettings>,
    pub exported_at: DateTime<Utc>,
}
