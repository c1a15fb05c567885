//! Focus timer state machine.
//!
//! The engine is headless: it never sleeps, renders or plays anything. The
//! owner feeds it one `tick()` per elapsed second while it is running and
//! drains the [`TimerEvent`]s it produces after every call.

use crate::clock::Clock;
use crate::messages;
use crate::models::{SettingsError, TimerMode, TimerSettings, TimerSnapshot, TimerState};
use crate::persistence::{Database, KEY_TIMER_STATE};
use crate::stats::FocusRecorder;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between a completed interval and the switch to the next mode, so
/// the completion message can be seen.
pub const COMPLETION_DELAY: Duration = Duration::from_secs(2);

/// Encouragement is shown whenever the remaining time hits a multiple of this.
const ENCOURAGEMENT_INTERVAL_SECS: u32 = 300;

/// Bounds for the remaining time after a manual adjustment.
const MIN_ADJUSTED_SECS: i64 = 60;
const MAX_ADJUSTED_SECS: i64 = 3600;

/// Sounds the presentation layer may play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    FocusStart,
    BreakStart,
    SessionComplete,
}

/// Side-effect requests emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// The countdown moved or was adjusted.
    Tick {
        remaining_secs: u32,
        total_secs: u32,
        mode: TimerMode,
    },
    /// A new interval is ready to start.
    ModeChanged { mode: TimerMode, session: u32 },
    /// An interval ran out.
    SessionComplete {
        mode: TimerMode,
        completed_sessions: u32,
    },
    /// Short text to show to the user.
    Motivation(String),
    Sound(SoundCue),
    /// Desktop notification for the interval that just finished.
    Notify { finished: TimerMode },
    /// AI encouragement should be fetched for the current task.
    EncouragementRequested { task_label: Option<String> },
}

pub struct TimerEngine {
    settings: TimerSettings,
    state: TimerState,
    task_label: Option<String>,
    transition_pending: bool,
    events: Vec<TimerEvent>,
    recorder: Rc<dyn FocusRecorder>,
    db: Rc<Database>,
    clock: Rc<dyn Clock>,
}

impl TimerEngine {
    /// Creates an engine and restores session metadata from the last
    /// snapshot when allowed.
    pub fn new(
        settings: TimerSettings,
        recorder: Rc<dyn FocusRecorder>,
        db: Rc<Database>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let mut engine = Self {
            state: TimerState::new(&settings),
            settings,
            task_label: None,
            transition_pending: false,
            events: Vec::new(),
            recorder,
            db,
            clock,
        };
        engine.load_state();
        engine
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn task_label(&self) -> Option<&str> {
        self.task_label.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    /// Returns true between a completion and the switch to the next mode.
    pub fn is_transition_pending(&self) -> bool {
        self.transition_pending
    }

    /// Drains the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<TimerEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: TimerEvent) {
        self.events.push(event);
    }

    fn emit_tick(&mut self) {
        self.emit(TimerEvent::Tick {
            remaining_secs: self.state.time_remaining_secs,
            total_secs: self.state.total_secs,
            mode: self.state.mode,
        });
    }

    /// Starts or resumes the countdown. Ignored while running.
    pub fn start(&mut self) {
        if self.state.is_running || self.transition_pending {
            return;
        }

        self.state.is_running = true;
        self.state.is_paused = false;
        info!(mode = ?self.state.mode, remaining = self.state.time_remaining_secs, "Timer started");

        self.emit(TimerEvent::Sound(SoundCue::FocusStart));
        self.emit(TimerEvent::Motivation(messages::start_message().to_string()));
        self.emit(TimerEvent::EncouragementRequested {
            task_label: self.task_label.clone(),
        });
        self.emit_tick();
        self.save_state();
    }

    /// Pauses the countdown. Ignored unless running.
    pub fn pause(&mut self) {
        if !self.state.is_running {
            return;
        }

        self.state.is_running = false;
        self.state.is_paused = true;
        info!(remaining = self.state.time_remaining_secs, "Timer paused");

        self.emit(TimerEvent::Motivation(messages::PAUSE_MESSAGE.to_string()));
        self.save_state();
    }

    /// Pauses if running, starts otherwise.
    pub fn toggle(&mut self) {
        if self.state.is_running {
            self.pause();
        } else {
            self.start();
        }
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self) {
        if !self.state.is_running {
            return;
        }

        if self.state.time_remaining_secs > 0 {
            self.state.time_remaining_secs -= 1;
            self.emit_tick();

            let remaining = self.state.time_remaining_secs;
            if remaining > 0 && remaining % ENCOURAGEMENT_INTERVAL_SECS == 0 {
                self.emit(TimerEvent::Motivation(
                    messages::encouragement_message().to_string(),
                ));
            }
        } else {
            self.complete();
        }
    }

    fn complete(&mut self) {
        self.state.is_running = false;
        self.state.is_paused = false;
        let mode = self.state.mode;

        if mode == TimerMode::Focus {
            self.state.completed_sessions += 1;
            // Always the configured duration, whatever was adjusted.
            let minutes = self.settings.focus_minutes;
            if let Err(e) = self.recorder.add_focus_time(minutes) {
                warn!(error = %e, "Failed to record focus time");
            }
            if let Err(e) = self.recorder.increment_sessions() {
                warn!(error = %e, "Failed to record session");
            }
            self.emit(TimerEvent::Motivation(
                messages::completion_message().to_string(),
            ));
        } else {
            self.emit(TimerEvent::Motivation(messages::BREAK_OVER_MESSAGE.to_string()));
        }
        info!(?mode, completed = self.state.completed_sessions, "Interval complete");

        self.emit(TimerEvent::Sound(SoundCue::SessionComplete));
        self.emit(TimerEvent::SessionComplete {
            mode,
            completed_sessions: self.state.completed_sessions,
        });
        self.emit(TimerEvent::Notify { finished: mode });

        self.transition_pending = true;
        self.save_state();
    }

    fn long_break_due(&self) -> bool {
        let completed = self.state.completed_sessions;
        completed > 0 && completed % self.settings.sessions_before_long_break == 0
    }

    /// Moves to the next interval of the cycle without starting it.
    pub fn transition_to_next_mode(&mut self) {
        let next = match self.state.mode {
            TimerMode::Focus if self.long_break_due() => TimerMode::LongBreak,
            TimerMode::Focus => TimerMode::ShortBreak,
            TimerMode::ShortBreak | TimerMode::LongBreak => {
                self.state.current_session += 1;
                TimerMode::Focus
            }
        };

        self.transition_pending = false;
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.mode = next;
        self.state.total_secs = self.settings.duration_secs(next);
        self.state.time_remaining_secs = self.state.total_secs;
        debug!(mode = ?next, session = self.state.current_session, "Mode changed");

        self.emit(TimerEvent::ModeChanged {
            mode: next,
            session: self.state.current_session,
        });
        self.emit(TimerEvent::Sound(if next == TimerMode::Focus {
            SoundCue::FocusStart
        } else {
            SoundCue::BreakStart
        }));
        self.emit_tick();
        self.save_state();
    }

    /// Abandons the current interval and moves on.
    ///
    /// A running focus session is credited with the whole minutes it ran.
    pub fn skip(&mut self) {
        if self.state.mode == TimerMode::Focus && self.state.is_running {
            let minutes = self.state.elapsed_secs() / 60;
            if minutes > 0 {
                if let Err(e) = self.recorder.add_focus_time(minutes) {
                    warn!(error = %e, "Failed to record partial focus time");
                }
                self.emit(TimerEvent::Motivation(messages::partial_credit_message(
                    minutes,
                )));
            }
            info!(minutes, "Focus session skipped");
        }

        self.state.is_running = false;
        self.transition_to_next_mode();
    }

    /// Adds (or removes, if negative) minutes to the current countdown.
    ///
    /// Returns false and changes nothing if the result would fall outside
    /// one to sixty minutes.
    pub fn adjust_time(&mut self, delta_minutes: i32) -> bool {
        let new_remaining =
            i64::from(self.state.time_remaining_secs) + i64::from(delta_minutes) * 60;
        if !(MIN_ADJUSTED_SECS..=MAX_ADJUSTED_SECS).contains(&new_remaining) {
            debug!(delta_minutes, new_remaining, "Adjustment out of range");
            return false;
        }

        // Range checked above.
        let new_remaining = new_remaining as u32;
        self.state.time_remaining_secs = new_remaining;
        self.state.total_secs = self.state.total_secs.max(new_remaining);

        self.emit(TimerEvent::Motivation(messages::adjustment_message(
            delta_minutes,
        )));
        self.emit_tick();
        self.save_state();
        true
    }

    /// Drops the current cycle and returns to a fresh first focus session.
    pub fn reset(&mut self) {
        self.state = TimerState::new(&self.settings);
        self.transition_pending = false;
        info!("Timer reset");

        self.emit(TimerEvent::ModeChanged {
            mode: self.state.mode,
            session: self.state.current_session,
        });
        self.emit_tick();
        self.save_state();
    }

    /// Sets what the user is working on. Blank text clears it.
    pub fn set_task_label(&mut self, label: &str) {
        let label = label.trim();
        self.task_label = (!label.is_empty()).then(|| label.to_string());
        self.save_state();
    }

    /// Replaces the settings between sessions.
    ///
    /// An interval that has not been started yet picks up its new duration.
    pub fn update_settings(&mut self, settings: TimerSettings) -> Result<(), SettingsError> {
        if self.state.is_running {
            return Err(SettingsError::TimerRunning);
        }
        settings.validate()?;

        let fresh = self.state.is_fresh() && !self.transition_pending;
        self.settings = settings;
        if fresh {
            self.state.total_secs = self.settings.duration_secs(self.state.mode);
            self.state.time_remaining_secs = self.state.total_secs;
            self.emit_tick();
        }
        self.save_state();
        Ok(())
    }

    fn save_state(&self) {
        let snapshot = TimerSnapshot {
            state: self.state.clone(),
            task: self.task_label.clone().unwrap_or_default(),
            saved_on: Some(self.clock.today()),
        };
        if let Err(e) = self.db.save(KEY_TIMER_STATE, &snapshot) {
            warn!(error = %e, "Failed to save timer state");
        }
    }

    /// Restores session position, lifetime count and task label.
    ///
    /// A snapshot taken while running is ignored: the countdown cannot be
    /// trusted after an unknown gap, so the session starts fresh instead.
    fn load_state(&mut self) {
        let snapshot = match self.db.load::<TimerSnapshot>(KEY_TIMER_STATE) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Failed to load timer state");
                return;
            }
        };

        if snapshot.state.is_running {
            info!("Previous session was running, starting fresh");
            return;
        }
        if snapshot.saved_on != Some(self.clock.today()) {
            debug!(saved_on = ?snapshot.saved_on, "Timer state is from another day");
            return;
        }

        self.state.current_session = snapshot.state.current_session.max(1);
        self.state.completed_sessions = snapshot.state.completed_sessions;
        let task = snapshot.task.trim();
        self.task_label = (!task.is_empty()).then(|| task.to_string());
        debug!(
            session = self.state.current_session,
            completed = self.state.completed_sessions,
            "Restored timer state"
        );
    }
}
