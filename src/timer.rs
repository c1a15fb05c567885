//! Countdown driver loop and terminal rendering.
//!
//! Everything runs on one thread: the loop owns at most one one-second
//! interval and one completion delay, and drops them as soon as the engine
//! leaves the state that needs them.

use crate::app::{App, AppError};
use crate::encouragement::{EncouragementClient, EncouragementMessage, MessageSource};
use crate::engine::{TimerEvent, COMPLETION_DELAY};
use crate::event::{self, EventResult};
use crate::models::{TimerState, WeeklyEntry};
use crate::notifications;
use crate::stats::StatsSummary;
use std::future::pending;
use std::io::{BufRead, Write};
use std::pin::Pin;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, warn};

const TICK_PERIOD: Duration = Duration::from_secs(1);
const PROGRESS_WIDTH: usize = 20;

pub const HELP: &str = "\
Commands:
  <enter>        start / pause
  start, pause   start or pause explicitly
  s, skip        skip to the next interval
  +N, -N         add or remove N minutes (1 to 60 minutes remaining)
  t, task TEXT   set what you are working on
  u, unstuck     get a tiny first step
  r, reset       start the cycle over
  stats          show today's numbers
  q, quit        leave";

/// Text returned from the encouragement service.
#[derive(Debug)]
enum AiReply {
    Encouragement(EncouragementMessage),
    Unstuck(EncouragementMessage),
}

/// Runs the interactive timer until the user quits or input ends.
pub async fn run_timer_loop(app: &mut App, client: EncouragementClient) -> Result<(), AppError> {
    let cadence = app.engine.settings().sessions_before_long_break;
    println!("{}", format_mode_banner(app.engine.state(), cadence));
    if let Some(task) = app.engine.task_label() {
        println!("Working on: {task}");
    }
    println!("Press Enter to start, `help` for commands.");

    drive(app, &client, spawn_input_reader()).await?;
    println!();
    Ok(())
}

/// Feeds input lines, ticks and completion delays to the engine until a quit
/// command arrives or the input channel closes.
///
/// A countdown still running at exit is left as saved at its start, so the
/// next launch begins a fresh interval.
async fn drive(
    app: &mut App,
    client: &EncouragementClient,
    mut input_rx: UnboundedReceiver<String>,
) -> Result<(), AppError> {
    let (ai_tx, mut ai_rx) = mpsc::unbounded_channel();

    let mut ticker: Option<Interval> = None;
    let mut transition: Option<Pin<Box<Sleep>>> = None;

    loop {
        render_events(app, client, &ai_tx);
        sync_drivers(app, &mut ticker, &mut transition);

        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    debug!("Input closed");
                    break;
                };
                match event::handle_input(app, &line) {
                    EventResult::Continue => {}
                    EventResult::Quit => break,
                    EventResult::RequestUnstuck => {
                        println!("Finding a tiny first step...");
                        spawn_request(client, &ai_tx, app.engine.task_label().map(str::to_string), true);
                    }
                    EventResult::ShowStats => println!("{}", format_summary(&app.stats.summary()?)),
                    EventResult::ShowHelp => println!("{HELP}"),
                    EventResult::Unknown(text) => println!("Unknown command `{text}`, try `help`."),
                }
            }
            _ = next_tick(&mut ticker) => {
                if let Err(e) = app.stats.check_new_day() {
                    warn!(error = %e, "Day rollover check failed");
                }
                app.engine.tick();
            }
            _ = wait_transition(&mut transition) => {
                transition = None;
                app.engine.transition_to_next_mode();
            }
            Some(reply) = ai_rx.recv() => print_reply(reply),
        }
    }

    Ok(())
}

/// Starts or drops the interval and the completion delay to match the engine.
fn sync_drivers(app: &App, ticker: &mut Option<Interval>, transition: &mut Option<Pin<Box<Sleep>>>) {
    if app.engine.is_running() {
        if ticker.is_none() {
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *ticker = Some(interval);
        }
    } else {
        *ticker = None;
    }

    if app.engine.is_transition_pending() {
        if transition.is_none() {
            *transition = Some(Box::pin(sleep(COMPLETION_DELAY)));
        }
    } else {
        *transition = None;
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn wait_transition(transition: &mut Option<Pin<Box<Sleep>>>) {
    match transition {
        Some(delay) => delay.as_mut().await,
        None => pending::<()>().await,
    }
}

/// Reads stdin lines on a dedicated thread so a pending read never holds up
/// the countdown or shutdown.
fn spawn_input_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    break;
                }
            }
        }
    });
    rx
}

fn spawn_request(
    client: &EncouragementClient,
    tx: &UnboundedSender<AiReply>,
    task_label: Option<String>,
    unstuck: bool,
) {
    let client = client.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let reply = if unstuck {
            AiReply::Unstuck(client.request_unstuck(task_label.as_deref()).await)
        } else {
            AiReply::Encouragement(client.request(task_label.as_deref()).await)
        };
        // The loop may have exited already.
        let _ = tx.send(reply);
    });
}

fn print_reply(reply: AiReply) {
    match reply {
        AiReply::Encouragement(msg) => {
            if msg.source == MessageSource::Ai {
                println!("\n🤖 {}", msg.message);
            } else {
                println!("\n{}", msg.message);
            }
        }
        AiReply::Unstuck(msg) => println!("\nFirst step: {}", msg.message),
    }
}

/// Consumes the engine's events and turns them into output.
fn render_events(app: &mut App, client: &EncouragementClient, ai_tx: &UnboundedSender<AiReply>) {
    let settings = app.engine.settings().clone();

    for event in app.engine.take_events() {
        match event {
            TimerEvent::Tick { .. } => {
                let state = app.engine.state();
                print!(
                    "\r{} {}   ",
                    format_title(state),
                    format_progress(state, PROGRESS_WIDTH)
                );
            }
            TimerEvent::ModeChanged { .. } => {
                println!(
                    "\n{}",
                    format_mode_banner(app.engine.state(), settings.sessions_before_long_break)
                );
                println!("Press Enter when you're ready.");
            }
            TimerEvent::SessionComplete {
                mode,
                completed_sessions,
            } => {
                debug!(?mode, completed_sessions, "Rendering completion");
            }
            TimerEvent::Motivation(text) => println!("\n{text}"),
            TimerEvent::Sound(cue) => {
                if settings.sound_enabled {
                    debug!(?cue, "Playing sound");
                    print!("\x07");
                }
            }
            TimerEvent::Notify { finished } => {
                if settings.notifications_enabled {
                    let today = app
                        .stats
                        .stats()
                        .map(|stats| stats.today_sessions)
                        .unwrap_or_default();
                    notifications::notify_finished(finished, today);
                }
            }
            TimerEvent::EncouragementRequested { task_label } => {
                spawn_request(client, ai_tx, task_label, false);
            }
        }
    }

    if let Err(e) = std::io::stdout().flush() {
        warn!(error = %e, "Failed to flush output");
    }
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Formats the one-line title for the current timer state.
pub fn format_title(state: &TimerState) -> String {
    if state.is_paused {
        return format!("Paused {} - Nudge", format_time(state.time_remaining_secs));
    }
    if !state.is_running {
        return "Nudge".to_string();
    }
    let icon = if state.mode.is_break() { "☕" } else { "🎯" };
    format!("{} {} Nudge", format_time(state.time_remaining_secs), icon)
}

/// Draws the remaining fraction of the interval as a bar.
pub fn format_progress(state: &TimerState, width: usize) -> String {
    let filled = (state.progress() * width as f32).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// Describes the interval that is ready to start.
pub fn format_mode_banner(state: &TimerState, sessions_before_long_break: u32) -> String {
    format!(
        "{} · Session {} of {} · {}",
        state.mode.label(),
        state.current_session,
        sessions_before_long_break,
        format_time(state.time_remaining_secs)
    )
}

pub fn format_summary(summary: &StatsSummary) -> String {
    format!(
        "Today: {} min focused, {} sessions\nAll time: {} min, {} sessions\nStreak: {} days (best {})",
        summary.today_focus_minutes,
        summary.today_sessions,
        summary.total_focus_minutes,
        summary.all_time_sessions,
        summary.current_streak,
        summary.longest_streak
    )
}

/// One line per day, with a bar scaled to the busiest day.
pub fn format_report<I>(entries: I) -> String
where
    I: IntoIterator<Item = WeeklyEntry>,
{
    let entries: Vec<WeeklyEntry> = entries.into_iter().collect();
    let max = entries.iter().map(|e| e.focus_minutes).max().unwrap_or(0).max(1);

    entries
        .iter()
        .map(|entry| {
            let bar = (entry.focus_minutes as usize * PROGRESS_WIDTH) / max as usize;
            format!(
                "{} {:<width$} {:>4} min {:>3} sessions",
                entry.date.format("%a %m-%d"),
                "█".repeat(bar),
                entry.focus_minutes,
                entry.sessions,
                width = PROGRESS_WIDTH
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::models::{TimerMode, TimerSettings};
    use crate::persistence::Database;
    use chrono::NaiveDate;
    use std::rc::Rc;
    use tokio::time::advance;

    fn quiet_app(db: Rc<Database>, clock: Rc<dyn Clock>, focus_minutes: u32) -> App {
        let mut app = App::with_database(db, clock).unwrap();
        app.update_settings(TimerSettings {
            focus_minutes,
            sound_enabled: false,
            notifications_enabled: false,
            ..TimerSettings::default()
        })
        .unwrap();
        app
    }

    fn one_minute_app() -> App {
        let clock = Rc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        ));
        quiet_app(Rc::new(Database::new_in_memory().unwrap()), clock, 1)
    }

    fn offline_client() -> EncouragementClient {
        EncouragementClient::new(None, Duration::from_secs(1))
    }

    /// Whether the countdown has a tick due right now.
    async fn tick_ready(ticker: &mut Option<Interval>) -> bool {
        tokio::select! {
            biased;
            _ = next_tick(ticker) => true,
            _ = std::future::ready(()) => false,
        }
    }

    fn finish_focus(app: &mut App) {
        for _ in 0..61 {
            app.engine.tick();
        }
        assert!(app.engine.is_transition_pending());
    }

    fn running_state(mode: TimerMode, remaining: u32, total: u32) -> TimerState {
        TimerState {
            mode,
            is_running: true,
            is_paused: false,
            time_remaining_secs: remaining,
            total_secs: total,
            current_session: 1,
            completed_sessions: 0,
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(59), "00:59");
        assert_eq!(format_time(60), "01:00");
        assert_eq!(format_time(125), "02:05");
        assert_eq!(format_time(1500), "25:00");
        assert_eq!(format_time(3600), "60:00");
    }

    #[test]
    fn test_format_title_idle() {
        let state = TimerState::new(&TimerSettings::default());
        assert_eq!(format_title(&state), "Nudge");
    }

    #[test]
    fn test_format_title_focus() {
        let state = running_state(TimerMode::Focus, 1432, 1500);
        assert_eq!(format_title(&state), "23:52 🎯 Nudge");
    }

    #[test]
    fn test_format_title_break() {
        let state = running_state(TimerMode::ShortBreak, 272, 300);
        assert_eq!(format_title(&state), "04:32 ☕ Nudge");
    }

    #[test]
    fn test_format_title_paused() {
        let mut state = running_state(TimerMode::Focus, 600, 1500);
        state.is_running = false;
        state.is_paused = true;
        assert_eq!(format_title(&state), "Paused 10:00 - Nudge");
    }

    #[test]
    fn test_format_progress() {
        let state = running_state(TimerMode::Focus, 750, 1500);
        assert_eq!(format_progress(&state, 4), "[██░░]");
        let done = running_state(TimerMode::Focus, 0, 1500);
        assert_eq!(format_progress(&done, 4), "[░░░░]");
    }

    #[test]
    fn test_format_mode_banner() {
        let state = TimerState::new(&TimerSettings::default());
        assert_eq!(
            format_mode_banner(&state, 4),
            "Focus Time · Session 1 of 4 · 25:00"
        );
    }

    #[test]
    fn test_format_report() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let entries = vec![
            WeeklyEntry {
                date: day,
                focus_minutes: 0,
                sessions: 0,
            },
            WeeklyEntry {
                date: day.succ_opt().unwrap(),
                focus_minutes: 50,
                sessions: 2,
            },
        ];
        let report = format_report(entries);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Mon 01-15"));
        assert!(lines[1].contains("50 min"));
        assert!(lines[1].contains(&"█".repeat(PROGRESS_WIDTH)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_dropped_whenever_timer_stops() {
        let mut app = one_minute_app();
        let mut ticker = None;
        let mut transition = None;

        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(ticker.is_none());

        app.engine.start();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(ticker.is_some());

        app.engine.pause();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(ticker.is_none());

        app.engine.start();
        app.engine.skip();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(ticker.is_none());
        assert!(transition.is_none());

        app.engine.start();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(ticker.is_some());

        app.engine.reset();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(ticker.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_keeps_single_countdown() {
        let mut app = one_minute_app();
        let mut ticker = None;
        let mut transition = None;

        app.engine.start();
        sync_drivers(&app, &mut ticker, &mut transition);
        advance(Duration::from_millis(600)).await;

        app.engine.start();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(!tick_ready(&mut ticker).await);

        advance(Duration::from_millis(400)).await;
        assert!(tick_ready(&mut ticker).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_swaps_countdown_for_delay() {
        let mut app = one_minute_app();
        let mut ticker = None;
        let mut transition = None;

        app.engine.start();
        sync_drivers(&app, &mut ticker, &mut transition);
        finish_focus(&mut app);

        let completed_at = Instant::now();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(ticker.is_none());
        let delay = transition.as_ref().unwrap();
        assert_eq!(delay.deadline(), completed_at + COMPLETION_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_drops_pending_delay() {
        let mut app = one_minute_app();
        let mut ticker = None;
        let mut transition = None;

        app.engine.start();
        finish_focus(&mut app);
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(transition.is_some());

        app.engine.reset();
        sync_drivers(&app, &mut ticker, &mut transition);
        assert!(transition.is_none());
        assert!(ticker.is_none());

        advance(COMPLETION_DELAY * 2).await;
        assert_eq!(app.engine.state().mode, TimerMode::Focus);
        assert_eq!(app.engine.state().completed_sessions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_runs_focus_into_break() {
        let mut app = one_minute_app();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(String::new()).unwrap();
        let quit_later = async {
            sleep(Duration::from_secs(90)).await;
            tx.send("q".to_string()).unwrap();
        };

        let client = offline_client();
        let (result, ()) = tokio::join!(drive(&mut app, &client, rx), quit_later);
        result.unwrap();

        let state = app.engine.state();
        assert_eq!(state.mode, TimerMode::ShortBreak);
        assert!(!state.is_running);
        assert_eq!(state.completed_sessions, 1);
        assert_eq!(app.stats.stats().unwrap().total_focus_minutes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_while_running_starts_fresh_next_time() {
        let db = Rc::new(Database::new_in_memory().unwrap());
        let clock: Rc<dyn Clock> = Rc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        ));
        let mut app = quiet_app(Rc::clone(&db), Rc::clone(&clock), 25);
        app.engine.set_task_label("Taxes");

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(String::new()).unwrap();
        let quit_later = async {
            sleep(Duration::from_secs(10)).await;
            tx.send("quit".to_string()).unwrap();
        };
        let client = offline_client();
        let (result, ()) = tokio::join!(drive(&mut app, &client, rx), quit_later);
        result.unwrap();
        assert!(app.engine.is_running());

        let reopened = App::with_database(db, clock).unwrap();
        assert!(!reopened.engine.is_running());
        assert_eq!(reopened.engine.state().time_remaining_secs, 25 * 60);
        assert!(reopened.engine.task_label().is_none());
    }
}
