//! Keyboard command parsing and handling.

use crate::app::App;
use tracing::debug;

/// A command typed into the interactive timer.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    /// Empty line: start or pause.
    Toggle,
    Start,
    Pause,
    Skip,
    /// Add or remove whole minutes.
    Adjust(i32),
    Reset,
    Task(String),
    Unstuck,
    Stats,
    Help,
    Quit,
}

/// Result of handling a command.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// Command handled, continue running.
    Continue,
    /// User requested quit.
    Quit,
    /// Ask the encouragement service for a first step.
    RequestUnstuck,
    /// Print the stats panel.
    ShowStats,
    /// Print the command list.
    ShowHelp,
    /// Input was not understood.
    Unknown(String),
}

/// Parses one input line.
pub fn parse_command(line: &str) -> Option<UserCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Some(UserCommand::Toggle);
    }

    if let Some(rest) = line.strip_prefix('+') {
        return parse_minutes(rest).map(UserCommand::Adjust);
    }
    if let Some(rest) = line.strip_prefix('-') {
        return parse_minutes(rest).map(|m| UserCommand::Adjust(-m));
    }

    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let command = match word.to_ascii_lowercase().as_str() {
        "start" | "resume" => UserCommand::Start,
        "p" | "pause" => UserCommand::Pause,
        "s" | "skip" => UserCommand::Skip,
        "r" | "reset" => UserCommand::Reset,
        "t" | "task" => UserCommand::Task(rest.trim().to_string()),
        "u" | "unstuck" => UserCommand::Unstuck,
        "stats" => UserCommand::Stats,
        "h" | "help" | "?" => UserCommand::Help,
        "q" | "quit" | "exit" => UserCommand::Quit,
        _ => return None,
    };
    Some(command)
}

fn parse_minutes(text: &str) -> Option<i32> {
    let text = text.trim();
    if text.is_empty() {
        return Some(1);
    }
    text.parse::<i32>().ok().filter(|m| *m > 0)
}

/// Handles a typed line and updates the app state accordingly.
pub fn handle_input(app: &mut App, line: &str) -> EventResult {
    match parse_command(line) {
        Some(command) => handle_command(app, command),
        None => EventResult::Unknown(line.trim().to_string()),
    }
}

/// Applies a parsed command to the timer.
pub fn handle_command(app: &mut App, command: UserCommand) -> EventResult {
    match command {
        UserCommand::Toggle => app.engine.toggle(),
        UserCommand::Start => app.engine.start(),
        UserCommand::Pause => app.engine.pause(),
        UserCommand::Skip => app.engine.skip(),
        UserCommand::Adjust(minutes) => {
            if !app.engine.adjust_time(minutes) {
                debug!(minutes, "Adjustment ignored");
            }
        }
        UserCommand::Reset => app.engine.reset(),
        UserCommand::Task(label) => app.engine.set_task_label(&label),
        UserCommand::Unstuck => return EventResult::RequestUnstuck,
        UserCommand::Stats => return EventResult::ShowStats,
        UserCommand::Help => return EventResult::ShowHelp,
        UserCommand::Quit => return EventResult::Quit,
    }
    EventResult::Continue
}
