//! Configuration and CLI argument handling

use crate::models::TimerSettings;
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "nudge")]
#[command(about = "An attention-friendly focus timer with local stats and streaks")]
#[command(version)]
pub struct Config {
    /// Directory holding the Nudge database
    #[arg(long, env = "NUDGE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the encouragement text service
    #[arg(long, env = "NUDGE_API_URL")]
    pub api_url: Option<String>,

    /// Seconds to wait for encouragement text before falling back
    #[arg(long, env = "NUDGE_AI_TIMEOUT_SECS", default_value = "8")]
    pub ai_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the interactive focus timer (default)
    Run {
        /// What you are working on
        #[arg(long)]
        task: Option<String>,
    },
    /// Show today's focus time, sessions and streak
    Stats,
    /// Show the last seven days (Pro)
    Report,
    /// Show or change timer settings
    Settings(SettingsArgs),
    /// Show or change the Pro plan
    Pro {
        #[command(subcommand)]
        action: Option<ProAction>,
    },
    /// Write stats, streak and settings to a JSON backup
    Export { path: PathBuf },
    /// Restore a JSON backup
    Import { path: PathBuf },
    /// Delete all stored data
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct SettingsArgs {
    /// Focus session length in minutes
    #[arg(long)]
    pub focus: Option<u32>,
    /// Short break length in minutes
    #[arg(long)]
    pub short: Option<u32>,
    /// Long break length in minutes
    #[arg(long)]
    pub long: Option<u32>,
    /// Focus sessions before a long break
    #[arg(long)]
    pub sessions: Option<u32>,
    /// Play a sound on timer events
    #[arg(long)]
    pub sound: Option<bool>,
    /// Show desktop notifications
    #[arg(long)]
    pub notifications: Option<bool>,
}

impl SettingsArgs {
    /// Returns true if no setting was given on the command line.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copies every given value over `settings`.
    pub fn apply(&self, settings: &TimerSettings) -> TimerSettings {
        let mut updated = settings.clone();
        if let Some(v) = self.focus {
            updated.focus_minutes = v;
        }
        if let Some(v) = self.short {
            updated.short_break_minutes = v;
        }
        if let Some(v) = self.long {
            updated.long_break_minutes = v;
        }
        if let Some(v) = self.sessions {
            updated.sessions_before_long_break = v;
        }
        if let Some(v) = self.sound {
            updated.sound_enabled = v;
        }
        if let Some(v) = self.notifications {
            updated.notifications_enabled = v;
        }
        updated
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ProAction {
    /// Show the current plan
    Status,
    /// Record a Pro plan
    Activate {
        /// Plan identifier
        #[arg(long, default_value = "monthly")]
        plan: String,
        /// Days until the plan expires (never, if omitted)
        #[arg(long)]
        days: Option<u32>,
    },
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Subcommand to run, defaulting to the interactive timer
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run { task: None })
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.join("nudge.db"),
            None => ProjectDirs::from("com", "nudge", "Nudge")
                .map(|dirs| dirs.data_dir().join("nudge.db"))
                .unwrap_or_else(|| PathBuf::from("nudge.db")),
        }
    }

    /// Time limit for encouragement requests
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("nudge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_command_is_run() {
        let config = parse(&["--data-dir", "/tmp/nudge"]);
        assert_eq!(config.command(), Command::Run { task: None });
        assert_eq!(config.database_path(), PathBuf::from("/tmp/nudge/nudge.db"));
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn test_run_with_task() {
        let config = parse(&["-v", "run", "--task", "Write report"]);
        assert_eq!(
            config.command(),
            Command::Run {
                task: Some("Write report".to_string())
            }
        );
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_ai_timeout() {
        let config = parse(&["--ai-timeout-secs", "3", "stats"]);
        assert_eq!(config.ai_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_settings_args_apply() {
        let config = parse(&["settings", "--focus", "50", "--sound", "false"]);
        let Some(Command::Settings(args)) = config.command else {
            panic!("expected settings command");
        };
        assert!(!args.is_empty());

        let updated = args.apply(&TimerSettings::default());
        assert_eq!(updated.focus_minutes, 50);
        assert!(!updated.sound_enabled);
        assert_eq!(updated.short_break_minutes, 5);
    }

    #[test]
    fn test_pro_activate() {
        let config = parse(&["pro", "activate", "--days", "30"]);
        assert_eq!(
            config.command(),
            Command::Pro {
                action: Some(ProAction::Activate {
                    plan: "monthly".to_string(),
                    days: Some(30)
                })
            }
        );
    }
}
