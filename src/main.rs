//! Nudge - an attention-friendly focus timer for the terminal.
//!
//! Focus sessions and breaks alternate at your own pace: nothing starts
//! until you say so. Stats and streaks are kept in a local database.

use tracing::info;

mod app;
mod clock;
mod config;
mod encouragement;
mod engine;
mod event;
mod messages;
mod models;
mod notifications;
mod persistence;
mod stats;
mod timer;

use app::App;
use config::{Command, Config, ProAction};
use encouragement::EncouragementClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Logs go to stderr so they do not interleave with the countdown line.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("nudge={}", config.log_level()).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let db_path = config.database_path();
    info!(path = %db_path.display(), "Opening database");
    let mut app = App::open(&db_path)?;

    match config.command() {
        Command::Run { task } => {
            if let Some(task) = task {
                app.engine.set_task_label(&task);
            }
            let client = EncouragementClient::new(config.api_url.clone(), config.ai_timeout());
            timer::run_timer_loop(&mut app, client).await?;
        }
        Command::Stats => {
            println!("{}", timer::format_summary(&app.stats.summary()?));
        }
        Command::Report => match app.weekly_report()? {
            Some(report) => println!("{}", timer::format_report(report)),
            None => println!("The weekly report is a Pro feature. See `nudge pro`."),
        },
        Command::Settings(args) => {
            if !args.is_empty() {
                let updated = args.apply(app.engine.settings());
                app.update_settings(updated)?;
            }
            let s = app.engine.settings();
            println!("Focus: {} min", s.focus_minutes);
            println!("Short break: {} min", s.short_break_minutes);
            println!("Long break: {} min", s.long_break_minutes);
            println!("Long break every: {} sessions", s.sessions_before_long_break);
            println!("Sound: {}", on_off(s.sound_enabled));
            println!("Notifications: {}", on_off(s.notifications_enabled));
        }
        Command::Pro { action } => {
            if let Some(ProAction::Activate { plan, days }) = action {
                app.stats.activate_pro(&plan, days)?;
            }
            let active = app.stats.is_pro()?;
            let status = app.stats.pro_status()?;
            match (active, status.plan, status.expires_at) {
                (false, _, _) => println!("Free plan"),
                (true, plan, Some(expires)) => println!(
                    "Pro ({}) until {}",
                    plan.unwrap_or_default(),
                    expires.format("%Y-%m-%d")
                ),
                (true, plan, None) => println!("Pro ({})", plan.unwrap_or_default()),
            }
        }
        Command::Export { path } => {
            app.export_to(&path)?;
            println!("Exported to {}", path.display());
        }
        Command::Import { path } => {
            app.import_from(&path)?;
            println!("Imported {}", path.display());
        }
        Command::Clear { yes } => {
            if yes {
                app.stats.clear_all()?;
                app.engine.update_settings(app.stats.settings()?)?;
                app.engine.reset();
                println!("All data cleared.");
            } else {
                println!("This deletes all stats, streaks and settings. Re-run with --yes.");
            }
        }
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
