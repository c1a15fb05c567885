//! Desktop notifications for finished intervals.

use crate::models::TimerMode;
use notify_rust::Notification;
use std::thread;
use tracing::warn;

/// Summary and body for the notification shown when `finished` ends.
pub fn completion_text(finished: TimerMode, completed_today: u32) -> (&'static str, String) {
    match finished {
        TimerMode::Focus => {
            let body = if completed_today == 1 {
                "Great work! You've completed 1 session today.\nTime for a break.".to_string()
            } else {
                format!(
                    "Great work! You've completed {} sessions today.\nTime for a break.",
                    completed_today
                )
            };
            ("🎉 Focus Session Complete!", body)
        }
        TimerMode::ShortBreak | TimerMode::LongBreak => {
            ("☕ Break Time Over!", "Ready to focus again?".to_string())
        }
    }
}

/// Shows a notification for a finished interval.
/// Runs in a background thread to avoid blocking the countdown.
pub fn notify_finished(finished: TimerMode, completed_today: u32) {
    let (summary, body) = completion_text(finished, completed_today);
    thread::spawn(move || {
        if let Err(e) = Notification::new()
            .summary(summary)
            .body(&body)
            .appname("Nudge")
            .show()
        {
            warn!(error = %e, "Failed to show notification");
        }
    });
}
