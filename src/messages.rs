//! Motivational message pools shown by the timer.

use rand::seq::IndexedRandom;

const START_MESSAGES: &[&str] = &[
    "You've got this! One moment at a time. 💪",
    "Let's do this! Your future self will thank you. 🚀",
    "Starting is the hardest part. You did it! ⭐",
    "Focus mode: activated. You're amazing! 🌟",
    "Here we go! Small steps, big progress. 🎯",
];

const ENCOURAGEMENT_MESSAGES: &[&str] = &[
    "You're doing great! Keep it up! 🌈",
    "Still going strong! Proud of you! 💜",
    "You've got momentum! 🔥",
    "Your brain is working hard. Respect! 🧠",
    "Look at you, focusing! Amazing! ✨",
];

const COMPLETION_MESSAGES: &[&str] = &[
    "You did it! Time for a well-deserved break! 🎉",
    "Session complete! Your brain thanks you! 🧠💜",
    "Amazing work! Every session makes you stronger! 💪",
    "Fantastic! You showed up and that's what counts! ⭐",
    "Completed! Progress over perfection, always! 🌟",
];

pub const PAUSE_MESSAGE: &str = "Taking a breather? That's okay! Resume when ready. 🌱";
pub const BREAK_OVER_MESSAGE: &str = "Break's over. Ready when you are. 🌱";

fn pick(pool: &'static [&'static str]) -> &'static str {
    pool.choose(&mut rand::rng()).copied().unwrap_or("Keep going! 🌱")
}

/// Message shown when a focus interval starts.
pub fn start_message() -> &'static str {
    pick(START_MESSAGES)
}

/// Message shown at every five-minute mark.
pub fn encouragement_message() -> &'static str {
    pick(ENCOURAGEMENT_MESSAGES)
}

/// Message shown when a focus interval completes.
pub fn completion_message() -> &'static str {
    pick(COMPLETION_MESSAGES)
}

/// Feedback for partial credit when a focus session is skipped.
pub fn partial_credit_message(minutes: u32) -> String {
    format!("Great job on {minutes} minutes! Every bit counts. 🌟")
}

/// Feedback for an accepted manual time adjustment.
pub fn adjustment_message(delta_minutes: i32) -> String {
    let action = if delta_minutes > 0 { "Added" } else { "Removed" };
    let amount = delta_minutes.unsigned_abs();
    let plural = if amount == 1 { "" } else { "s" };
    format!("{action} {amount} minute{plural}. You're in control! ✨")
}
