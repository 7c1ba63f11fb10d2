//! Discord handlers
//!
//! This module provides the non-command side of the bot: delivering scheduler
//! activations to channels and turning errors into replies.

/// Scheduler activations posted to Discord channels
pub mod notifier;

pub use notifier::{DiscordNotifier, activation_message};

use crate::errors::Error;

/// Reply text for a failed command.
///
/// Validation errors carry enough detail to be shown as-is; anything else is
/// logged by the caller and answered with a generic message.
#[must_use]
pub fn error_reply(error: &Error) -> String {
    match error {
        Error::InsufficientFunds { current, required } => format!(
            "❌ Not enough points: you have {current}, this costs {required}."
        ),
        Error::CooldownActive {
            item,
            remaining_secs,
        } => format!(
            "⏳ '{item}' is on cooldown, try again in {}.",
            format_duration(*remaining_secs)
        ),
        Error::ItemNotFound { selector } => {
            format!("❌ No item '{selector}'. Use `/shop` to see what's available.")
        }
        err if err.is_user_facing() => format!("❌ {err}"),
        Error::StoreUnavailable { .. } => {
            "⚠️ The shop is busy right now, please try again in a moment.".to_string()
        }
        _ => "⚠️ Something went wrong. The admins have been notified in the logs.".to_string(),
    }
}

/// Renders seconds as `1h 5m`, `3m 20s` or `45s`.
#[must_use]
pub fn format_duration(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, m) => format!("{m}m {seconds}s"),
        (h, m) => format!("{h}h {m}m"),
    }
}
