//! Unified error types for the perk shop.
//!
//! Validation outcomes (`UserNotFound`, `InsufficientFunds`, ...) carry the
//! structured detail the chat layer needs to render a precise reply. Store
//! failures are split into transient ones, which the store adapter retries, and
//! everything else.

use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// No user record exists for this account id
    #[error("User '{user_id}' is not registered")]
    UserNotFound {
        /// Platform account id that was looked up
        user_id: String,
    },

    /// Selector does not name an active catalog item
    #[error("No active item matches '{selector}'")]
    ItemNotFound {
        /// Selector as the caller supplied it
        selector: String,
    },

    /// Balance is lower than the amount to debit
    #[error("Insufficient funds: balance {current} points, {required} points required")]
    InsufficientFunds {
        /// Balance at the time of the check
        current: i64,
        /// Amount the operation needed
        required: i64,
    },

    /// The user already owns as many unexpired copies of the item as allowed
    #[error("Purchase limit reached for '{item}' ({owned}/{limit})")]
    PurchaseLimitExceeded {
        /// Item name
        item: String,
        /// Configured limit
        limit: u32,
        /// Unexpired purchases the user holds
        owned: u64,
    },

    /// The item's cooldown has not elapsed since the user's last purchase
    #[error("'{item}' is on cooldown for another {remaining_secs}s")]
    CooldownActive {
        /// Item name
        item: String,
        /// Seconds until the item can be bought again
        remaining_secs: i64,
    },

    /// Amount is zero or negative
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Rejected amount
        amount: i64,
    },

    /// Request is missing something the item needs
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What is missing or malformed
        message: String,
    },

    /// The store kept failing with transient errors until retries ran out
    #[error("Store unavailable during {operation} after {attempts} attempts: {message}")]
    StoreUnavailable {
        /// Operation that was being attempted
        operation: String,
        /// Number of attempts made
        attempts: u32,
        /// Last store error
        message: String,
    },

    /// Internal consistency check failed. Never retried.
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Description including the offending ids
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Typed JSON column could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Serenity/Poise framework error
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl Error {
    /// Returns true for store failures that may succeed when retried:
    /// pool exhaustion, dropped connections and `SQLite` busy/locked errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => is_transient_db_err(err),
            _ => false,
        }
    }

    /// Returns true for outcomes that are a normal answer to a user request
    /// rather than a failure of the system.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound { .. }
                | Self::ItemNotFound { .. }
                | Self::InsufficientFunds { .. }
                | Self::PurchaseLimitExceeded { .. }
                | Self::CooldownActive { .. }
                | Self::InvalidAmount { .. }
                | Self::InvalidRequest { .. }
        )
    }
}

fn is_transient_db_err(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            let message = e.to_string().to_lowercase();
            message.contains("database is locked") || message.contains("busy")
        }
        _ => false,
    }
}

/// Why a user could not be registered.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The account id is empty or whitespace
    #[error("User id must not be empty")]
    InvalidUserId,

    /// The display name is empty or whitespace
    #[error("Display name must not be empty")]
    EmptyDisplayName,

    /// The store rejected the write
    #[error("Could not store user: {0}")]
    Store(#[from] DbErr),
}

impl From<RegistrationError> for Error {
    fn from(value: RegistrationError) -> Self {
        match value {
            RegistrationError::Store(err) => Self::Database(err),
            other => Self::InvalidRequest {
                message: other.to_string(),
            },
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
