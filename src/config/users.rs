//! Admin account configuration.
//!
//! Admin ids come from `config.toml` (`[admins] user_ids`) and from the
//! comma-separated `ADMIN_USER_IDS` environment variable. They are applied to the
//! `is_admin` flag of the user records at startup; nothing else in the code
//! compares against a fixed account id.

use serde::Deserialize;

/// `[admins]` section of config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Accounts that get the admin flag at startup
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// Parses a comma-separated id list, skipping blanks.
#[must_use]
pub fn parse_admin_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Merges configured admin ids with those from `ADMIN_USER_IDS`, without duplicates.
#[must_use]
pub fn get_admin_ids(config: &AdminConfig) -> Vec<String> {
    let mut ids = config.user_ids.clone();
    if let Ok(raw) = std::env::var("ADMIN_USER_IDS") {
        for id in parse_admin_ids(&raw) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
