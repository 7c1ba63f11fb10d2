//! Catalog seed configuration loaded from config.toml.
//!
//! The `[[items]]` entries describe the catalog the bot starts with. Seeding is
//! idempotent by item name, so restarting with the same file leaves existing items
//! (and their ids) alone.

use crate::entities::ItemEffect;
use serde::Deserialize;

/// Configuration for a single catalog item
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogItemConfig {
    /// Display name, unique across the catalog
    pub name: String,
    /// Price in points
    pub price: i64,
    /// Shop listing text
    #[serde(default)]
    pub description: String,
    /// What the item grants
    pub effect: ItemEffect,
    /// Maximum unexpired purchases per user (0 = unlimited)
    #[serde(default)]
    pub purchase_limit: i32,
    /// Seconds between purchases by the same user (0 = none)
    #[serde(default)]
    pub cooldown_secs: i64,
    /// Listing position
    #[serde(default)]
    pub sort_key: i32,
}
