//! Catalog item entity - Something a user can buy with points.
//!
//! Items are written by the catalog-management collaborator (config seeding);
//! the core only reads them. Only `is_active` changes after creation.

use super::effect::ItemEffect;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique across the catalog
    #[sea_orm(unique)]
    pub name: String,
    /// Price in points, always positive
    pub price: i64,
    /// Shown next to the name in the shop listing
    pub description: String,
    /// What the item grants
    pub effect: ItemEffect,
    /// Maximum unexpired purchases per user (0 = unlimited)
    pub purchase_limit: i32,
    /// Minimum seconds between purchases by the same user (0 = none)
    pub cooldown_secs: i64,
    /// Listing position; ties are broken by id
    pub sort_key: i32,
    /// Inactive items are hidden and cannot be bought
    pub is_active: bool,
    /// When the item was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `CatalogItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One item has many purchases
    #[sea_orm(has_many = "super::purchase::Entity")]
    Purchases,
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
