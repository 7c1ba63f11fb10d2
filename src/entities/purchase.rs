//! Purchase entity - A recorded grant of an item's effect to a user.
//!
//! Every purchase is written in the same database transaction as its debit and
//! points at it through `transaction_id`. Expiry changes `status` but the row is
//! kept for history.

use super::effect::PurchaseEffect;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a purchase
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Effect is in force or still waiting to fire
    #[sea_orm(string_value = "active")]
    Active,
    /// Timed effect ran out
    #[sea_orm(string_value = "expired")]
    Expired,
    /// One-shot effect has been carried out
    #[sea_orm(string_value = "delivered")]
    Delivered,
}

/// Purchase database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    /// Unique identifier for the purchase
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Buyer
    pub user_id: String,
    /// Item bought
    pub item_id: i64,
    /// Debit transaction that paid for this purchase
    pub transaction_id: i64,
    /// Price read from the catalog when the purchase was made
    pub price_paid: i64,
    /// Current lifecycle state
    pub status: PurchaseStatus,
    /// Parameters of the granted effect
    pub effect: PurchaseEffect,
    /// When the purchase was made
    pub purchased_at: DateTimeUtc,
    /// When a timed effect ends
    pub expires_at: Option<DateTimeUtc>,
}

/// Defines relationships between Purchase and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each purchase belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each purchase is of one catalog item
    #[sea_orm(
        belongs_to = "super::catalog_item::Entity",
        from = "Column::ItemId",
        to = "super::catalog_item::Column::Id"
    )]
    CatalogItem,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::catalog_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
