//! User entity - A chat-platform account holding a point balance.
//!
//! Users are created on first interaction and never deleted; transactions,
//! purchases and scheduled tasks keep referring to them. The balance column is
//! written only by the ledger.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Platform account id (Discord user id)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Name shown in listings and notifications
    pub display_name: String,
    /// Current balance in points, never negative
    pub balance: i64,
    /// Whether this user may run admin adjustments
    pub is_admin: bool,
    /// When the user first interacted with the bot
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One user has many purchases
    #[sea_orm(has_many = "super::purchase::Entity")]
    Purchases,
    /// One user has many scheduled tasks
    #[sea_orm(has_many = "super::scheduled_task::Entity")]
    ScheduledTasks,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl Related<super::scheduled_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledTasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
