//! Transaction entity - The append-only audit trail of every balance change.
//!
//! Each row records the signed `amount` applied to a user's balance and the
//! balance that resulted, so the log can be replayed and checked against the
//! stored balance. Rows are never updated or deleted.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Why a balance changed
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Debit for a catalog purchase
    #[sea_orm(string_value = "shop_purchase")]
    ShopPurchase,
    /// Manual credit or debit by an admin
    #[sea_orm(string_value = "admin_adjust")]
    AdminAdjust,
    /// Credit from a game or achievement collaborator
    #[sea_orm(string_value = "reward")]
    Reward,
}

impl TransactionKind {
    /// Tag as stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShopPurchase => "shop_purchase",
            Self::AdminAdjust => "admin_adjust",
            Self::Reward => "reward",
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User whose balance changed
    pub user_id: String,
    /// Signed change in points (negative for debits)
    pub amount: i64,
    /// Balance immediately after this change
    pub balance_after: i64,
    /// Type tag
    pub kind: TransactionKind,
    /// Human-readable reason
    pub description: String,
    /// Admin who made the change, if any
    pub actor_id: Option<String>,
    /// When the change was applied
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
