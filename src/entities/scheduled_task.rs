//! Scheduled task entity - Durable, time-triggered future work.
//!
//! A task is pending until the scheduler driver marks it completed; completion
//! never reverts and tasks are never deleted.

use super::effect::TaskData;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of work a task performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// End a timed privilege
    #[sea_orm(string_value = "expire_effect")]
    ExpireEffect,
    /// Post a paid broadcast
    #[sea_orm(string_value = "delayed_broadcast")]
    DelayedBroadcast,
}

/// Scheduled task database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scheduled_tasks")]
pub struct Model {
    /// Unique identifier for the task
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User the task acts for
    pub user_id: String,
    /// Channel to notify when the task fires
    pub chat_id: String,
    /// Kind of work, always matching `data`
    pub task_type: TaskType,
    /// Earliest time the task may run
    pub fire_at: DateTimeUtc,
    /// Payload for the handler
    pub data: TaskData,
    /// Set once by the scheduler driver
    pub completed: bool,
    /// When the driver marked the task completed
    pub completed_at: Option<DateTimeUtc>,
    /// When the task was scheduled
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ScheduledTask` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each task belongs to one user
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
