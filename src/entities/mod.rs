//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the five durable relations of the shop and their
//! relationships. Each entity has a Model struct for data and an Entity struct
//! for operations.

pub mod catalog_item;
pub mod effect;
pub mod purchase;
pub mod scheduled_task;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use catalog_item::{
    Column as CatalogItemColumn, Entity as CatalogItem, Model as CatalogItemModel,
};
pub use effect::{ItemEffect, PurchaseEffect, TaskData};
pub use purchase::{
    Column as PurchaseColumn, Entity as Purchase, Model as PurchaseModel, PurchaseStatus,
};
pub use scheduled_task::{
    Column as ScheduledTaskColumn, Entity as ScheduledTask, Model as ScheduledTaskModel, TaskType,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionKind,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
