//! Shared test utilities for the perk shop.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        catalog::{self, NewCatalogItem},
        ledger::{self, Entry},
        scheduler::{EffectActivation, EffectNotifier},
        user,
    },
    entities::{self, ItemEffect, TransactionKind},
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Registers a user and credits `amount` points as a reward.
///
/// # Defaults
/// * display name: `"user-<id>"`
/// * no credit when `amount` is 0
pub async fn create_funded_user(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
) -> Result<entities::user::Model> {
    user::register_user(db, user_id, &format!("user-{user_id}")).await?;
    if amount > 0 {
        ledger::credit(
            db,
            user_id,
            amount,
            Entry::new(TransactionKind::Reward, "Test funding"),
        )
        .await?;
    }
    user::get_user(db, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })
}

fn base_item(name: &str, price: i64, effect: ItemEffect) -> NewCatalogItem {
    NewCatalogItem {
        name: name.to_string(),
        price,
        description: format!("{name} for testing"),
        effect,
        purchase_limit: 0,
        cooldown_secs: 0,
        sort_key: 0,
    }
}

/// A one-shot request item with no limit or cooldown.
pub fn one_shot_item(name: &str, price: i64) -> NewCatalogItem {
    base_item(
        name,
        price,
        ItemEffect::OneShotRequest {
            request: format!("{name} request"),
        },
    )
}

/// An item granting `action` for `duration_secs`.
pub fn timed_item(name: &str, price: i64, action: &str, duration_secs: i64) -> NewCatalogItem {
    base_item(
        name,
        price,
        ItemEffect::TimedUnlimitedAction {
            action: action.to_string(),
            duration_secs,
        },
    )
}

/// A broadcast item posted `delay_secs` after purchase.
pub fn broadcast_item(name: &str, price: i64, delay_secs: i64) -> NewCatalogItem {
    base_item(name, price, ItemEffect::Broadcast { delay_secs })
}

/// Inserts a catalog item.
pub async fn create_test_item(
    db: &DatabaseConnection,
    item: NewCatalogItem,
) -> Result<entities::catalog_item::Model> {
    catalog::create_item(db, item).await
}

/// Notifier that remembers every activation it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    activations: Mutex<Vec<EffectActivation>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier that records, then reports failure.
    pub fn failing() -> Self {
        Self {
            activations: Mutex::default(),
            fail: true,
        }
    }

    /// Activations received so far.
    pub fn activations(&self) -> Vec<EffectActivation> {
        self.activations.lock().unwrap().clone()
    }
}

#[async_trait]
impl EffectNotifier for RecordingNotifier {
    async fn notify(&self, activation: &EffectActivation) -> Result<()> {
        self.activations.lock().unwrap().push(activation.clone());
        if self.fail {
            return Err(Error::InvalidRequest {
                message: "notifier offline".to_string(),
            });
        }
        Ok(())
    }
}

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("perk_shop=debug"))
        .with_test_writer()
        .try_init();
}
