//! Purchase engine - validates a purchase, debits the buyer and installs the effect.
//!
//! A purchase is one database transaction:
//!
//! 1. resolve the item (its price is fixed from this read on)
//! 2. resolve the buyer
//! 3. enforce the per-user purchase limit
//! 4. enforce the cooldown
//! 5. debit the price through the ledger
//! 6. write the purchase and, for effects with a future transition, its task
//!
//! Any error, including one after the debit, drops the transaction, so the
//! debit is rolled back together with everything else. No compensating credit is
//! ever written. Transient store failures retry the whole sequence.

use crate::{
    core::{
        catalog::{self, ItemSelector},
        ledger::{self, Entry},
        scheduler::{self, NewTask},
        store::Store,
        user,
    },
    entities::{
        ItemEffect, Purchase, PurchaseEffect, PurchaseStatus, TaskData, Transaction,
        TransactionKind, catalog_item, purchase,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{error, info, instrument};

/// A user's request to buy one item.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    /// Buyer's account id
    pub user_id: String,
    /// Which item
    pub selector: ItemSelector,
    /// Channel the request came from; scheduled notifications go here
    pub chat_id: String,
    /// Text for broadcast items
    pub message: Option<String>,
}

/// What the caller should do right away about the granted effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectInstruction {
    /// `action` is unlimited for the buyer until `until`
    GrantUntil {
        /// Capability name
        action: String,
        /// End of the privilege
        until: DateTime<Utc>,
    },
    /// Forward `request` to the admins
    RequestSubmitted {
        /// Request text
        request: String,
    },
    /// The broadcast will be posted at `fire_at`
    BroadcastScheduled {
        /// When the scheduler posts it
        fire_at: DateTime<Utc>,
    },
}

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    /// New purchase record
    pub purchase_id: i64,
    /// Debit that paid for it
    pub transaction_id: i64,
    /// Task installed for the effect, if any
    pub task_id: Option<i64>,
    /// Item name
    pub item_name: String,
    /// Price paid
    pub price: i64,
    /// Buyer's balance after the debit
    pub new_balance: i64,
    /// Immediate effect for the caller to apply
    pub instruction: EffectInstruction,
}

/// Buys an item for the requesting user.
///
/// Validation failures come back as errors carrying the detail needed for a
/// reply: [`Error::ItemNotFound`], [`Error::UserNotFound`],
/// [`Error::PurchaseLimitExceeded`], [`Error::CooldownActive`],
/// [`Error::InsufficientFunds`] and [`Error::InvalidRequest`]. None of them
/// leaves anything behind.
#[instrument(skip(store, request), fields(user_id = %request.user_id, selector = %request.selector))]
pub async fn purchase(store: &Store, request: &PurchaseRequest) -> Result<PurchaseReceipt> {
    let now = Utc::now();
    let db = store.connection();
    let result = store
        .run("purchase", move || purchase_at(db, request, now))
        .await;

    match &result {
        Ok(receipt) => info!(
            purchase_id = receipt.purchase_id,
            item = %receipt.item_name,
            price = receipt.price,
            new_balance = receipt.new_balance,
            "Purchase completed"
        ),
        Err(err) if err.is_user_facing() => info!(error = %err, "Purchase refused"),
        Err(err) => error!(error = %err, "Purchase failed"),
    }
    result
}

/// Runs the purchase sequence at a fixed time inside one database transaction.
pub async fn purchase_at<C>(
    db: &C,
    request: &PurchaseRequest,
    now: DateTime<Utc>,
) -> Result<PurchaseReceipt>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let receipt = apply_purchase(&txn, request, now).await?;
    txn.commit().await?;
    Ok(receipt)
}

async fn apply_purchase<C>(
    txn: &C,
    request: &PurchaseRequest,
    now: DateTime<Utc>,
) -> Result<PurchaseReceipt>
where
    C: ConnectionTrait + TransactionTrait,
{
    let item = catalog::resolve(txn, request.selector).await?;
    let buyer = user::get_user(txn, &request.user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: request.user_id.clone(),
        })?;

    let broadcast_message = match (&item.effect, request.message.as_deref().map(str::trim)) {
        (ItemEffect::Broadcast { .. }, Some(message)) if !message.is_empty() => {
            Some(message.to_string())
        }
        (ItemEffect::Broadcast { .. }, _) => {
            return Err(Error::InvalidRequest {
                message: format!("'{}' needs a message to broadcast", item.name),
            });
        }
        _ => None,
    };

    check_purchase_limit(txn, &buyer.id, &item).await?;
    check_cooldown(txn, &buyer.id, &item, now).await?;

    let description = format!("Purchase: {}", item.name);
    let debit = ledger::debit(
        txn,
        &buyer.id,
        item.price,
        Entry::new(TransactionKind::ShopPurchase, &description),
    )
    .await?;

    let plan = plan_effect(&item.effect, broadcast_message, now);
    let record = purchase::ActiveModel {
        user_id: Set(buyer.id.clone()),
        item_id: Set(item.id),
        transaction_id: Set(debit.id),
        price_paid: Set(item.price),
        status: Set(plan.status),
        effect: Set(plan.effect),
        purchased_at: Set(now),
        expires_at: Set(plan.expires_at),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let task_id = match plan.task {
        Some((fire_at, pending)) => {
            let task = scheduler::schedule(
                txn,
                NewTask {
                    user_id: buyer.id.clone(),
                    chat_id: request.chat_id.clone(),
                    fire_at,
                    data: pending.into_task_data(record.id),
                },
                now,
            )
            .await?;
            Some(task.id)
        }
        None => None,
    };

    Ok(PurchaseReceipt {
        purchase_id: record.id,
        transaction_id: debit.id,
        task_id,
        item_name: item.name,
        price: item.price,
        new_balance: debit.balance_after,
        instruction: plan.instruction,
    })
}

async fn check_purchase_limit<C>(txn: &C, user_id: &str, item: &catalog_item::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let Ok(limit) = u32::try_from(item.purchase_limit) else {
        return Ok(());
    };
    if limit == 0 {
        return Ok(());
    }

    let owned = Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .filter(purchase::Column::ItemId.eq(item.id))
        .filter(purchase::Column::Status.ne(PurchaseStatus::Expired))
        .count(txn)
        .await?;

    if owned >= u64::from(limit) {
        return Err(Error::PurchaseLimitExceeded {
            item: item.name.clone(),
            limit,
            owned,
        });
    }
    Ok(())
}

async fn check_cooldown<C>(
    txn: &C,
    user_id: &str,
    item: &catalog_item::Model,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if item.cooldown_secs <= 0 {
        return Ok(());
    }

    let last = Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .filter(purchase::Column::ItemId.eq(item.id))
        .order_by_desc(purchase::Column::PurchasedAt)
        .order_by_desc(purchase::Column::Id)
        .one(txn)
        .await?;

    if let Some(last) = last {
        let ready_at = last.purchased_at + Duration::seconds(item.cooldown_secs);
        if ready_at > now {
            // Round up so "0s remaining" is never reported
            let remaining_ms = (ready_at - now).num_milliseconds();
            return Err(Error::CooldownActive {
                item: item.name.clone(),
                remaining_secs: (remaining_ms + 999) / 1000,
            });
        }
    }
    Ok(())
}

/// Task payload that still needs the purchase id.
enum PendingTask {
    Expire { action: String },
    Broadcast { message: String },
}

impl PendingTask {
    fn into_task_data(self, purchase_id: i64) -> TaskData {
        match self {
            Self::Expire { action } => TaskData::ExpireEffect {
                purchase_id,
                action,
            },
            Self::Broadcast { message } => TaskData::DelayedBroadcast {
                purchase_id,
                message,
            },
        }
    }
}

struct EffectPlan {
    status: PurchaseStatus,
    effect: PurchaseEffect,
    expires_at: Option<DateTime<Utc>>,
    task: Option<(DateTime<Utc>, PendingTask)>,
    instruction: EffectInstruction,
}

fn plan_effect(effect: &ItemEffect, broadcast_message: Option<String>, now: DateTime<Utc>) -> EffectPlan {
    match effect {
        ItemEffect::TimedUnlimitedAction {
            action,
            duration_secs,
        } => {
            let ends_at = now + Duration::seconds(*duration_secs);
            EffectPlan {
                status: PurchaseStatus::Active,
                effect: PurchaseEffect::TimedUnlimitedAction {
                    action: action.clone(),
                    starts_at: now,
                    ends_at,
                },
                expires_at: Some(ends_at),
                task: Some((
                    ends_at,
                    PendingTask::Expire {
                        action: action.clone(),
                    },
                )),
                instruction: EffectInstruction::GrantUntil {
                    action: action.clone(),
                    until: ends_at,
                },
            }
        }
        ItemEffect::OneShotRequest { request } => EffectPlan {
            status: PurchaseStatus::Delivered,
            effect: PurchaseEffect::OneShotRequest {
                request: request.clone(),
            },
            expires_at: None,
            task: None,
            instruction: EffectInstruction::RequestSubmitted {
                request: request.clone(),
            },
        },
        ItemEffect::Broadcast { delay_secs } => {
            let fire_at = now + Duration::seconds(*delay_secs);
            let message = broadcast_message.unwrap_or_default();
            EffectPlan {
                status: PurchaseStatus::Active,
                effect: PurchaseEffect::Broadcast {
                    message: message.clone(),
                    fire_at,
                },
                expires_at: None,
                task: Some((fire_at, PendingTask::Broadcast { message })),
                instruction: EffectInstruction::BroadcastScheduled { fire_at },
            }
        }
    }
}

/// Purchases whose effect is still in force or waiting to fire, newest first.
pub async fn active_purchases<C>(db: &C, user_id: &str) -> Result<Vec<purchase::Model>>
where
    C: ConnectionTrait,
{
    Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .filter(purchase::Column::Status.eq(PurchaseStatus::Active))
        .order_by_desc(purchase::Column::PurchasedAt)
        .order_by_desc(purchase::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Whether the user currently holds an unexpired timed privilege for `action`.
pub async fn has_active_effect<C>(
    db: &C,
    user_id: &str,
    action: &str,
    now: DateTime<Utc>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(active_purchases(db, user_id)
        .await?
        .iter()
        .any(|p| match &p.effect {
            PurchaseEffect::TimedUnlimitedAction {
                action: granted,
                starts_at,
                ends_at,
            } => granted == action && *starts_at <= now && now < *ends_at,
            _ => false,
        }))
}

/// Checks that every purchase points at a `shop_purchase` debit of the same
/// user for exactly `-price_paid`.
///
/// # Errors
/// [`Error::InvariantViolation`] naming the first offending purchase.
pub async fn verify_purchase_links<C>(db: &C) -> Result<usize>
where
    C: ConnectionTrait,
{
    let debits: HashMap<i64, _> = Transaction::find()
        .filter(crate::entities::transaction::Column::Kind.eq(TransactionKind::ShopPurchase))
        .all(db)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    let purchases = Purchase::find().all(db).await?;
    for p in &purchases {
        let linked = debits
            .get(&p.transaction_id)
            .is_some_and(|t| t.user_id == p.user_id && t.amount == -p.price_paid);
        if !linked {
            error!(
                purchase_id = p.id,
                transaction_id = p.transaction_id,
                user_id = %p.user_id,
                price_paid = p.price_paid,
                "Purchase without matching debit"
            );
            return Err(Error::InvariantViolation {
                message: format!(
                    "purchase {} has no matching debit transaction {}",
                    p.id, p.transaction_id
                ),
            });
        }
    }
    Ok(purchases.len())
}
