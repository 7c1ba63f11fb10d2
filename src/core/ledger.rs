//! Balance ledger - the only code that writes `users.balance`.
//!
//! Every balance change is a single database transaction that updates the user
//! row and appends exactly one row to the transaction log, recording the signed
//! amount and the resulting balance. Debits use a conditional update
//! (`balance = balance - amount WHERE balance >= amount`) so two concurrent debits
//! can never both spend the same points. Functions are generic over the
//! connection so the purchase engine can run them inside its own transaction.

use crate::{
    entities::{Transaction, TransactionKind, User, transaction, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, error, instrument};

/// What a balance change is for.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    /// Type tag stored on the transaction
    pub kind: TransactionKind,
    /// Human-readable reason
    pub description: &'a str,
    /// Admin responsible for the change, if any
    pub actor_id: Option<&'a str>,
}

impl<'a> Entry<'a> {
    /// An entry with no actor.
    #[must_use]
    pub const fn new(kind: TransactionKind, description: &'a str) -> Self {
        Self {
            kind,
            description,
            actor_id: None,
        }
    }

    /// Records the admin responsible for the change.
    #[must_use]
    pub const fn by(mut self, actor_id: &'a str) -> Self {
        self.actor_id = Some(actor_id);
        self
    }
}

/// Debits `amount` points from the user and logs a transaction of `-amount`.
///
/// The check and the write are one conditional `UPDATE`, so a stale balance can
/// never be spent. On failure nothing is written.
///
/// # Errors
/// - [`Error::InvalidAmount`] if `amount <= 0`
/// - [`Error::UserNotFound`] if the user is not registered
/// - [`Error::InsufficientFunds`] with the current balance if it is below `amount`
#[instrument(skip(db, entry), fields(kind = entry.kind.as_str()))]
pub async fn debit<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    entry: Entry<'_>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let updated = User::update_many()
        .col_expr(
            user::Column::Balance,
            Expr::col(user::Column::Balance).sub(amount),
        )
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::Balance.gte(amount))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        // Nothing changed: tell a missing user from a short balance
        let current = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::UserNotFound {
                user_id: user_id.to_string(),
            })?
            .balance;
        debug!(user_id, current, amount, "Debit refused, insufficient funds");
        return Err(Error::InsufficientFunds {
            current,
            required: amount,
        });
    }

    let record = append_entry(&txn, user_id, -amount, entry).await?;
    txn.commit().await?;

    debug!(user_id, amount, balance = record.balance_after, "Debited");
    Ok(record)
}

/// Credits `amount` points to the user and logs a transaction of `+amount`.
///
/// # Errors
/// - [`Error::InvalidAmount`] if `amount <= 0`
/// - [`Error::UserNotFound`] if the user is not registered
#[instrument(skip(db, entry), fields(kind = entry.kind.as_str()))]
pub async fn credit<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    entry: Entry<'_>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let updated = User::update_many()
        .col_expr(
            user::Column::Balance,
            Expr::col(user::Column::Balance).add(amount),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::UserNotFound {
            user_id: user_id.to_string(),
        });
    }

    let record = append_entry(&txn, user_id, amount, entry).await?;
    txn.commit().await?;

    debug!(user_id, amount, balance = record.balance_after, "Credited");
    Ok(record)
}

/// Reads the post-change balance and appends the matching log row.
async fn append_entry<C>(
    txn: &C,
    user_id: &str,
    amount: i64,
    entry: Entry<'_>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let balance_after = User::find_by_id(user_id)
        .one(txn)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })?
        .balance;

    if balance_after < 0 {
        error!(user_id, amount, balance_after, "Balance went negative");
        return Err(Error::InvariantViolation {
            message: format!(
                "balance of user {user_id} would be {balance_after} after applying {amount}"
            ),
        });
    }

    let record = transaction::ActiveModel {
        user_id: Set(user_id.to_string()),
        amount: Set(amount),
        balance_after: Set(balance_after),
        kind: Set(entry.kind),
        description: Set(entry.description.to_string()),
        actor_id: Set(entry.actor_id.map(ToString::to_string)),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(record.insert(txn).await?)
}

/// Returns the user's current balance.
///
/// # Errors
/// [`Error::UserNotFound`] if the user is not registered.
pub async fn get_balance<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(db)
        .await?
        .map(|u| u.balance)
        .ok_or_else(|| Error::UserNotFound {
            user_id: user_id.to_string(),
        })
}

/// Most recent transactions for a user, newest first.
pub async fn history<C>(db: &C, user_id: &str, limit: u64) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sum of every logged amount for the user.
pub async fn transaction_total<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let amounts: Vec<i64> = Transaction::find()
        .select_only()
        .column(transaction::Column::Amount)
        .filter(transaction::Column::UserId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;
    Ok(amounts.iter().sum())
}

/// Checks that the stored balance equals the sum of the user's transactions
/// and is not negative.
///
/// # Errors
/// [`Error::InvariantViolation`] describing the mismatch; it is logged here and
/// must not be repaired automatically.
pub async fn verify_balance<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let balance = get_balance(db, user_id).await?;
    let total = transaction_total(db, user_id).await?;

    if balance != total || balance < 0 {
        error!(user_id, balance, total, "Ledger invariant violated");
        return Err(Error::InvariantViolation {
            message: format!(
                "user {user_id} has balance {balance} but transactions sum to {total}"
            ),
        });
    }
    Ok(balance)
}
