//! User registry - registration, lookup and admin bootstrap.
//!
//! The chat adapter registers a user before calling any shop operation; the
//! core never creates users on its own and answers `UserNotFound` instead.
//! Balances start at zero and are only changed by the ledger.

use crate::{
    entities::{User, user},
    errors::{RegistrationError, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use tracing::{debug, info, instrument};

/// Registers a user, or refreshes the display name of an existing one.
///
/// Registration is idempotent: calling it again for a known id never touches the
/// balance or the admin flag.
///
/// # Errors
/// Returns [`RegistrationError::InvalidUserId`] or
/// [`RegistrationError::EmptyDisplayName`] for blank input, and
/// [`RegistrationError::Store`] if the write fails.
#[instrument(skip(db))]
pub async fn register_user<C>(
    db: &C,
    user_id: &str,
    display_name: &str,
) -> std::result::Result<user::Model, RegistrationError>
where
    C: ConnectionTrait,
{
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(RegistrationError::InvalidUserId);
    }
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(RegistrationError::EmptyDisplayName);
    }

    if let Some(existing) = User::find_by_id(user_id).one(db).await? {
        if existing.display_name == display_name {
            return Ok(existing);
        }
        let mut active: user::ActiveModel = existing.into();
        active.display_name = Set(display_name.to_string());
        return Ok(active.update(db).await?);
    }

    insert_if_absent(db, user_id, display_name).await
}

/// Inserts a new user unless the id already exists, then returns the stored row.
///
/// A concurrent first registration of the same id makes the insert a no-op
/// instead of a key violation.
async fn insert_if_absent<C>(
    db: &C,
    user_id: &str,
    display_name: &str,
) -> std::result::Result<user::Model, RegistrationError>
where
    C: ConnectionTrait,
{
    let new_user = user::ActiveModel {
        id: Set(user_id.to_string()),
        display_name: Set(display_name.to_string()),
        balance: Set(0),
        is_admin: Set(false),
        created_at: Set(Utc::now()),
    };
    let inserted = User::insert(new_user)
        .on_conflict(OnConflict::column(user::Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;
    if inserted == 1 {
        debug!(user_id, "Registered new user");
    }

    User::find_by_id(user_id).one(db).await?.ok_or_else(|| {
        RegistrationError::Store(DbErr::RecordNotFound(format!("user {user_id}")))
    })
}

/// Finds a user by account id.
pub async fn get_user<C>(db: &C, user_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Returns whether the account is registered and flagged as admin.
pub async fn is_admin<C>(db: &C, user_id: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(get_user(db, user_id).await?.is_some_and(|u| u.is_admin))
}

/// Account ids of every admin, in id order.
pub async fn admin_ids<C>(db: &C) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    Ok(User::find()
        .filter(user::Column::IsAdmin.eq(true))
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect())
}

/// Sets the admin flag on each configured account, registering unknown ones
/// with their id as display name.
///
/// Known accounts keep their display name. Accounts not in `admin_ids` keep
/// whatever flag they have.
pub async fn bootstrap_admins<C>(db: &C, admin_ids: &[String]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut flagged = 0;
    for admin_id in admin_ids {
        let existing = match get_user(db, admin_id).await? {
            Some(existing) => existing,
            None => register_user(db, admin_id, admin_id).await?,
        };
        if !existing.is_admin {
            let mut active: user::ActiveModel = existing.into();
            active.is_admin = Set(true);
            active.update(db).await?;
        }
        flagged += 1;
    }
    info!(count = flagged, "Admin accounts bootstrapped");
    Ok(flagged)
}
