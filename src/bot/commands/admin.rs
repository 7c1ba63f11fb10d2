//! Admin Discord commands - `grant` and `deduct`.
//!
//! Both go through the ledger, so admin adjustments appear in the transaction
//! log with the acting admin recorded.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::Context,
        core::{
            ledger::{self, Entry},
            user::register_user,
        },
        entities::TransactionKind,
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use tracing::info;

    fn validate_amount(amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(Error::InvalidAmount { amount });
        }
        Ok(())
    }

    /// Gives points to a user.
    #[poise::command(slash_command, prefix_command, check = "crate::bot::require_admin")]
    pub async fn grant(
        ctx: Context<'_>,
        #[description = "User to receive points"] user: serenity::User,
        #[description = "Points to add"] amount: i64,
        #[description = "Reason shown in the history"] reason: Option<String>,
    ) -> Result<()> {
        validate_amount(amount)?;
        let store = &ctx.data().store;
        let db = store.connection();
        let target = register_user(db, &user.id.to_string(), &user.name).await?;
        let admin_id = ctx.author().id.to_string();
        let description = reason.unwrap_or_else(|| "Admin grant".to_string());

        let entry = Entry::new(TransactionKind::AdminAdjust, &description).by(&admin_id);
        let target_id = target.id.as_str();
        let logged = store
            .run("grant", move || ledger::credit(db, target_id, amount, entry))
            .await?;

        info!(admin = %admin_id, user_id = %target.id, amount, "Points granted");
        ctx.say(format!(
            "✅ Granted {amount} points to <@{}>. New balance: **{}**.",
            target.id, logged.balance_after
        ))
        .await?;
        Ok(())
    }

    /// Takes points from a user.
    #[poise::command(slash_command, prefix_command, check = "crate::bot::require_admin")]
    pub async fn deduct(
        ctx: Context<'_>,
        #[description = "User to take points from"] user: serenity::User,
        #[description = "Points to remove"] amount: i64,
        #[description = "Reason shown in the history"] reason: Option<String>,
    ) -> Result<()> {
        validate_amount(amount)?;
        let store = &ctx.data().store;
        let db = store.connection();
        let target = register_user(db, &user.id.to_string(), &user.name).await?;
        let admin_id = ctx.author().id.to_string();
        let description = reason.unwrap_or_else(|| "Admin deduction".to_string());

        let entry = Entry::new(TransactionKind::AdminAdjust, &description).by(&admin_id);
        let target_id = target.id.as_str();
        let logged = store
            .run("deduct", move || ledger::debit(db, target_id, amount, entry))
            .await?;

        info!(admin = %admin_id, user_id = %target.id, amount, "Points deducted");
        ctx.say(format!(
            "✅ Deducted {amount} points from <@{}>. New balance: **{}**.",
            target.id, logged.balance_after
        ))
        .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
