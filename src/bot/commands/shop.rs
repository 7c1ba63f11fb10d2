//! Shop Discord commands - `shop`, `buy`, `balance`, `history` and `inventory`.
//!
//! Every command registers the invoking user first, so members can use the
//! shop without a separate sign-up step.

use crate::{
    core::{
        catalog::CatalogEntry,
        purchase::{EffectInstruction, PurchaseReceipt},
    },
    entities::{PurchaseEffect, PurchaseModel, TransactionModel},
};
use poise::serenity_prelude::UserId;
use std::fmt::Write as _;

/// Number of log entries `/history` shows.
const HISTORY_LIMIT: u64 = 10;

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{HISTORY_LIMIT, catalog_message, history_message, inventory_message, receipt_message};
    use crate::{
        bot::{Context, handlers::notifier::user_id, register_author},
        core::{
            catalog::{self, ItemSelector},
            ledger,
            purchase::{self, EffectInstruction, PurchaseRequest},
            user,
        },
        errors::Result,
    };
    use poise::{
        CreateReply,
        serenity_prelude::{CreateAllowedMentions, UserId},
    };
    use tracing::warn;

    /// Lists the items for sale.
    #[poise::command(slash_command, prefix_command)]
    pub async fn shop(ctx: Context<'_>) -> Result<()> {
        let entries = catalog::list_catalog(ctx.data().store.connection()).await?;
        ctx.say(catalog_message(&entries)).await?;
        Ok(())
    }

    /// Buys an item from the shop.
    #[poise::command(slash_command, prefix_command)]
    pub async fn buy(
        ctx: Context<'_>,
        #[description = "Item number from /shop, or #id"] item: String,
        #[description = "Message for broadcast items"]
        #[rest]
        message: Option<String>,
    ) -> Result<()> {
        let selector: ItemSelector = item.parse()?;
        let buyer = register_author(ctx).await?;

        let request = PurchaseRequest {
            user_id: buyer.id,
            selector,
            chat_id: ctx.channel_id().to_string(),
            message,
        };
        let receipt = purchase::purchase(&ctx.data().store, &request).await?;

        // One-shot requests are forwarded by pinging the admins in the receipt
        let admins: Vec<UserId> = match receipt.instruction {
            EffectInstruction::RequestSubmitted { .. } => {
                user::admin_ids(ctx.data().store.connection())
                    .await
                    .inspect_err(|err| warn!(error = %err, "Could not load admins for request"))
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|id| user_id(id))
                    .collect()
            }
            _ => Vec::new(),
        };

        let reply = CreateReply::default()
            .content(receipt_message(&receipt, &admins))
            .allowed_mentions(CreateAllowedMentions::new().users(admins.iter().copied()));
        ctx.send(reply).await?;
        Ok(())
    }

    /// Shows your points.
    #[poise::command(slash_command, prefix_command)]
    pub async fn balance(ctx: Context<'_>) -> Result<()> {
        let user = register_author(ctx).await?;
        ctx.say(format!("💰 You have **{}** points.", user.balance))
            .await?;
        Ok(())
    }

    /// Shows your recent point changes.
    #[poise::command(slash_command, prefix_command)]
    pub async fn history(ctx: Context<'_>) -> Result<()> {
        let user = register_author(ctx).await?;
        let entries =
            ledger::history(ctx.data().store.connection(), &user.id, HISTORY_LIMIT).await?;
        ctx.say(history_message(&entries)).await?;
        Ok(())
    }

    /// Shows your active perks and pending broadcasts.
    #[poise::command(slash_command, prefix_command)]
    pub async fn inventory(ctx: Context<'_>) -> Result<()> {
        let user = register_author(ctx).await?;
        let active = purchase::active_purchases(ctx.data().store.connection(), &user.id).await?;
        ctx.say(inventory_message(&active)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;

/// Shop listing text.
#[must_use]
pub fn catalog_message(entries: &[CatalogEntry]) -> String {
    if entries.is_empty() {
        return "🛒 The shop is empty right now.".to_string();
    }
    let mut text = String::from("🛒 **Perk Shop**\n");
    for entry in entries {
        let _ = write!(
            text,
            "\n`{}.` **{}** - {} pts",
            entry.ordinal, entry.name, entry.price
        );
        if !entry.description.is_empty() {
            let _ = write!(text, "\n    {}", entry.description);
        }
    }
    text.push_str("\n\nBuy with `/buy <number>`.");
    text
}

/// Reply for a completed purchase. One-shot requests mention `admins`.
#[must_use]
pub fn receipt_message(receipt: &PurchaseReceipt, admins: &[UserId]) -> String {
    let effect = match &receipt.instruction {
        EffectInstruction::GrantUntil { action, until } => format!(
            "Unlimited **{action}** until <t:{}:f>.",
            until.timestamp()
        ),
        EffectInstruction::RequestSubmitted { request } if admins.is_empty() => format!(
            "Your request \"{request}\" is recorded, but no shop admin is configured yet."
        ),
        EffectInstruction::RequestSubmitted { request } => {
            let mentions: Vec<String> = admins.iter().map(|id| format!("<@{id}>")).collect();
            format!(
                "Your request \"{request}\" was forwarded to {}.",
                mentions.join(", ")
            )
        }
        EffectInstruction::BroadcastScheduled { fire_at } => {
            format!("Your broadcast goes out <t:{}:R>.", fire_at.timestamp())
        }
    };
    format!(
        "✅ Bought **{}** for {} pts. {effect}\nBalance: **{}** points.",
        receipt.item_name, receipt.price, receipt.new_balance
    )
}

/// Transaction log text, newest first.
#[must_use]
pub fn history_message(entries: &[TransactionModel]) -> String {
    if entries.is_empty() {
        return "📜 No point changes yet.".to_string();
    }
    let mut text = String::from("📜 **Recent point changes**\n");
    for entry in entries {
        let _ = write!(
            text,
            "\n<t:{}:d> `{:+}` → {} - {}",
            entry.created_at.timestamp(),
            entry.amount,
            entry.balance_after,
            entry.description
        );
    }
    text
}

/// Active purchases text.
#[must_use]
pub fn inventory_message(purchases: &[PurchaseModel]) -> String {
    if purchases.is_empty() {
        return "🎒 You have no active perks.".to_string();
    }
    let mut text = String::from("🎒 **Active perks**\n");
    for purchase in purchases {
        let line = match &purchase.effect {
            PurchaseEffect::TimedUnlimitedAction {
                action, ends_at, ..
            } => format!("Unlimited **{action}** until <t:{}:f>", ends_at.timestamp()),
            PurchaseEffect::Broadcast { message, fire_at } => format!(
                "Broadcast <t:{}:R>: \"{message}\"",
                fire_at.timestamp()
            ),
            PurchaseEffect::OneShotRequest { request } => format!("Request: {request}"),
        };
        let _ = write!(text, "\n• {line}");
    }
    text
}
