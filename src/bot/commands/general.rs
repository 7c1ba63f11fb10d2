//! General Discord commands - ping and help.
//! This module contains simple commands that don't require database operations.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{bot::Context, errors::Result};

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: Context<'_>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: Context<'_>) -> Result<()> {
        let help_text = "**Perk Shop Help**\n\
        Earn points in the community and spend them on perks.\n\n\
        **Shop Commands**\n\
        • `/shop` - Lists the items for sale with their numbers and prices.\n\
        • `/buy <item> [message]` - Buys an item by number (or `#id`). Broadcast items need a message.\n\
        • `/balance` - Shows your points.\n\
        • `/history` - Shows your recent point changes.\n\
        • `/inventory` - Shows your active perks and pending broadcasts.\n\n\
        **Admin Commands**\n\
        • `/grant <user> <amount> [reason]` - Gives points to a user.\n\
        • `/deduct <user> <amount> [reason]` - Takes points from a user.\n\n\
        **Utility Commands**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
