//! Posts scheduler activations to the Discord channel the purchase came from.

use crate::{
    core::scheduler::{EffectActivation, EffectNotifier},
    entities::TaskData,
    errors::{Error, Result},
};
use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, CreateAllowedMentions, CreateMessage, Http, UserId};
use std::sync::Arc;
use tracing::debug;

/// [`EffectNotifier`] backed by the Discord HTTP client.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    /// Wraps the client's HTTP handle.
    #[must_use]
    pub const fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// Parses a stored chat id into a channel, rejecting anything Discord could not
/// have issued.
pub fn channel_id(chat_id: &str) -> Result<ChannelId> {
    chat_id
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&id| id != 0)
        .map(ChannelId::new)
        .ok_or_else(|| Error::InvariantViolation {
            message: format!("'{chat_id}' is not a Discord channel id"),
        })
}

/// Parses an account id for a mention; `None` for anything that is not a user id.
#[must_use]
pub fn user_id(account_id: &str) -> Option<UserId> {
    account_id
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&id| id != 0)
        .map(UserId::new)
}

/// Channel text announcing a fired effect.
#[must_use]
pub fn activation_message(activation: &EffectActivation) -> String {
    let user = &activation.user_id;
    match &activation.data {
        TaskData::ExpireEffect { action, .. } => {
            format!("⌛ <@{user}>, your unlimited **{action}** privilege has ended.")
        }
        TaskData::DelayedBroadcast { message, .. } => {
            format!("📢 **Broadcast from <@{user}>:** {message}")
        }
    }
}

#[async_trait]
impl EffectNotifier for DiscordNotifier {
    async fn notify(&self, activation: &EffectActivation) -> Result<()> {
        let channel = channel_id(&activation.chat_id)?;

        // Only the buyer may be pinged; paid text never reaches @everyone or roles
        let mentions = CreateAllowedMentions::new().users(user_id(&activation.user_id));
        let message = CreateMessage::new()
            .content(activation_message(activation))
            .allowed_mentions(mentions);

        channel.send_message(self.http.as_ref(), message).await?;
        debug!(task_id = activation.task_id, channel = %channel, "Activation posted");
        Ok(())
    }
}
