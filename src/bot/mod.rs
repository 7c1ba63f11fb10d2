//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the perk shop, including all
//! slash commands, the scheduler notifier and bot context management.

/// Discord command implementations (shop, admin, general)
pub mod commands;
/// Discord handlers (effect notifications, error replies)
pub mod handlers;

use crate::{
    config::SchedulerConfig,
    core::{
        scheduler::Scheduler,
        store::Store,
        user::{self, register_user},
    },
    entities::UserModel,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Poise context used by every command.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Shared data available to all bot commands.
/// This structure holds the store handle and any other global state
/// that commands need to access.
pub struct BotData {
    /// Store handle for all database operations
    pub store: Store,
}

impl BotData {
    /// Creates a new `BotData` instance with the given store.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

/// Registers (or refreshes) the invoking user so shop operations can find them.
pub async fn register_author(ctx: Context<'_>) -> Result<UserModel> {
    let author = ctx.author();
    let display_name = author.global_name.as_deref().unwrap_or(&author.name);
    let registered = register_user(
        ctx.data().store.connection(),
        &author.id.to_string(),
        display_name,
    )
    .await?;
    Ok(registered)
}

/// Checks that the invoking user is a configured admin.
///
/// Used as a poise `check`; non-admins get a refusal instead of the command.
pub async fn require_admin(ctx: Context<'_>) -> Result<bool> {
    let author_id = ctx.author().id.to_string();
    if user::is_admin(ctx.data().store.connection(), &author_id).await? {
        return Ok(true);
    }
    warn!(user_id = %author_id, command = %ctx.command().name, "Admin command refused");
    ctx.say("❌ This command is for shop admins only.").await?;
    Ok(false)
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {error}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            if !error.is_user_facing() {
                error!(command = %ctx.command().name, error = %error, "Command failed");
            }
            if let Err(e) = ctx.say(handlers::error_reply(&error)).await {
                error!("Failed to send error message: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Runs the Discord client and the scheduler until the client stops.
#[instrument(skip(token, store, scheduler_config))]
pub async fn run_bot(token: String, store: Store, scheduler_config: SchedulerConfig) -> Result<()> {
    let framework_store = store.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::shop(),
                commands::buy(),
                commands::balance(),
                commands::history(),
                commands::inventory(),
                commands::grant(),
                commands::deduct(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(BotData::new(framework_store))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await?;

    let notifier = Arc::new(handlers::DiscordNotifier::new(Arc::clone(&client.http)));
    let shutdown = CancellationToken::new();
    let scheduler = tokio::spawn(
        Scheduler::new(store, notifier, scheduler_config).run(shutdown.clone()),
    );

    info!("Starting bot client...");
    let result = client.start().await;

    shutdown.cancel();
    if let Err(e) = scheduler.await {
        error!("Scheduler task ended abnormally: {e}");
    }

    result.map_err(Error::from)
}
