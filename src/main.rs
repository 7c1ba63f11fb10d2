use dotenvy::dotenv;
use perk_shop::{
    bot,
    config::{self, database, users::get_admin_ids},
    core::{
        catalog,
        store::{RetryPolicy, Store},
        user,
    },
    errors::{Error, Result},
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load shop configuration (catalog, scheduler, retry, admins)
    let shop_config = config::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    // 4. Connect and create tables
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {e}"))?;

    // 5. Seed the catalog and flag admins
    catalog::seed_catalog(&db, &shop_config.items)
        .await
        .inspect(|count| info!(count, "Catalog seeded."))?;
    user::bootstrap_admins(&db, &get_admin_ids(&shop_config.admins)).await?;

    // 6. Run the bot and the scheduler
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {e}"))
        .map_err(Error::EnvVar)?;

    let store = Store::new(db, RetryPolicy::from(&shop_config.retry));
    bot::run_bot(token, store, shop_config.scheduler).await
}
