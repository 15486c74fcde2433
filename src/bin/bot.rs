use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::async_trait;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;

use scrum_owl::core::Config;
use scrum_owl::features::reminders::{
    open_store, DefaultRenderer, DiscordNotifier, ReminderScheduler, SchedulerConfig,
    TriggerEngine,
};

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);

        if let Some(shard) = ready.shard {
            info!("⚡ Shard: {}/{}", shard[0] + 1, shard[1]);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Scrum Owl...");

    let token = config.require_discord_token()?.to_string();

    let store = open_store(&config)?;
    info!(
        "🗄️ Reminder store: {:?} (default timezone {})",
        config.store_backend, config.default_timezone
    );

    let intents = GatewayIntents::GUILDS;

    let mut client = Client::builder(&token, intents)
        .event_handler(Handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            error!("This could indicate:");
            error!("  - Invalid bot token format");
            error!("  - Network issues reaching Discord API");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("Bot configured successfully. Connecting to Discord gateway...");
    info!("Gateway intents: {intents:?}");

    // Start the reminder scheduler
    let http = client.cache_and_http.http.clone();
    let scheduler = Arc::new(ReminderScheduler::new(
        store,
        Arc::new(DiscordNotifier::new(http)),
        Arc::new(DefaultRenderer),
        TriggerEngine::new(config.probe_budget),
        SchedulerConfig::from(&config),
    ));
    scheduler.start();

    let shard_manager = client.shard_manager.clone();

    let result = tokio::select! {
        started = client.start() => started.map_err(|why| {
            error!("Gateway connection failed: {why:?}");
            error!("This could be due to:");
            error!("  - Invalid bot token");
            error!("  - Network connectivity issues");
            error!("  - Discord API outage");
            anyhow::anyhow!("Failed to establish gateway connection: {}", why)
        }),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl-C, shutting down"),
                Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
            }
            Ok(())
        }
    };

    // Let an in-flight reminder tick finish before disconnecting
    scheduler.shutdown().await;
    shard_manager.lock().await.shutdown_all().await;

    let status = scheduler.status();
    info!("Reminder scheduler ran {} ticks", status.ticks);

    result
}
