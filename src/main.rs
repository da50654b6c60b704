//! exobump - cross-community bump broadcaster

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exobump::{
    bot::{spawn_cleanup_task, Bot},
    config::Args,
    persistence::{InMemoryStore, MongoClient, MongoStore, PersistenceSync, Store},
    platform::{DiscordPlatform, InMemoryPlatform, Platform},
    resets::{self, ResetPeriod},
    server,
    state::BotState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("exobump={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = args.bot_config();

    info!("======================================");
    info!("  exobump - cross-community bumps");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Concurrent bumps: {}", config.max_concurrent_bumps);
    info!("Autosave every {:?}", config.autosave_interval);
    info!("======================================");

    // MongoDB is optional in dev mode
    let store: Arc<dyn Store> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Arc::new(MongoStore::new(client).await?)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(InMemoryStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let platform: Arc<dyn Platform> = match args.discord_token.as_deref() {
        Some(token) => Arc::new(DiscordPlatform::new(
            args.discord_api_url.clone(),
            token,
            args.request_timeout(),
        )?),
        None => {
            warn!("No platform token (dev mode), messages are only logged");
            Arc::new(InMemoryPlatform::new())
        }
    };

    let state = Arc::new(BotState::new());
    let sync = Arc::new(PersistenceSync::new(
        Arc::clone(&state),
        store,
        config.autosave_interval,
    ));
    let hydrated = sync.hydrate().await;
    info!("Loaded {} communities", hydrated);

    let cleanup_interval = config.rate_limit_window;
    let bot = Arc::new(Bot::new(config, Arc::clone(&state), platform)?);
    match bot.ensure_invites().await {
        Ok(created) => info!("Created {} missing invites", created),
        Err(e) => warn!("Could not list communities for invites: {}", e),
    }

    Arc::clone(&sync).start().await;
    let cleanup = spawn_cleanup_task(Arc::clone(&bot), cleanup_interval);
    let reset_tasks: Vec<_> = [ResetPeriod::Daily, ResetPeriod::Weekly, ResetPeriod::Monthly]
        .into_iter()
        .map(|period| resets::spawn_reset_task(period, Arc::clone(&state), Arc::clone(&sync)))
        .collect();

    let app = Arc::new(server::AppState::new(args, Arc::clone(&bot), Arc::clone(&sync)));

    tokio::select! {
        result = server::run(app) => {
            if let Err(e) = result {
                error!("Server error: {:?}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    sync.stop().await;
    if !bot.shutdown().await {
        warn!("Flushing with bumps still pending");
    }
    cleanup.abort();
    for task in reset_tasks {
        task.abort();
    }

    // Final flush
    match sync.flush_now().await {
        Ok(outcome) => info!("Final flush: {:?}", outcome),
        Err(e) => {
            error!("Final flush failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
