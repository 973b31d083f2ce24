mod access;
mod bot;
mod commands;
mod config;
mod coordinator;
mod event;
mod liveness;
mod platform;
mod reply;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::access::AccessFilter;
use crate::bot::Bot;
use crate::commands::{CommandRegistry, HelpCommand};
use crate::config::Config;
use crate::liveness::{HttpProbe, Liveness};
use crate::platform::WebSocketConnector;
use crate::scheduler::sweep::TempDirSweep;
use crate::scheduler::tasks::register_builtin_tasks;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,napbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  URI: {}", config.connection.uri);
    info!("  Private whitelist: {:?}", config.access.private_ids);
    info!("  Group whitelist: {:?}", config.access.group_ids);

    // Registration order decides prefix matches
    let mut commands = CommandRegistry::new();
    commands.register("help", HelpCommand::default());
    info!(
        "  Commands: {}",
        commands.names().collect::<Vec<_>>().join(", ")
    );

    let probe = HttpProbe::new(&config.liveness)?;
    let bot = Arc::new(Bot::new(
        AccessFilter::new(&config.access),
        commands,
        Liveness::new(Box::new(probe), config.liveness.online_status),
        config.connection.reconnect_delay(),
    ));

    // Background jobs
    let mut scheduler = Scheduler::new().await?;
    let sweep = Arc::new(TempDirSweep::new(config.maintenance.temp_dir.clone()));
    info!("  Temp directory: {}", sweep.dir().display());
    register_builtin_tasks(&scheduler, &config, bot.clone(), sweep).await?;
    scheduler.start().await?;

    let connector = WebSocketConnector::new(&config.connection)?;

    info!("Bot is starting...");
    tokio::select! {
        _ = bot::run(&bot, &connector) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutting down...");
        }
    }

    scheduler.shutdown().await?;
    Ok(())
}
