//! # emissary-bot
//!
//! Backend for a Discord community bot: character management, roleplay
//! logging, shared dossiers, and the permission system that gates them.
//!
//! The Discord gateway itself is out of scope here; invocations arrive
//! through the [`commands::Dispatcher`], fed by a gateway adapter in
//! production and by a line-oriented dev console locally.

mod commands;
mod config;
mod console;
mod errors;
mod identity;
mod ownership;
mod permissions;
mod services;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::commands::{build_command_registry, Dispatcher};
use crate::config::BotConfig;
use crate::identity::IdentityService;
use crate::permissions::PermissionResolver;
use crate::services::{CharacterService, DossierService, ProfileService, RoleplayService};
use emissary_shared::PermissionRegistry;
use emissary_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,emissary_bot=debug")),
        )
        .init();

    info!("Starting emissary v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = BotConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open storage and build services
    // -----------------------------------------------------------------------
    let db = Arc::new(Mutex::new(Database::open_at(&config.db_path)?));
    info!(path = %config.db_path.display(), "Database ready");

    let identity = IdentityService::new(db.clone());
    let resolver = PermissionResolver::new(db.clone());
    let registry = Arc::new(PermissionRegistry::builtin());
    let command_registry = Arc::new(build_command_registry());

    let characters = CharacterService::new(
        db.clone(),
        identity.clone(),
        resolver.clone(),
        command_registry.clone(),
    );
    let roleplays = RoleplayService::new(
        db.clone(),
        identity.clone(),
        resolver.clone(),
        command_registry.clone(),
    );
    let dossiers = DossierService::new(db.clone(), resolver.clone(), command_registry.clone());
    let profiles = ProfileService::new(db, identity, resolver.clone());

    let dispatcher = Dispatcher::new(
        resolver,
        registry,
        characters,
        roleplays.clone(),
        dossiers,
        profiles,
    );

    // -----------------------------------------------------------------------
    // 4. Spawn the roleplay expiry sweep
    // -----------------------------------------------------------------------
    let timeout = chrono::Duration::hours(config.roleplay_timeout_hours);
    let sweep_interval = std::time::Duration::from_secs(config.sweep_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        // The first tick fires immediately; that's fine, a fresh boot may
        // well have roleplays that went stale while the bot was down.
        loop {
            interval.tick().await;
            match roleplays.sweep_stale(timeout).await {
                Ok(0) => {}
                Ok(stopped) => info!(stopped, "expiry sweep stopped stale roleplays"),
                Err(e) => error!(%e, "expiry sweep failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Serve the dev console until EOF or Ctrl+C
    // -----------------------------------------------------------------------
    tokio::select! {
        result = console::run(dispatcher, config.console_actor, config.console_guild) => {
            result?;
            info!("Console closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
