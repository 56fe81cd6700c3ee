//! Bot configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the bot can start with zero
//! configuration for local development.

use std::path::PathBuf;

use emissary_shared::Snowflake;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Filesystem path of the SQLite database.
    /// Env: `EMISSARY_DB_PATH`
    /// Default: `./emissary.db`
    pub db_path: PathBuf,

    /// Hours of inactivity after which an active roleplay is stopped by the
    /// expiry sweep.
    /// Env: `EMISSARY_RP_TIMEOUT_HOURS`
    /// Default: `72`
    pub roleplay_timeout_hours: i64,

    /// Seconds between expiry sweep runs.
    /// Env: `EMISSARY_SWEEP_INTERVAL_SECS`
    /// Default: `3600`
    pub sweep_interval_secs: u64,

    /// Snowflake the dev console acts as.
    /// Env: `EMISSARY_CONSOLE_ACTOR`
    /// Default: `1`
    pub console_actor: Snowflake,

    /// Guild snowflake the dev console acts in.
    /// Env: `EMISSARY_CONSOLE_GUILD`
    /// Default: `1`
    pub console_guild: Snowflake,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./emissary.db"),
            roleplay_timeout_hours: 72,
            sweep_interval_secs: 3600,
            console_actor: Snowflake(1),
            console_guild: Snowflake(1),
        }
    }
}

impl BotConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("EMISSARY_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("EMISSARY_RP_TIMEOUT_HOURS") {
            match val.parse::<i64>() {
                Ok(hours) if hours > 0 => config.roleplay_timeout_hours = hours,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid EMISSARY_RP_TIMEOUT_HOURS, using default"
                ),
            }
        }

        if let Ok(val) = std::env::var("EMISSARY_SWEEP_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.sweep_interval_secs = secs,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid EMISSARY_SWEEP_INTERVAL_SECS, using default"
                ),
            }
        }

        if let Ok(val) = std::env::var("EMISSARY_CONSOLE_ACTOR") {
            match Snowflake::parse(&val) {
                Some(id) => config.console_actor = id,
                None => tracing::warn!(
                    value = %val,
                    "Invalid EMISSARY_CONSOLE_ACTOR, using default"
                ),
            }
        }

        if let Ok(val) = std::env::var("EMISSARY_CONSOLE_GUILD") {
            match Snowflake::parse(&val) {
                Some(id) => config.console_guild = id,
                None => tracing::warn!(
                    value = %val,
                    "Invalid EMISSARY_CONSOLE_GUILD, using default"
                ),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
