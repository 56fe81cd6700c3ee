//! Database migration runner.
//!
//! Migrations are executed in order on every [`Database::open_at`] call.
//! Each migration is guarded by a `user_version` pragma so it runs exactly
//! once.  There is one migration per feature plugin, which keeps each
//! plugin's tables defined in one place.
//!
//! [`Database::open_at`]: crate::Database::open_at

pub mod v001_core;
pub mod v002_permissions;
pub mod v003_characters;
pub mod v004_roleplays;
pub mod v005_dossiers;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.  Bump this and add a new migration module
/// whenever the schema changes.
const CURRENT_VERSION: u32 = 5;

/// Run all pending migrations against the open connection.
///
/// The function reads `PRAGMA user_version` to determine which migrations
/// have already been applied, then executes any outstanding ones in order.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    let steps: [(u32, &str, fn(&Connection) -> std::result::Result<(), rusqlite::Error>); 5] = [
        (1, "v001_core", v001_core::up),
        (2, "v002_permissions", v002_permissions::up),
        (3, "v003_characters", v003_characters::up),
        (4, "v004_roleplays", v004_roleplays::up),
        (5, "v005_dossiers", v005_dossiers::up),
    ];

    for (version, name, up) in steps {
        if current < version {
            tracing::info!("applying migration {name}");
            up(conn).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
            conn.pragma_update(None, "user_version", version)?;
        }
    }

    Ok(())
}
