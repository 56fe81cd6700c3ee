//! v001 -- Core identity schema.
//!
//! Creates the two tables every other plugin references: `core_users` and
//! `core_servers`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS core_users (
    id              INTEGER PRIMARY KEY NOT NULL,  -- Discord snowflake
    bio             TEXT,
    timezone_offset INTEGER,                       -- UTC offset in hours
    created_at      TEXT NOT NULL                  -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Servers (guilds)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS core_servers (
    id                INTEGER PRIMARY KEY NOT NULL,  -- Discord snowflake
    owner_id          INTEGER NOT NULL,              -- guild owner snowflake
    description       TEXT,
    join_message      TEXT,
    is_nsfw           INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    send_join_message INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at        TEXT NOT NULL
);
"#;

/// Apply the core identity migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
