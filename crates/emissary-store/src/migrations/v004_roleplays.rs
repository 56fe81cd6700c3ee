//! v004 -- Roleplays plugin schema.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS rp_roleplays (
    id                TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    owner_id          INTEGER NOT NULL,            -- FK -> core_users(id)
    server_id         INTEGER NOT NULL,            -- FK -> core_servers(id)
    name              TEXT NOT NULL COLLATE NOCASE,
    summary           TEXT,
    is_active         INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    is_public         INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    dedicated_channel INTEGER,                     -- channel snowflake
    last_updated      TEXT NOT NULL,
    created_at        TEXT NOT NULL,

    FOREIGN KEY (owner_id)  REFERENCES core_users(id)   ON DELETE CASCADE,
    FOREIGN KEY (server_id) REFERENCES core_servers(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_rp_owner_name
    ON rp_roleplays(owner_id, name);

CREATE INDEX IF NOT EXISTS idx_rp_server ON rp_roleplays(server_id);

CREATE TABLE IF NOT EXISTS rp_participants (
    roleplay_id TEXT NOT NULL,                -- FK -> rp_roleplays(id)
    user_id     INTEGER NOT NULL,             -- FK -> core_users(id)
    status      TEXT NOT NULL,                -- invited/joined/left/kicked

    PRIMARY KEY (roleplay_id, user_id),
    FOREIGN KEY (roleplay_id) REFERENCES rp_roleplays(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)     REFERENCES core_users(id)   ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS rp_messages (
    id              INTEGER PRIMARY KEY NOT NULL,  -- Discord message snowflake
    roleplay_id     TEXT NOT NULL,                 -- FK -> rp_roleplays(id)
    author_id       INTEGER NOT NULL,
    author_nickname TEXT NOT NULL,
    content         TEXT NOT NULL,
    timestamp       TEXT NOT NULL,

    FOREIGN KEY (roleplay_id) REFERENCES rp_roleplays(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_rp_messages_roleplay_ts
    ON rp_messages(roleplay_id, timestamp ASC);
"#;

/// Apply the roleplays migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
