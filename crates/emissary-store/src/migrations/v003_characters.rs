//! v003 -- Characters plugin schema.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chr_characters (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    owner_id    INTEGER NOT NULL,             -- FK -> core_users(id)
    server_id   INTEGER NOT NULL,             -- FK -> core_servers(id)
    name        TEXT NOT NULL COLLATE NOCASE,
    nickname    TEXT,
    summary     TEXT,
    description TEXT,
    avatar_url  TEXT,
    is_nsfw     INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    is_default  INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    created_at  TEXT NOT NULL,

    FOREIGN KEY (owner_id)  REFERENCES core_users(id)   ON DELETE CASCADE,
    FOREIGN KEY (server_id) REFERENCES core_servers(id) ON DELETE CASCADE
);

-- Name uniqueness is per owner, not global, and case-insensitive.
CREATE UNIQUE INDEX IF NOT EXISTS idx_chr_owner_name
    ON chr_characters(owner_id, name);

CREATE INDEX IF NOT EXISTS idx_chr_server ON chr_characters(server_id);
"#;

/// Apply the characters migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
