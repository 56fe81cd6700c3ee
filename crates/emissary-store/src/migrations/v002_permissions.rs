//! v002 -- Permissions plugin schema.
//!
//! Grant rows are unique per (server, user, permission) locally and per
//! (user, permission) globally; re-grants update in place.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Server-scoped grants
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS perm_local_grants (
    server_id  INTEGER NOT NULL,              -- FK -> core_servers(id)
    user_id    INTEGER NOT NULL,              -- FK -> core_users(id)
    permission TEXT NOT NULL,                 -- stable kebab-case name
    targets    INTEGER NOT NULL,              -- target-scope flag bits
    is_granted INTEGER NOT NULL DEFAULT 1,    -- boolean 0/1

    PRIMARY KEY (server_id, user_id, permission),
    FOREIGN KEY (server_id) REFERENCES core_servers(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)   REFERENCES core_users(id)   ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_perm_local_user
    ON perm_local_grants(server_id, user_id);

-- ----------------------------------------------------------------
-- Global grants (no server association)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS perm_global_grants (
    user_id    INTEGER NOT NULL,
    permission TEXT NOT NULL,
    targets    INTEGER NOT NULL,
    is_granted INTEGER NOT NULL DEFAULT 1,

    PRIMARY KEY (user_id, permission),
    FOREIGN KEY (user_id) REFERENCES core_users(id) ON DELETE CASCADE
);
"#;

/// Apply the permissions migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
