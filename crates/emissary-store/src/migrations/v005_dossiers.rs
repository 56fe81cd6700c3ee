//! v005 -- Dossiers plugin schema.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dos_dossiers (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    title      TEXT NOT NULL COLLATE NOCASE,
    summary    TEXT,
    body_path  TEXT,                        -- stored document on disk
    created_at TEXT NOT NULL
);

-- Dossier titles are globally unique, case-insensitive.
CREATE UNIQUE INDEX IF NOT EXISTS idx_dos_title ON dos_dossiers(title);
"#;

/// Apply the dossiers migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
