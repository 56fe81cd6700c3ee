//! CRUD operations for [`Character`] records.

use chrono::{DateTime, Utc};
use emissary_shared::Snowflake;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Character;

const CHARACTER_COLUMNS: &str = "id, owner_id, server_id, name, nickname, summary, \
     description, avatar_url, is_nsfw, is_default, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new character.  Fails with [`StoreError::Duplicate`] when
    /// the owner already has a character with that name (case-insensitive).
    pub fn create_character(&self, character: &Character) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO chr_characters
                     (id, owner_id, server_id, name, nickname, summary,
                      description, avatar_url, is_nsfw, is_default, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    character.id.to_string(),
                    character.owner_id.as_i64(),
                    character.server_id.as_i64(),
                    character.name,
                    character.nickname,
                    character.summary,
                    character.description,
                    character.avatar_url,
                    character.is_nsfw,
                    character.is_default,
                    character.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "character name already in use"))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a character by its row id.
    pub fn get_character(&self, id: Uuid) -> Result<Character> {
        self.conn()
            .query_row(
                &format!("SELECT {CHARACTER_COLUMNS} FROM chr_characters WHERE id = ?1"),
                params![id.to_string()],
                row_to_character,
            )
            .map_err(StoreError::from)
    }

    /// Fetch a character by owner and name (case-insensitive).
    pub fn get_character_by_name(&self, owner_id: Snowflake, name: &str) -> Result<Character> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {CHARACTER_COLUMNS} FROM chr_characters
                     WHERE owner_id = ?1 AND name = ?2"
                ),
                params![owner_id.as_i64(), name],
                row_to_character,
            )
            .map_err(StoreError::from)
    }

    /// List all characters owned by a user, ordered by name.
    pub fn list_characters_for_owner(&self, owner_id: Snowflake) -> Result<Vec<Character>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM chr_characters
             WHERE owner_id = ?1
             ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map(params![owner_id.as_i64()], row_to_character)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// List all characters created on a server, ordered by name.
    pub fn list_characters_for_server(&self, server_id: Snowflake) -> Result<Vec<Character>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM chr_characters
             WHERE server_id = ?1
             ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map(params![server_id.as_i64()], row_to_character)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Persist the mutable details of a character (everything except id,
    /// owner, server, and creation time).
    pub fn update_character(&self, character: &Character) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                "UPDATE chr_characters
                 SET name = ?2, nickname = ?3, summary = ?4, description = ?5,
                     avatar_url = ?6, is_nsfw = ?7, is_default = ?8
                 WHERE id = ?1",
                params![
                    character.id.to_string(),
                    character.name,
                    character.nickname,
                    character.summary,
                    character.description,
                    character.avatar_url,
                    character.is_nsfw,
                    character.is_default,
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "character name already in use"))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Reassign ownership of a character.
    pub fn set_character_owner(&self, id: Uuid, new_owner: Snowflake) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                "UPDATE chr_characters SET owner_id = ?2, is_default = 0 WHERE id = ?1",
                params![id.to_string(), new_owner.as_i64()],
            )
            .map_err(|e| StoreError::on_conflict(e, "character name already in use"))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Make a character the owner's default on its server, clearing the
    /// flag from any previous default.  Defaults are per server; a default
    /// on another server is left alone.
    pub fn set_default_character(&self, owner_id: Snowflake, id: Uuid) -> Result<()> {
        let tx_conn = self.conn();
        tx_conn.execute(
            "UPDATE chr_characters SET is_default = 0
             WHERE owner_id = ?1
               AND server_id = (SELECT server_id FROM chr_characters WHERE id = ?2)",
            params![owner_id.as_i64(), id.to_string()],
        )?;
        let affected = tx_conn.execute(
            "UPDATE chr_characters SET is_default = 1
             WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner_id.as_i64()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Fetch the owner's default character on a server, if set.
    pub fn get_default_character(
        &self,
        owner_id: Snowflake,
        server_id: Snowflake,
    ) -> Result<Character> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {CHARACTER_COLUMNS} FROM chr_characters
                     WHERE owner_id = ?1 AND server_id = ?2 AND is_default = 1"
                ),
                params![owner_id.as_i64(), server_id.as_i64()],
                row_to_character,
            )
            .map_err(StoreError::from)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a character.  Returns `true` if a row was deleted.
    pub fn delete_character(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM chr_characters WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Character`].
fn row_to_character(row: &rusqlite::Row<'_>) -> rusqlite::Result<Character> {
    let id_str: String = row.get(0)?;
    let owner_id: i64 = row.get(1)?;
    let server_id: i64 = row.get(2)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_str: String = row.get(10)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Character {
        id,
        owner_id: Snowflake::from_i64(owner_id),
        server_id: Snowflake::from_i64(server_id),
        name: row.get(3)?,
        nickname: row.get(4)?,
        summary: row.get(5)?,
        description: row.get(6)?,
        avatar_url: row.get(7)?,
        is_nsfw: row.get(8)?,
        is_default: row.get(9)?,
        created_at,
    })
}
