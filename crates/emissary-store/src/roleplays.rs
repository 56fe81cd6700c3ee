//! CRUD operations for [`Roleplay`] records, their participants, and the
//! logged message stream.

use chrono::{DateTime, Utc};
use emissary_shared::Snowflake;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ParticipantStatus, Roleplay, RoleplayMessage, RoleplayParticipant};

const ROLEPLAY_COLUMNS: &str = "id, owner_id, server_id, name, summary, is_active, \
     is_public, dedicated_channel, last_updated, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Roleplays
    // ------------------------------------------------------------------

    /// Insert a new roleplay.  Fails with [`StoreError::Duplicate`] when
    /// the owner already has a roleplay with that name (case-insensitive).
    pub fn create_roleplay(&self, roleplay: &Roleplay) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO rp_roleplays
                     (id, owner_id, server_id, name, summary, is_active,
                      is_public, dedicated_channel, last_updated, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    roleplay.id.to_string(),
                    roleplay.owner_id.as_i64(),
                    roleplay.server_id.as_i64(),
                    roleplay.name,
                    roleplay.summary,
                    roleplay.is_active,
                    roleplay.is_public,
                    roleplay.dedicated_channel.map(|c| c.as_i64()),
                    roleplay.last_updated.to_rfc3339(),
                    roleplay.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "roleplay name already in use"))?;
        Ok(())
    }

    /// Fetch a roleplay by its row id.
    pub fn get_roleplay(&self, id: Uuid) -> Result<Roleplay> {
        self.conn()
            .query_row(
                &format!("SELECT {ROLEPLAY_COLUMNS} FROM rp_roleplays WHERE id = ?1"),
                params![id.to_string()],
                row_to_roleplay,
            )
            .map_err(StoreError::from)
    }

    /// Fetch a roleplay by owner and name (case-insensitive).
    pub fn get_roleplay_by_name(&self, owner_id: Snowflake, name: &str) -> Result<Roleplay> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {ROLEPLAY_COLUMNS} FROM rp_roleplays
                     WHERE owner_id = ?1 AND name = ?2"
                ),
                params![owner_id.as_i64(), name],
                row_to_roleplay,
            )
            .map_err(StoreError::from)
    }

    /// List all roleplays on a server, ordered by name.
    pub fn list_roleplays_for_server(&self, server_id: Snowflake) -> Result<Vec<Roleplay>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ROLEPLAY_COLUMNS} FROM rp_roleplays
             WHERE server_id = ?1
             ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map(params![server_id.as_i64()], row_to_roleplay)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Persist the mutable details of a roleplay.
    pub fn update_roleplay(&self, roleplay: &Roleplay) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                "UPDATE rp_roleplays
                 SET name = ?2, summary = ?3, is_active = ?4, is_public = ?5,
                     dedicated_channel = ?6, last_updated = ?7
                 WHERE id = ?1",
                params![
                    roleplay.id.to_string(),
                    roleplay.name,
                    roleplay.summary,
                    roleplay.is_active,
                    roleplay.is_public,
                    roleplay.dedicated_channel.map(|c| c.as_i64()),
                    roleplay.last_updated.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "roleplay name already in use"))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Reassign ownership of a roleplay.
    pub fn set_roleplay_owner(&self, id: Uuid, new_owner: Snowflake) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                "UPDATE rp_roleplays SET owner_id = ?2 WHERE id = ?1",
                params![id.to_string(), new_owner.as_i64()],
            )
            .map_err(|e| StoreError::on_conflict(e, "roleplay name already in use"))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Bump a roleplay's last-updated timestamp.
    pub fn touch_roleplay(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE rp_roleplays SET last_updated = ?2 WHERE id = ?1",
            params![id.to_string(), at.to_rfc3339()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete a roleplay.  Participants and messages cascade.
    pub fn delete_roleplay(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM rp_roleplays WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Deactivate every active roleplay whose last update predates
    /// `cutoff`, returning the affected records.
    ///
    /// Runs inside a transaction so a sweep observed halfway through never
    /// reports a roleplay as stopped while its row still says active.
    pub fn stop_stale_roleplays(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<Roleplay>> {
        let tx = self.conn_mut().transaction()?;

        let stale = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {ROLEPLAY_COLUMNS} FROM rp_roleplays
                 WHERE is_active = 1 AND last_updated < ?1"
            ))?;
            let rows = stmt.query_map(params![cutoff.to_rfc3339()], row_to_roleplay)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        for roleplay in &stale {
            tx.execute(
                "UPDATE rp_roleplays SET is_active = 0, dedicated_channel = NULL
                 WHERE id = ?1",
                params![roleplay.id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(stale)
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    /// Insert or update a participant's status.
    pub fn upsert_participant(&self, participant: &RoleplayParticipant) -> Result<()> {
        self.conn().execute(
            "INSERT INTO rp_participants (roleplay_id, user_id, status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(roleplay_id, user_id) DO UPDATE SET
                 status = excluded.status",
            params![
                participant.roleplay_id.to_string(),
                participant.user_id.as_i64(),
                participant.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a participant row, if the user has any standing in the
    /// roleplay at all.
    pub fn get_participant(
        &self,
        roleplay_id: Uuid,
        user_id: Snowflake,
    ) -> Result<RoleplayParticipant> {
        self.conn()
            .query_row(
                "SELECT roleplay_id, user_id, status
                 FROM rp_participants
                 WHERE roleplay_id = ?1 AND user_id = ?2",
                params![roleplay_id.to_string(), user_id.as_i64()],
                row_to_participant,
            )
            .map_err(StoreError::from)
    }

    /// List all participant rows of a roleplay.
    pub fn list_participants(&self, roleplay_id: Uuid) -> Result<Vec<RoleplayParticipant>> {
        let mut stmt = self.conn().prepare(
            "SELECT roleplay_id, user_id, status
             FROM rp_participants
             WHERE roleplay_id = ?1",
        )?;
        let rows = stmt.query_map(params![roleplay_id.to_string()], row_to_participant)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Log a message, or update its content when the same Discord message
    /// is logged again after an edit.
    pub fn log_roleplay_message(&self, message: &RoleplayMessage) -> Result<()> {
        self.conn().execute(
            "INSERT INTO rp_messages
                 (id, roleplay_id, author_id, author_nickname, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 content = excluded.content,
                 author_nickname = excluded.author_nickname",
            params![
                message.id.as_i64(),
                message.roleplay_id.to_string(),
                message.author_id.as_i64(),
                message.author_nickname,
                message.content,
                message.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List a roleplay's messages in log order.
    pub fn list_roleplay_messages(&self, roleplay_id: Uuid) -> Result<Vec<RoleplayMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, roleplay_id, author_id, author_nickname, content, timestamp
             FROM rp_messages
             WHERE roleplay_id = ?1
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![roleplay_id.to_string()], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Map a `rusqlite::Row` to a [`Roleplay`].
fn row_to_roleplay(row: &rusqlite::Row<'_>) -> rusqlite::Result<Roleplay> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let owner_id: i64 = row.get(1)?;
    let server_id: i64 = row.get(2)?;
    let dedicated_channel: Option<i64> = row.get(7)?;
    let last_updated_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;

    Ok(Roleplay {
        id,
        owner_id: Snowflake::from_i64(owner_id),
        server_id: Snowflake::from_i64(server_id),
        name: row.get(3)?,
        summary: row.get(4)?,
        is_active: row.get(5)?,
        is_public: row.get(6)?,
        dedicated_channel: dedicated_channel.map(Snowflake::from_i64),
        last_updated: parse_timestamp(8, &last_updated_str)?,
        created_at: parse_timestamp(9, &created_str)?,
    })
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoleplayParticipant> {
    let roleplay_str: String = row.get(0)?;
    let roleplay_id = Uuid::parse_str(&roleplay_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let user_id: i64 = row.get(1)?;
    let status_str: String = row.get(2)?;
    let status = ParticipantStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown participant status: {status_str}").into(),
        )
    })?;

    Ok(RoleplayParticipant {
        roleplay_id,
        user_id: Snowflake::from_i64(user_id),
        status,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoleplayMessage> {
    let id: i64 = row.get(0)?;
    let roleplay_str: String = row.get(1)?;
    let roleplay_id = Uuid::parse_str(&roleplay_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let author_id: i64 = row.get(2)?;
    let timestamp_str: String = row.get(5)?;

    Ok(RoleplayMessage {
        id: Snowflake::from_i64(id),
        roleplay_id,
        author_id: Snowflake::from_i64(author_id),
        author_nickname: row.get(3)?,
        content: row.get(4)?,
        timestamp: parse_timestamp(5, &timestamp_str)?,
    })
}
