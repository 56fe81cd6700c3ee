//! CRUD operations for [`Server`] records.

use chrono::{DateTime, Utc};
use emissary_shared::Snowflake;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Server;

impl Database {
    /// Insert a new server.  Fails with [`StoreError::Duplicate`] if the
    /// snowflake is already registered.
    pub fn create_server(&self, server: &Server) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO core_servers
                     (id, owner_id, description, join_message, is_nsfw,
                      send_join_message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    server.id.as_i64(),
                    server.owner_id.as_i64(),
                    server.description,
                    server.join_message,
                    server.is_nsfw,
                    server.send_join_message,
                    server.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "server already registered"))?;
        Ok(())
    }

    /// Fetch a server by snowflake.
    pub fn get_server(&self, id: Snowflake) -> Result<Server> {
        self.conn()
            .query_row(
                "SELECT id, owner_id, description, join_message, is_nsfw,
                        send_join_message, created_at
                 FROM core_servers
                 WHERE id = ?1",
                params![id.as_i64()],
                row_to_server,
            )
            .map_err(StoreError::from)
    }

    /// Existence check by snowflake; no side effects.
    pub fn server_exists(&self, id: Snowflake) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM core_servers WHERE id = ?1",
            params![id.as_i64()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Update the mutable server settings (everything except identity and
    /// owner).
    pub fn update_server_settings(&self, server: &Server) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE core_servers
             SET description = ?2, join_message = ?3, is_nsfw = ?4,
                 send_join_message = ?5
             WHERE id = ?1",
            params![
                server.id.as_i64(),
                server.description,
                server.join_message,
                server.is_nsfw,
                server.send_join_message,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Record a change of guild ownership reported by the gateway.
    pub fn set_server_owner(&self, id: Snowflake, owner_id: Snowflake) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE core_servers SET owner_id = ?2 WHERE id = ?1",
            params![id.as_i64(), owner_id.as_i64()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Map a `rusqlite::Row` to a [`Server`].
fn row_to_server(row: &rusqlite::Row<'_>) -> rusqlite::Result<Server> {
    let id: i64 = row.get(0)?;
    let owner_id: i64 = row.get(1)?;
    let description: Option<String> = row.get(2)?;
    let join_message: Option<String> = row.get(3)?;
    let is_nsfw: bool = row.get(4)?;
    let send_join_message: bool = row.get(5)?;
    let created_str: String = row.get(6)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Server {
        id: Snowflake::from_i64(id),
        owner_id: Snowflake::from_i64(owner_id),
        description,
        join_message,
        is_nsfw,
        send_join_message,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_server(id: u64, owner: u64) -> Server {
        Server {
            id: Snowflake(id),
            owner_id: Snowflake(owner),
            description: None,
            join_message: None,
            is_nsfw: false,
            send_join_message: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_get_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let server = fresh_server(100, 1);

        db.create_server(&server).unwrap();
        let fetched = db.get_server(server.id).unwrap();
        assert_eq!(fetched.owner_id, Snowflake(1));
        assert!(!fetched.is_nsfw);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let server = fresh_server(100, 1);

        db.create_server(&server).unwrap();
        assert!(matches!(
            db.create_server(&server).unwrap_err(),
            StoreError::Duplicate(_)
        ));
    }

    #[test]
    fn settings_update() {
        let db = Database::open_in_memory().unwrap();
        let mut server = fresh_server(100, 1);
        db.create_server(&server).unwrap();

        server.description = Some("A cozy place.".into());
        server.send_join_message = true;
        db.update_server_settings(&server).unwrap();

        let fetched = db.get_server(server.id).unwrap();
        assert_eq!(fetched.description.as_deref(), Some("A cozy place."));
        assert!(fetched.send_join_message);
    }

    #[test]
    fn owner_handover() {
        let db = Database::open_in_memory().unwrap();
        let server = fresh_server(100, 1);
        db.create_server(&server).unwrap();

        db.set_server_owner(server.id, Snowflake(2)).unwrap();
        assert_eq!(db.get_server(server.id).unwrap().owner_id, Snowflake(2));
    }
}
