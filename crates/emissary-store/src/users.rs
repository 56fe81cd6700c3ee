//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use emissary_shared::Snowflake;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  Fails with [`StoreError::Duplicate`] if the
    /// snowflake is already registered.
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO core_users (id, bio, timezone_offset, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id.as_i64(),
                    user.bio,
                    user.timezone_offset,
                    user.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "user already registered"))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a user by snowflake.
    pub fn get_user(&self, id: Snowflake) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, bio, timezone_offset, created_at
                 FROM core_users
                 WHERE id = ?1",
                params![id.as_i64()],
                row_to_user,
            )
            .map_err(StoreError::from)
    }

    /// Existence check by snowflake; no side effects.
    pub fn user_exists(&self, id: Snowflake) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM core_users WHERE id = ?1",
            params![id.as_i64()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set or clear the user's biography.
    pub fn set_user_bio(&self, id: Snowflake, bio: Option<&str>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE core_users SET bio = ?2 WHERE id = ?1",
            params![id.as_i64(), bio],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Set or clear the user's timezone offset (hours from UTC).
    pub fn set_user_timezone(&self, id: Snowflake, offset: Option<i32>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE core_users SET timezone_offset = ?2 WHERE id = ?1",
            params![id.as_i64(), offset],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: i64 = row.get(0)?;
    let bio: Option<String> = row.get(1)?;
    let timezone_offset: Option<i32> = row.get(2)?;
    let created_str: String = row.get(3)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: Snowflake::from_i64(id),
        bio,
        timezone_offset,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_user(id: u64) -> User {
        User {
            id: Snowflake(id),
            bio: None,
            timezone_offset: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_get_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let user = fresh_user(42);

        db.create_user(&user).unwrap();
        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched.id, user.id);
        assert!(fetched.bio.is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let user = fresh_user(42);

        db.create_user(&user).unwrap();
        let err = db.create_user(&user).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn exists_reflects_registration() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.user_exists(Snowflake(7)).unwrap());

        db.create_user(&fresh_user(7)).unwrap();
        assert!(db.user_exists(Snowflake(7)).unwrap());
    }

    #[test]
    fn profile_updates() {
        let db = Database::open_in_memory().unwrap();
        let user = fresh_user(9);
        db.create_user(&user).unwrap();

        db.set_user_bio(user.id, Some("A wandering bard.")).unwrap();
        db.set_user_timezone(user.id, Some(-5)).unwrap();

        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched.bio.as_deref(), Some("A wandering bard."));
        assert_eq!(fetched.timezone_offset, Some(-5));
    }

    #[test]
    fn update_of_unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.set_user_bio(Snowflake(404), Some("x")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
