//! CRUD operations for permission grant rows.
//!
//! Grants come in two kinds with different revocation semantics: local
//! (server-scoped) grants are revoked by flipping `is_granted` off so the
//! row keeps its target bits for a later re-grant, while global grants are
//! revoked by deleting the row outright.

use emissary_shared::{Permission, PermissionTarget, Snowflake};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{GlobalPermissionGrant, LocalPermissionGrant};

impl Database {
    // ------------------------------------------------------------------
    // Local (server-scoped) grants
    // ------------------------------------------------------------------

    /// Insert or update a server-scoped grant.
    ///
    /// Granting is idempotent: an existing granted row has the new target
    /// bits merged in, while a previously revoked row is re-granted with
    /// exactly the new targets (stale bits from before the revocation do
    /// not resurface).
    pub fn upsert_local_grant(&self, grant: &LocalPermissionGrant) -> Result<()> {
        self.conn().execute(
            "INSERT INTO perm_local_grants
                 (server_id, user_id, permission, targets, is_granted)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(server_id, user_id, permission) DO UPDATE SET
                 targets = CASE WHEN perm_local_grants.is_granted
                                THEN perm_local_grants.targets | excluded.targets
                                ELSE excluded.targets END,
                 is_granted = excluded.is_granted",
            params![
                grant.server_id.as_i64(),
                grant.user_id.as_i64(),
                grant.permission.name(),
                grant.targets.bits(),
                grant.is_granted,
            ],
        )?;
        Ok(())
    }

    /// Fetch the server-scoped grant row for (server, user, permission).
    pub fn get_local_grant(
        &self,
        server_id: Snowflake,
        user_id: Snowflake,
        permission: Permission,
    ) -> Result<LocalPermissionGrant> {
        self.conn()
            .query_row(
                "SELECT server_id, user_id, permission, targets, is_granted
                 FROM perm_local_grants
                 WHERE server_id = ?1 AND user_id = ?2 AND permission = ?3",
                params![server_id.as_i64(), user_id.as_i64(), permission.name()],
                row_to_local_grant,
            )
            .map_err(StoreError::from)
    }

    /// Replace the target bits of an existing local grant.
    pub fn update_local_targets(
        &self,
        server_id: Snowflake,
        user_id: Snowflake,
        permission: Permission,
        targets: PermissionTarget,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE perm_local_grants SET targets = ?4
             WHERE server_id = ?1 AND user_id = ?2 AND permission = ?3",
            params![
                server_id.as_i64(),
                user_id.as_i64(),
                permission.name(),
                targets.bits()
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Revoke a local grant by flipping its boolean off.  The row is kept.
    pub fn revoke_local_grant(
        &self,
        server_id: Snowflake,
        user_id: Snowflake,
        permission: Permission,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE perm_local_grants SET is_granted = 0
             WHERE server_id = ?1 AND user_id = ?2 AND permission = ?3",
            params![server_id.as_i64(), user_id.as_i64(), permission.name()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// List all server-scoped grant rows for a user, granted or not.
    pub fn list_local_grants_for_user(
        &self,
        server_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Vec<LocalPermissionGrant>> {
        let mut stmt = self.conn().prepare(
            "SELECT server_id, user_id, permission, targets, is_granted
             FROM perm_local_grants
             WHERE server_id = ?1 AND user_id = ?2
             ORDER BY permission ASC",
        )?;
        let rows = stmt.query_map(
            params![server_id.as_i64(), user_id.as_i64()],
            row_to_local_grant,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    // ------------------------------------------------------------------
    // Global grants
    // ------------------------------------------------------------------

    /// Insert or update a global grant.  Same merge semantics as
    /// [`Database::upsert_local_grant`].
    pub fn upsert_global_grant(&self, grant: &GlobalPermissionGrant) -> Result<()> {
        self.conn().execute(
            "INSERT INTO perm_global_grants (user_id, permission, targets, is_granted)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, permission) DO UPDATE SET
                 targets = CASE WHEN perm_global_grants.is_granted
                                THEN perm_global_grants.targets | excluded.targets
                                ELSE excluded.targets END,
                 is_granted = excluded.is_granted",
            params![
                grant.user_id.as_i64(),
                grant.permission.name(),
                grant.targets.bits(),
                grant.is_granted,
            ],
        )?;
        Ok(())
    }

    /// Fetch the global grant row for (user, permission).
    pub fn get_global_grant(
        &self,
        user_id: Snowflake,
        permission: Permission,
    ) -> Result<GlobalPermissionGrant> {
        self.conn()
            .query_row(
                "SELECT user_id, permission, targets, is_granted
                 FROM perm_global_grants
                 WHERE user_id = ?1 AND permission = ?2",
                params![user_id.as_i64(), permission.name()],
                row_to_global_grant,
            )
            .map_err(StoreError::from)
    }

    /// Revoke a global grant by deleting its row.  Returns `true` if a row
    /// was deleted.
    pub fn delete_global_grant(&self, user_id: Snowflake, permission: Permission) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM perm_global_grants WHERE user_id = ?1 AND permission = ?2",
            params![user_id.as_i64(), permission.name()],
        )?;
        Ok(affected > 0)
    }

    /// List all global grant rows for a user.
    pub fn list_global_grants_for_user(
        &self,
        user_id: Snowflake,
    ) -> Result<Vec<GlobalPermissionGrant>> {
        let mut stmt = self.conn().prepare(
            "SELECT user_id, permission, targets, is_granted
             FROM perm_global_grants
             WHERE user_id = ?1
             ORDER BY permission ASC",
        )?;
        let rows = stmt.query_map(params![user_id.as_i64()], row_to_global_grant)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_permission(idx: usize, name: &str) -> rusqlite::Result<Permission> {
    Permission::from_name(name).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown permission name: {name}").into(),
        )
    })
}

fn row_to_local_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocalPermissionGrant> {
    let server_id: i64 = row.get(0)?;
    let user_id: i64 = row.get(1)?;
    let permission_name: String = row.get(2)?;
    let targets: u8 = row.get(3)?;
    let is_granted: bool = row.get(4)?;

    Ok(LocalPermissionGrant {
        server_id: Snowflake::from_i64(server_id),
        user_id: Snowflake::from_i64(user_id),
        permission: parse_permission(2, &permission_name)?,
        targets: PermissionTarget::from_bits(targets),
        is_granted,
    })
}

fn row_to_global_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<GlobalPermissionGrant> {
    let user_id: i64 = row.get(0)?;
    let permission_name: String = row.get(1)?;
    let targets: u8 = row.get(2)?;
    let is_granted: bool = row.get(3)?;

    Ok(GlobalPermissionGrant {
        user_id: Snowflake::from_i64(user_id),
        permission: parse_permission(1, &permission_name)?,
        targets: PermissionTarget::from_bits(targets),
        is_granted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Server, User};
    use chrono::Utc;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&User {
            id: Snowflake(1),
            bio: None,
            timezone_offset: None,
            created_at: Utc::now(),
        })
        .unwrap();
        db.create_server(&Server {
            id: Snowflake(100),
            owner_id: Snowflake(9),
            description: None,
            join_message: None,
            is_nsfw: false,
            send_join_message: false,
            created_at: Utc::now(),
        })
        .unwrap();
        db
    }

    fn local(targets: PermissionTarget) -> LocalPermissionGrant {
        LocalPermissionGrant {
            server_id: Snowflake(100),
            user_id: Snowflake(1),
            permission: Permission::ManagePermissions,
            targets,
            is_granted: true,
        }
    }

    #[test]
    fn grant_twice_leaves_one_row() {
        let db = seeded_db();
        db.upsert_local_grant(&local(PermissionTarget::OTHER)).unwrap();
        db.upsert_local_grant(&local(PermissionTarget::OTHER)).unwrap();

        let grants = db
            .list_local_grants_for_user(Snowflake(100), Snowflake(1))
            .unwrap();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].is_granted);
        assert_eq!(grants[0].targets, PermissionTarget::OTHER);
    }

    #[test]
    fn re_grant_merges_target_bits() {
        let db = seeded_db();
        db.upsert_local_grant(&local(PermissionTarget::SELF)).unwrap();
        db.upsert_local_grant(&local(PermissionTarget::OTHER)).unwrap();

        let grant = db
            .get_local_grant(Snowflake(100), Snowflake(1), Permission::ManagePermissions)
            .unwrap();
        assert_eq!(grant.targets, PermissionTarget::ALL);
    }

    #[test]
    fn re_grant_after_revoke_resets_targets() {
        let db = seeded_db();
        db.upsert_local_grant(&local(PermissionTarget::ALL)).unwrap();
        db.revoke_local_grant(Snowflake(100), Snowflake(1), Permission::ManagePermissions)
            .unwrap();

        // Old ALL bits must not come back.
        db.upsert_local_grant(&local(PermissionTarget::SELF)).unwrap();
        let grant = db
            .get_local_grant(Snowflake(100), Snowflake(1), Permission::ManagePermissions)
            .unwrap();
        assert!(grant.is_granted);
        assert_eq!(grant.targets, PermissionTarget::SELF);
    }

    #[test]
    fn revoke_keeps_local_row_deletes_global_row() {
        let db = seeded_db();
        db.upsert_local_grant(&local(PermissionTarget::ALL)).unwrap();
        db.revoke_local_grant(Snowflake(100), Snowflake(1), Permission::ManagePermissions)
            .unwrap();

        let grant = db
            .get_local_grant(Snowflake(100), Snowflake(1), Permission::ManagePermissions)
            .unwrap();
        assert!(!grant.is_granted);

        db.upsert_global_grant(&GlobalPermissionGrant {
            user_id: Snowflake(1),
            permission: Permission::ManageDossiers,
            targets: PermissionTarget::ALL,
            is_granted: true,
        })
        .unwrap();
        assert!(db
            .delete_global_grant(Snowflake(1), Permission::ManageDossiers)
            .unwrap());
        assert!(matches!(
            db.get_global_grant(Snowflake(1), Permission::ManageDossiers)
                .unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn revoke_without_grant_is_not_found() {
        let db = seeded_db();
        assert!(matches!(
            db.revoke_local_grant(Snowflake(100), Snowflake(1), Permission::StartRoleplay)
                .unwrap_err(),
            StoreError::NotFound
        ));
        assert!(!db
            .delete_global_grant(Snowflake(1), Permission::StartRoleplay)
            .unwrap());
    }
}
