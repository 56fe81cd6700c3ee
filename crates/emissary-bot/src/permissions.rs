//! Permission resolution.
//!
//! Decides whether a user holds a permission for a requested target scope
//! in a given server.  Evaluation order is fixed, first match wins:
//!
//! 1. Owner exemption: the recorded guild owner passes every check.
//! 2. Global grants: rows that apply across all servers.
//! 3. Local grants: rows scoped to the current server.
//! 4. Deny.
//!
//! Absence of a grant is a normal negative result, not a storage error;
//! only a missing guild context is reported as a structural failure.

use std::sync::Arc;

use emissary_shared::{EmissaryError, Permission, PermissionTarget, Snowflake};
use emissary_store::{Database, GlobalPermissionGrant, LocalPermissionGrant, StoreError};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::store_error;
use crate::identity::{GuildProfile, IdentityService, UserProfile};

/// Evaluates and mutates permission grants.
#[derive(Clone)]
pub struct PermissionResolver {
    db: Arc<Mutex<Database>>,
    identity: IdentityService,
}

impl PermissionResolver {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        let identity = IdentityService::new(db.clone());
        Self { db, identity }
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Check a permission in a guild the invocation may or may not have.
    ///
    /// Permissions are server-scoped; outside a guild this is an
    /// `UnmetPrecondition`, distinct from an ordinary denial so callers can
    /// word the reply accordingly.
    pub async fn check_in_context(
        &self,
        user: Snowflake,
        guild: Option<&GuildProfile>,
        permission: Permission,
        target: PermissionTarget,
    ) -> Result<(), EmissaryError> {
        let guild = guild.ok_or_else(|| {
            EmissaryError::UnmetPrecondition(
                "Permissions aren't supported outside of a server.".into(),
            )
        })?;
        self.check(user, guild, permission, target).await
    }

    /// Check a permission in a known guild.
    pub async fn check(
        &self,
        user: Snowflake,
        guild: &GuildProfile,
        permission: Permission,
        target: PermissionTarget,
    ) -> Result<(), EmissaryError> {
        // 1. Owner exemption.
        if guild.owner_id == user {
            debug!(%user, server = %guild.id, %permission, "owner exemption");
            return Ok(());
        }

        let db = self.db.lock().await;

        // 2. Global grants.
        match db.get_global_grant(user, permission) {
            Ok(grant) if grant.is_granted && grant.targets.satisfies(target) => return Ok(()),
            Ok(_) | Err(StoreError::NotFound) => {}
            Err(e) => return Err(store_error(e, "a permission grant")),
        }

        // 3. Local grants.
        match db.get_local_grant(guild.id, user, permission) {
            Ok(grant) if grant.is_granted && grant.targets.satisfies(target) => return Ok(()),
            Ok(_) | Err(StoreError::NotFound) => {}
            Err(e) => return Err(store_error(e, "a permission grant")),
        }

        // 4. Deny.
        debug!(%user, server = %guild.id, %permission, %target, "permission denied");
        Err(EmissaryError::PermissionDenied)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Grant a permission in a server.  Idempotent; re-granting merges the
    /// target bits into the existing row.
    ///
    /// Grant rows reference the mirrored identity tables, so both the guild
    /// and the grantee are registered here before the upsert.
    pub async fn grant(
        &self,
        guild: &GuildProfile,
        user: Snowflake,
        permission: Permission,
        targets: PermissionTarget,
    ) -> Result<(), EmissaryError> {
        self.identity.get_or_register_server(guild).await?;
        self.identity
            .get_or_register_user(&UserProfile::member(user))
            .await?;

        let db = self.db.lock().await;
        db.upsert_local_grant(&LocalPermissionGrant {
            server_id: guild.id,
            user_id: user,
            permission,
            targets,
            is_granted: true,
        })
        .map_err(|e| store_error(e, "a permission grant"))
    }

    /// Grant a permission across all servers.  Registers the grantee first,
    /// like [`PermissionResolver::grant`].
    pub async fn grant_global(
        &self,
        user: Snowflake,
        permission: Permission,
        targets: PermissionTarget,
    ) -> Result<(), EmissaryError> {
        self.identity
            .get_or_register_user(&UserProfile::member(user))
            .await?;

        let db = self.db.lock().await;
        db.upsert_global_grant(&GlobalPermissionGrant {
            user_id: user,
            permission,
            targets,
            is_granted: true,
        })
        .map_err(|e| store_error(e, "a permission grant"))
    }

    /// Revoke a server-scoped grant entirely.
    pub async fn revoke(
        &self,
        server: Snowflake,
        user: Snowflake,
        permission: Permission,
    ) -> Result<(), EmissaryError> {
        let db = self.db.lock().await;
        db.revoke_local_grant(server, user, permission)
            .map_err(|e| match e {
                StoreError::NotFound => EmissaryError::NotFound(
                    "That permission hasn't been granted to that user here.".into(),
                ),
                other => store_error(other, "a permission grant"),
            })
    }

    /// Revoke a global grant entirely.
    pub async fn revoke_global(
        &self,
        user: Snowflake,
        permission: Permission,
    ) -> Result<(), EmissaryError> {
        let db = self.db.lock().await;
        let deleted = db
            .delete_global_grant(user, permission)
            .map_err(|e| store_error(e, "a permission grant"))?;
        if !deleted {
            return Err(EmissaryError::NotFound(
                "That permission hasn't been granted to that user globally.".into(),
            ));
        }
        Ok(())
    }

    /// Remove specific target bits from a server-scoped grant, leaving the
    /// rest in place.  A grant stripped of all its targets counts as fully
    /// revoked.
    pub async fn revoke_target(
        &self,
        server: Snowflake,
        user: Snowflake,
        permission: Permission,
        target: PermissionTarget,
    ) -> Result<(), EmissaryError> {
        let db = self.db.lock().await;
        let grant = db
            .get_local_grant(server, user, permission)
            .map_err(|e| match e {
                StoreError::NotFound => EmissaryError::NotFound(
                    "That permission hasn't been granted to that user here.".into(),
                ),
                other => store_error(other, "a permission grant"),
            })?;

        let remaining = grant.targets.without(target);
        db.update_local_targets(server, user, permission, remaining)
            .map_err(|e| store_error(e, "a permission grant"))?;
        if remaining.is_empty() {
            db.revoke_local_grant(server, user, permission)
                .map_err(|e| store_error(e, "a permission grant"))?;
        }
        Ok(())
    }

    /// List a user's grant rows: global first, then the given server's.
    pub async fn list_grants(
        &self,
        server: Snowflake,
        user: Snowflake,
    ) -> Result<(Vec<GlobalPermissionGrant>, Vec<LocalPermissionGrant>), EmissaryError> {
        let db = self.db.lock().await;
        let global = db
            .list_global_grants_for_user(user)
            .map_err(|e| store_error(e, "permission grants"))?;
        let local = db
            .list_local_grants_for_user(server, user)
            .map_err(|e| store_error(e, "permission grants"))?;
        Ok((global, local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{GuildProfile, IdentityService, UserProfile};

    const SERVER_OWNER: Snowflake = Snowflake(9);

    async fn setup() -> (PermissionResolver, GuildProfile) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let identity = IdentityService::new(db.clone());
        let guild = GuildProfile {
            id: Snowflake(100),
            owner_id: SERVER_OWNER,
        };

        identity.get_or_register_server(&guild).await.unwrap();
        for id in [1u64, 9] {
            identity
                .get_or_register_user(&UserProfile::member(Snowflake(id)))
                .await
                .unwrap();
        }

        (PermissionResolver::new(db), guild)
    }

    #[tokio::test]
    async fn ungranted_request_is_denied() {
        let (resolver, guild) = setup().await;
        let err = resolver
            .check(
                Snowflake(1),
                &guild,
                Permission::ManagePermissions,
                PermissionTarget::OTHER,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EmissaryError::PermissionDenied));
    }

    #[tokio::test]
    async fn local_grant_satisfies_matching_target_only() {
        let (resolver, guild) = setup().await;
        resolver
            .grant(
                &guild,
                Snowflake(1),
                Permission::ManagePermissions,
                PermissionTarget::SELF,
            )
            .await
            .unwrap();

        assert!(resolver
            .check(
                Snowflake(1),
                &guild,
                Permission::ManagePermissions,
                PermissionTarget::SELF
            )
            .await
            .is_ok());
        assert!(matches!(
            resolver
                .check(
                    Snowflake(1),
                    &guild,
                    Permission::ManagePermissions,
                    PermissionTarget::OTHER
                )
                .await
                .unwrap_err(),
            EmissaryError::PermissionDenied
        ));
    }

    #[tokio::test]
    async fn all_grant_satisfies_either_scope() {
        let (resolver, guild) = setup().await;
        resolver
            .grant(
                &guild,
                Snowflake(1),
                Permission::ManageRoleplays,
                PermissionTarget::ALL,
            )
            .await
            .unwrap();

        for target in [PermissionTarget::SELF, PermissionTarget::OTHER] {
            assert!(resolver
                .check(Snowflake(1), &guild, Permission::ManageRoleplays, target)
                .await
                .is_ok());
        }
    }

    #[tokio::test]
    async fn global_grant_applies_in_any_server() {
        let (resolver, guild) = setup().await;
        resolver
            .grant_global(Snowflake(1), Permission::ManageDossiers, PermissionTarget::ALL)
            .await
            .unwrap();

        assert!(resolver
            .check(
                Snowflake(1),
                &guild,
                Permission::ManageDossiers,
                PermissionTarget::OTHER
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn server_owner_is_exempt() {
        let (resolver, guild) = setup().await;
        // No grants at all for the owner.
        for permission in Permission::ALL {
            assert!(resolver
                .check(SERVER_OWNER, &guild, *permission, PermissionTarget::ALL)
                .await
                .is_ok());
        }
    }

    #[tokio::test]
    async fn missing_guild_context_is_a_precondition_failure() {
        let (resolver, _) = setup().await;
        let err = resolver
            .check_in_context(
                Snowflake(1),
                None,
                Permission::ManagePermissions,
                PermissionTarget::SELF,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EmissaryError::UnmetPrecondition(_)));
    }

    #[tokio::test]
    async fn revoke_target_strips_bits_then_revokes_when_empty() {
        let (resolver, guild) = setup().await;
        resolver
            .grant(
                &guild,
                Snowflake(1),
                Permission::EditCharacter,
                PermissionTarget::ALL,
            )
            .await
            .unwrap();

        resolver
            .revoke_target(
                guild.id,
                Snowflake(1),
                Permission::EditCharacter,
                PermissionTarget::OTHER,
            )
            .await
            .unwrap();
        assert!(resolver
            .check(
                Snowflake(1),
                &guild,
                Permission::EditCharacter,
                PermissionTarget::SELF
            )
            .await
            .is_ok());
        assert!(resolver
            .check(
                Snowflake(1),
                &guild,
                Permission::EditCharacter,
                PermissionTarget::OTHER
            )
            .await
            .is_err());

        resolver
            .revoke_target(
                guild.id,
                Snowflake(1),
                Permission::EditCharacter,
                PermissionTarget::SELF,
            )
            .await
            .unwrap();
        assert!(resolver
            .check(
                Snowflake(1),
                &guild,
                Permission::EditCharacter,
                PermissionTarget::SELF
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn granting_in_an_unseen_guild_mirrors_the_identities() {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let resolver = PermissionResolver::new(db.clone());
        let identity = IdentityService::new(db);
        let guild = GuildProfile {
            id: Snowflake(555),
            owner_id: Snowflake(9),
        };

        // Neither the guild nor the grantee has been mirrored yet; the
        // grant must register both rather than trip the foreign keys.
        resolver
            .grant(
                &guild,
                Snowflake(3),
                Permission::EditCharacter,
                PermissionTarget::OTHER,
            )
            .await
            .unwrap();

        assert!(identity.is_server_known(guild.id).await.unwrap());
        assert!(identity.is_user_known(Snowflake(3)).await.unwrap());
        assert!(resolver
            .check(
                Snowflake(3),
                &guild,
                Permission::EditCharacter,
                PermissionTarget::OTHER
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn revoking_an_absent_grant_is_not_found() {
        let (resolver, guild) = setup().await;
        assert!(matches!(
            resolver
                .revoke(guild.id, Snowflake(1), Permission::StartRoleplay)
                .await
                .unwrap_err(),
            EmissaryError::NotFound(_)
        ));
    }
}
