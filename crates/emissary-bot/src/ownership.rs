//! Owned-entity authorization.
//!
//! Characters, roleplays, and similar records carry exactly one owner at a
//! time.  The owner may always act on their own entities; anyone else
//! needs a permission grant at target scope `other`.

use emissary_shared::{naming, EmissaryError, Permission, PermissionTarget, Snowflake};
use emissary_store::{Character, Roleplay};

use crate::identity::GuildProfile;
use crate::permissions::PermissionResolver;

/// Capability of a domain object that has a display name and a single
/// owning user.
pub trait OwnedEntity {
    fn entity_name(&self) -> &str;
    fn owner_id(&self) -> Snowflake;

    /// Compare the current owner's external identity to the actor's.
    fn is_owned_by(&self, actor: Snowflake) -> bool {
        self.owner_id() == actor
    }
}

impl OwnedEntity for Character {
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn owner_id(&self) -> Snowflake {
        self.owner_id
    }
}

impl OwnedEntity for Roleplay {
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn owner_id(&self) -> Snowflake {
        self.owner_id
    }
}

/// Succeed iff the actor owns the entity.
pub fn authorize<E: OwnedEntity + ?Sized>(
    entity: &E,
    actor: Snowflake,
) -> Result<(), EmissaryError> {
    if entity.is_owned_by(actor) {
        Ok(())
    } else {
        Err(EmissaryError::PermissionDenied)
    }
}

/// Succeed if the actor owns the entity, or holds `permission` at target
/// `other` in the entity's server context.
///
/// Outside a guild only the ownership path can succeed; the permission
/// fallback reports an `UnmetPrecondition` instead of a plain denial.
pub async fn authorize_owner_or_permission<E: OwnedEntity + ?Sized>(
    entity: &E,
    actor: Snowflake,
    permission: Permission,
    resolver: &PermissionResolver,
    guild: Option<&GuildProfile>,
) -> Result<(), EmissaryError> {
    if entity.is_owned_by(actor) {
        return Ok(());
    }
    resolver
        .check_in_context(actor, guild, permission, PermissionTarget::OTHER)
        .await
}

/// Validate an ownership transfer before any row is touched.
///
/// Fails when the new owner already owns the entity, or already owns an
/// entity of the same name (case-insensitive); the caller is asked to
/// rename first.  Does not perform the reassignment.
pub fn ensure_transferable<'a, E, I>(
    entity: &E,
    new_owner: Snowflake,
    new_owner_entity_names: I,
) -> Result<(), EmissaryError>
where
    E: OwnedEntity + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    if entity.is_owned_by(new_owner) {
        return Err(EmissaryError::Validation(
            "That user already owns this.".into(),
        ));
    }

    if !naming::is_name_unique(new_owner_entity_names, entity.entity_name()) {
        return Err(EmissaryError::DuplicateEntity(format!(
            "The new owner already has something named \"{}\". It has to be renamed first.",
            entity.entity_name()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityService, UserProfile};
    use emissary_store::Database;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct TestEntity {
        name: String,
        owner: Snowflake,
    }

    impl OwnedEntity for TestEntity {
        fn entity_name(&self) -> &str {
            &self.name
        }

        fn owner_id(&self) -> Snowflake {
            self.owner
        }
    }

    fn rex(owner: u64) -> TestEntity {
        TestEntity {
            name: "Rex".into(),
            owner: Snowflake(owner),
        }
    }

    #[test]
    fn owner_predicate() {
        let entity = rex(1);
        assert!(entity.is_owned_by(Snowflake(1)));
        assert!(!entity.is_owned_by(Snowflake(2)));
    }

    #[test]
    fn authorize_only_the_owner() {
        let entity = rex(1);
        assert!(authorize(&entity, Snowflake(1)).is_ok());
        assert!(matches!(
            authorize(&entity, Snowflake(2)).unwrap_err(),
            EmissaryError::PermissionDenied
        ));
    }

    #[test]
    fn transfer_to_current_owner_is_rejected() {
        let entity = rex(1);
        assert!(matches!(
            ensure_transferable(&entity, Snowflake(1), std::iter::empty()).unwrap_err(),
            EmissaryError::Validation(_)
        ));
    }

    #[test]
    fn transfer_name_collision_is_rejected_case_insensitively() {
        let entity = rex(1);
        let err = ensure_transferable(&entity, Snowflake(2), ["REX"]).unwrap_err();
        assert!(matches!(err, EmissaryError::DuplicateEntity(_)));
    }

    #[test]
    fn transfer_to_a_clean_owner_is_allowed() {
        let entity = rex(1);
        assert!(ensure_transferable(&entity, Snowflake(2), ["Fenris"]).is_ok());
    }

    #[tokio::test]
    async fn permission_fallback_works_inside_a_guild_only() {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let identity = IdentityService::new(db.clone());
        let resolver = PermissionResolver::new(db);

        let guild = GuildProfile {
            id: Snowflake(100),
            owner_id: Snowflake(9),
        };
        identity.get_or_register_server(&guild).await.unwrap();
        identity
            .get_or_register_user(&UserProfile::member(Snowflake(2)))
            .await
            .unwrap();

        let entity = rex(1);

        // No grant, inside guild: plain denial.
        assert!(matches!(
            authorize_owner_or_permission(
                &entity,
                Snowflake(2),
                Permission::EditCharacter,
                &resolver,
                Some(&guild)
            )
            .await
            .unwrap_err(),
            EmissaryError::PermissionDenied
        ));

        // Outside a guild: structural failure, not a denial.
        assert!(matches!(
            authorize_owner_or_permission(
                &entity,
                Snowflake(2),
                Permission::EditCharacter,
                &resolver,
                None
            )
            .await
            .unwrap_err(),
            EmissaryError::UnmetPrecondition(_)
        ));

        // Grant at `other` unlocks the entity.
        resolver
            .grant(
                &guild,
                Snowflake(2),
                Permission::EditCharacter,
                PermissionTarget::OTHER,
            )
            .await
            .unwrap();
        assert!(authorize_owner_or_permission(
            &entity,
            Snowflake(2),
            Permission::EditCharacter,
            &resolver,
            Some(&guild)
        )
        .await
        .is_ok());
    }
}
