//! User profiles and server settings.
//!
//! Users edit their own bio and timezone freely.  Server settings are
//! gated on `edit-server-info`; the server owner changing hands is a
//! gateway event, recorded without a permission check.

use std::sync::Arc;

use emissary_shared::{EmissaryError, Permission, PermissionTarget, Snowflake};
use emissary_store::{Database, Server, User};
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::store_error;
use crate::identity::{GuildProfile, IdentityService, UserProfile};
use crate::permissions::PermissionResolver;

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<Mutex<Database>>,
    identity: IdentityService,
    resolver: PermissionResolver,
}

impl ProfileService {
    pub fn new(
        db: Arc<Mutex<Database>>,
        identity: IdentityService,
        resolver: PermissionResolver,
    ) -> Self {
        Self {
            db,
            identity,
            resolver,
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn get_user(&self, id: Snowflake) -> Result<User, EmissaryError> {
        let db = self.db.lock().await;
        db.get_user(id).map_err(|e| store_error(e, "that user"))
    }

    pub async fn set_bio(
        &self,
        actor: &UserProfile,
        bio: Option<&str>,
    ) -> Result<(), EmissaryError> {
        self.identity.get_or_register_user(actor).await?;
        let db = self.db.lock().await;
        db.set_user_bio(actor.id, bio)
            .map_err(|e| store_error(e, "your profile"))
    }

    /// Set the user's timezone as a UTC offset in hours.
    pub async fn set_timezone(
        &self,
        actor: &UserProfile,
        offset: Option<i32>,
    ) -> Result<(), EmissaryError> {
        if let Some(offset) = offset {
            if !(-12..=14).contains(&offset) {
                return Err(EmissaryError::Validation(
                    "Timezone offsets run from -12 to +14.".into(),
                ));
            }
        }
        self.identity.get_or_register_user(actor).await?;
        let db = self.db.lock().await;
        db.set_user_timezone(actor.id, offset)
            .map_err(|e| store_error(e, "your profile"))
    }

    // ------------------------------------------------------------------
    // Servers
    // ------------------------------------------------------------------

    pub async fn get_server(&self, guild: &GuildProfile) -> Result<Server, EmissaryError> {
        self.identity.get_or_register_server(guild).await
    }

    /// Edit server settings.  Requires `edit-server-info`.
    pub async fn update_server<F>(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        mutate: F,
    ) -> Result<Server, EmissaryError>
    where
        F: FnOnce(&mut Server),
    {
        self.resolver
            .check_in_context(
                actor.id,
                Some(guild),
                Permission::EditServerInfo,
                PermissionTarget::ALL,
            )
            .await?;

        let mut server = self.identity.get_or_register_server(guild).await?;
        mutate(&mut server);

        let db = self.db.lock().await;
        db.update_server_settings(&server)
            .map_err(|e| store_error(e, "the server settings"))?;
        Ok(server)
    }

    /// Record a guild ownership change reported by the gateway.  Not a
    /// user command, so no permission gate.
    pub async fn record_owner_change(&self, guild: &GuildProfile) -> Result<(), EmissaryError> {
        self.identity.get_or_register_server(guild).await?;
        let db = self.db.lock().await;
        db.set_server_owner(guild.id, guild.owner_id)
            .map_err(|e| store_error(e, "the server"))?;
        info!(server = %guild.id, owner = %guild.owner_id, "server ownership updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER: Snowflake = Snowflake(1);
    const SERVER_OWNER: Snowflake = Snowflake(9);
    const GUILD: GuildProfile = GuildProfile {
        id: Snowflake(100),
        owner_id: SERVER_OWNER,
    };

    fn build() -> (ProfileService, PermissionResolver) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let identity = IdentityService::new(db.clone());
        let resolver = PermissionResolver::new(db.clone());
        (
            ProfileService::new(db, identity, resolver.clone()),
            resolver,
        )
    }

    #[tokio::test]
    async fn bio_and_timezone_round_trip() {
        let (service, _) = build();
        let actor = UserProfile::member(MEMBER);

        service.set_bio(&actor, Some("Hello.")).await.unwrap();
        service.set_timezone(&actor, Some(-5)).await.unwrap();

        let user = service.get_user(MEMBER).await.unwrap();
        assert_eq!(user.bio.as_deref(), Some("Hello."));
        assert_eq!(user.timezone_offset, Some(-5));
    }

    #[tokio::test]
    async fn out_of_range_timezone_is_rejected() {
        let (service, _) = build();
        let actor = UserProfile::member(MEMBER);
        assert!(matches!(
            service.set_timezone(&actor, Some(20)).await.unwrap_err(),
            EmissaryError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn server_edits_require_the_permission() {
        let (service, resolver) = build();
        let member = UserProfile::member(MEMBER);

        assert!(matches!(
            service
                .update_server(&member, &GUILD, |s| s.is_nsfw = true)
                .await
                .unwrap_err(),
            EmissaryError::PermissionDenied
        ));

        // The server owner needs no grant.
        let server = service
            .update_server(&UserProfile::member(SERVER_OWNER), &GUILD, |s| {
                s.description = Some("A quiet place.".into());
            })
            .await
            .unwrap();
        assert_eq!(server.description.as_deref(), Some("A quiet place."));

        // A grant opens it to the member too.
        resolver
            .grant(
                &GUILD,
                MEMBER,
                Permission::EditServerInfo,
                PermissionTarget::ALL,
            )
            .await
            .unwrap();
        service
            .update_server(&member, &GUILD, |s| s.send_join_message = true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn owner_change_is_recorded() {
        let (service, _) = build();
        service.get_server(&GUILD).await.unwrap();

        let handed_over = GuildProfile {
            id: GUILD.id,
            owner_id: Snowflake(42),
        };
        service.record_owner_change(&handed_over).await.unwrap();
        let server = service.get_server(&handed_over).await.unwrap();
        assert_eq!(server.owner_id, Snowflake(42));
    }
}
