//! Identity registry.
//!
//! Guarantees a local [`User`]/[`Server`] record exists for an external
//! Discord identity before anything else references it.  Every feature
//! service calls `get_or_register_*` before attributing data to a user or
//! server.

use std::sync::Arc;

use chrono::Utc;
use emissary_shared::{EmissaryError, Snowflake};
use emissary_store::{Database, Server, StoreError, User};
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::store_error;

/// What the gateway tells us about a user at invocation time.
#[derive(Debug, Clone, Copy)]
pub struct UserProfile {
    pub id: Snowflake,
    pub is_bot: bool,
    pub is_webhook: bool,
}

impl UserProfile {
    /// A plain human account, for tests and the dev console.
    pub fn member(id: Snowflake) -> Self {
        Self {
            id,
            is_bot: false,
            is_webhook: false,
        }
    }
}

/// What the gateway tells us about a guild at invocation time.
#[derive(Debug, Clone, Copy)]
pub struct GuildProfile {
    pub id: Snowflake,
    /// Snowflake of the guild owner, straight from the gateway.  The owner
    /// is exempt from permission checks in their own guild.
    pub owner_id: Snowflake,
}

/// Mirrors external Discord identities into local storage.
#[derive(Clone)]
pub struct IdentityService {
    db: Arc<Mutex<Database>>,
}

impl IdentityService {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Existence check by snowflake; no side effects.
    pub async fn is_user_known(&self, id: Snowflake) -> Result<bool, EmissaryError> {
        let db = self.db.lock().await;
        db.user_exists(id).map_err(|e| store_error(e, "that user"))
    }

    /// Existence check by snowflake; no side effects.
    pub async fn is_server_known(&self, id: Snowflake) -> Result<bool, EmissaryError> {
        let db = self.db.lock().await;
        db.server_exists(id)
            .map_err(|e| store_error(e, "that server"))
    }

    /// Return the local record for a user, creating it on first sight.
    ///
    /// Bot and webhook accounts cannot be registered; owned data is always
    /// attributed to a human.
    pub async fn get_or_register_user(&self, profile: &UserProfile) -> Result<User, EmissaryError> {
        if profile.is_bot || profile.is_webhook {
            return Err(EmissaryError::UnmetPrecondition(
                "Bots and webhooks can't be registered as users.".into(),
            ));
        }

        let db = self.db.lock().await;
        match db.get_user(profile.id) {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => {
                let user = User {
                    id: profile.id,
                    bio: None,
                    timezone_offset: None,
                    created_at: Utc::now(),
                };
                match db.create_user(&user) {
                    Ok(()) => {
                        info!(user = %profile.id, "registered new user");
                        Ok(user)
                    }
                    // Lost a concurrent first-registration race; the row
                    // exists now, so read it back.
                    Err(StoreError::Duplicate(_)) => {
                        db.get_user(profile.id).map_err(|e| store_error(e, "that user"))
                    }
                    Err(e) => Err(store_error(e, "that user")),
                }
            }
            Err(e) => Err(store_error(e, "that user")),
        }
    }

    /// Return the local record for a server, creating it on first sight.
    pub async fn get_or_register_server(
        &self,
        profile: &GuildProfile,
    ) -> Result<Server, EmissaryError> {
        let db = self.db.lock().await;
        match db.get_server(profile.id) {
            Ok(server) => Ok(server),
            Err(StoreError::NotFound) => {
                let server = Server {
                    id: profile.id,
                    owner_id: profile.owner_id,
                    description: None,
                    join_message: None,
                    is_nsfw: false,
                    send_join_message: false,
                    created_at: Utc::now(),
                };
                match db.create_server(&server) {
                    Ok(()) => {
                        info!(server = %profile.id, "registered new server");
                        Ok(server)
                    }
                    Err(StoreError::Duplicate(_)) => db
                        .get_server(profile.id)
                        .map_err(|e| store_error(e, "that server")),
                    Err(e) => Err(store_error(e, "that server")),
                }
            }
            Err(e) => Err(store_error(e, "that server")),
        }
    }

    /// Unconditional insert.  Fails with `DuplicateEntity` when the user is
    /// already registered.
    pub async fn add_user(&self, profile: &UserProfile) -> Result<User, EmissaryError> {
        if profile.is_bot || profile.is_webhook {
            return Err(EmissaryError::UnmetPrecondition(
                "Bots and webhooks can't be registered as users.".into(),
            ));
        }

        let user = User {
            id: profile.id,
            bio: None,
            timezone_offset: None,
            created_at: Utc::now(),
        };
        let db = self.db.lock().await;
        db.create_user(&user)
            .map_err(|e| store_error(e, "a user record"))?;
        Ok(user)
    }

    /// Unconditional insert.  Fails with `DuplicateEntity` when the server
    /// is already registered.
    pub async fn add_server(&self, profile: &GuildProfile) -> Result<Server, EmissaryError> {
        let server = Server {
            id: profile.id,
            owner_id: profile.owner_id,
            description: None,
            join_message: None,
            is_nsfw: false,
            send_join_message: false,
            created_at: Utc::now(),
        };
        let db = self.db.lock().await;
        db.create_server(&server)
            .map_err(|e| store_error(e, "a server record"))?;
        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> IdentityService {
        let db = Database::open_in_memory().unwrap();
        IdentityService::new(Arc::new(Mutex::new(db)))
    }

    #[tokio::test]
    async fn get_or_register_is_idempotent() {
        let identity = service();
        let profile = UserProfile::member(Snowflake(42));

        assert!(!identity.is_user_known(profile.id).await.unwrap());
        let first = identity.get_or_register_user(&profile).await.unwrap();
        let second = identity.get_or_register_user(&profile).await.unwrap();
        assert_eq!(first, second);
        assert!(identity.is_user_known(profile.id).await.unwrap());
    }

    #[tokio::test]
    async fn second_add_is_a_duplicate() {
        let identity = service();
        let profile = UserProfile::member(Snowflake(42));

        identity.add_user(&profile).await.unwrap();
        assert!(matches!(
            identity.add_user(&profile).await.unwrap_err(),
            EmissaryError::DuplicateEntity(_)
        ));
    }

    #[tokio::test]
    async fn bots_and_webhooks_are_rejected() {
        let identity = service();
        let bot = UserProfile {
            id: Snowflake(7),
            is_bot: true,
            is_webhook: false,
        };
        let webhook = UserProfile {
            id: Snowflake(8),
            is_bot: false,
            is_webhook: true,
        };

        assert!(matches!(
            identity.get_or_register_user(&bot).await.unwrap_err(),
            EmissaryError::UnmetPrecondition(_)
        ));
        assert!(matches!(
            identity.add_user(&webhook).await.unwrap_err(),
            EmissaryError::UnmetPrecondition(_)
        ));
    }

    #[tokio::test]
    async fn server_registration_records_owner() {
        let identity = service();
        let guild = GuildProfile {
            id: Snowflake(100),
            owner_id: Snowflake(9),
        };

        let server = identity.get_or_register_server(&guild).await.unwrap();
        assert_eq!(server.owner_id, Snowflake(9));
        assert!(identity.is_server_known(guild.id).await.unwrap());
    }
}
