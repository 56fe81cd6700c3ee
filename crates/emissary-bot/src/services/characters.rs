//! Character management.

use std::sync::Arc;

use chrono::Utc;
use emissary_shared::{naming, CommandRegistry, EmissaryError, Permission, Snowflake};
use emissary_store::{Character, Database, StoreError};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::errors::store_error;
use crate::identity::{GuildProfile, IdentityService, UserProfile};
use crate::ownership;
use crate::permissions::PermissionResolver;

/// Command group consulted for reserved names.
const NAME_GROUP: &str = "character";

#[derive(Clone)]
pub struct CharacterService {
    db: Arc<Mutex<Database>>,
    identity: IdentityService,
    resolver: PermissionResolver,
    commands: Arc<CommandRegistry>,
}

impl CharacterService {
    pub fn new(
        db: Arc<Mutex<Database>>,
        identity: IdentityService,
        resolver: PermissionResolver,
        commands: Arc<CommandRegistry>,
    ) -> Self {
        Self {
            db,
            identity,
            resolver,
            commands,
        }
    }

    /// Create a character owned by the actor.
    pub async fn create(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        name: &str,
        summary: Option<&str>,
    ) -> Result<Character, EmissaryError> {
        let owner = self.identity.get_or_register_user(actor).await?;
        self.identity.get_or_register_server(guild).await?;

        let name = name.trim();
        naming::validate_entity_name(name, &self.commands, NAME_GROUP)?;

        let character = Character {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            server_id: guild.id,
            name: name.to_string(),
            nickname: None,
            summary: summary.map(str::to_string),
            description: None,
            avatar_url: None,
            is_nsfw: false,
            is_default: false,
            created_at: Utc::now(),
        };

        let db = self.db.lock().await;
        match db.create_character(&character) {
            Ok(()) => {
                info!(owner = %owner.id, name = %character.name, "character created");
                Ok(character)
            }
            Err(StoreError::Duplicate(_)) => Err(EmissaryError::DuplicateEntity(format!(
                "You already have a character named \"{name}\"."
            ))),
            Err(e) => Err(store_error(e, "the character")),
        }
    }

    /// Resolve a character from a command argument.
    ///
    /// `owner:name` addresses a specific user's character; a bare name is
    /// looked up among the actor's own characters first and then across
    /// the server, where it must be unambiguous.
    pub async fn find(
        &self,
        actor: Snowflake,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<Character, EmissaryError> {
        let db = self.db.lock().await;

        if let Some((owner_part, name_part)) = query.split_once(':') {
            let owner = Snowflake::parse(owner_part).ok_or_else(|| {
                EmissaryError::Validation(format!("\"{owner_part}\" isn't a user."))
            })?;
            return db
                .get_character_by_name(owner, name_part.trim())
                .map_err(|e| match e {
                    StoreError::NotFound => EmissaryError::NotFound(format!(
                        "That user doesn't have a character named \"{}\".",
                        name_part.trim()
                    )),
                    other => store_error(other, "the character"),
                });
        }

        match db.get_character_by_name(actor, query) {
            Ok(character) => return Ok(character),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(store_error(e, "the character")),
        }

        let on_server = db
            .list_characters_for_server(guild.id)
            .map_err(|e| store_error(e, "characters"))?;
        let mut matches = on_server
            .iter()
            .filter(|c| c.name.eq_ignore_ascii_case(query));

        match (matches.next(), matches.next()) {
            (Some(character), None) => Ok(character.clone()),
            (Some(_), Some(_)) => Err(EmissaryError::Validation(format!(
                "More than one character here is named \"{query}\". Use owner:name to pick one."
            ))),
            _ => {
                let message = match naming::closest_match(
                    query,
                    on_server.iter().map(|c| c.name.as_str()),
                ) {
                    Some(suggestion) => format!(
                        "There's no character named \"{query}\". Did you mean \"{suggestion}\"?"
                    ),
                    None => format!("There's no character named \"{query}\"."),
                };
                Err(EmissaryError::NotFound(message))
            }
        }
    }

    async fn edit<F>(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        mutate: F,
    ) -> Result<Character, EmissaryError>
    where
        F: FnOnce(&mut Character),
    {
        let mut character = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &character,
            actor.id,
            Permission::EditCharacter,
            &self.resolver,
            Some(guild),
        )
        .await?;

        mutate(&mut character);

        let db = self.db.lock().await;
        db.update_character(&character)
            .map_err(|e| store_error(e, "the character"))?;
        Ok(character)
    }

    pub async fn set_nickname(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        nickname: Option<&str>,
    ) -> Result<Character, EmissaryError> {
        self.edit(actor, guild, query, |c| {
            c.nickname = nickname.map(str::to_string);
        })
        .await
    }

    pub async fn set_summary(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        summary: Option<&str>,
    ) -> Result<Character, EmissaryError> {
        self.edit(actor, guild, query, |c| {
            c.summary = summary.map(str::to_string);
        })
        .await
    }

    pub async fn set_description(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        description: Option<&str>,
    ) -> Result<Character, EmissaryError> {
        self.edit(actor, guild, query, |c| {
            c.description = description.map(str::to_string);
        })
        .await
    }

    pub async fn set_avatar(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        avatar_url: Option<&str>,
    ) -> Result<Character, EmissaryError> {
        self.edit(actor, guild, query, |c| {
            c.avatar_url = avatar_url.map(str::to_string);
        })
        .await
    }

    pub async fn set_nsfw(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        is_nsfw: bool,
    ) -> Result<Character, EmissaryError> {
        self.edit(actor, guild, query, |c| c.is_nsfw = is_nsfw).await
    }

    /// Rename a character, keeping the per-owner uniqueness rule intact.
    pub async fn rename(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        new_name: &str,
    ) -> Result<Character, EmissaryError> {
        let new_name = new_name.trim();
        naming::validate_entity_name(new_name, &self.commands, NAME_GROUP)?;

        let character = self.find(actor.id, guild, query).await?;
        {
            let db = self.db.lock().await;
            let siblings = db
                .list_characters_for_owner(character.owner_id)
                .map_err(|e| store_error(e, "characters"))?;
            let other_names = siblings
                .iter()
                .filter(|c| c.id != character.id)
                .map(|c| c.name.as_str());
            if !naming::is_name_unique(other_names, new_name) {
                return Err(EmissaryError::DuplicateEntity(format!(
                    "There's already a character named \"{new_name}\"."
                )));
            }
        }

        self.edit(actor, guild, query, |c| c.name = new_name.to_string())
            .await
    }

    /// Delete a character.
    pub async fn delete(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<(), EmissaryError> {
        let character = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &character,
            actor.id,
            Permission::DeleteCharacter,
            &self.resolver,
            Some(guild),
        )
        .await?;

        let db = self.db.lock().await;
        db.delete_character(character.id)
            .map_err(|e| store_error(e, "the character"))?;
        info!(name = %character.name, "character deleted");
        Ok(())
    }

    /// Transfer a character to a new owner.
    pub async fn transfer(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        new_owner: &UserProfile,
    ) -> Result<(), EmissaryError> {
        let character = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &character,
            actor.id,
            Permission::TransferCharacter,
            &self.resolver,
            Some(guild),
        )
        .await?;

        let recipient = self.identity.get_or_register_user(new_owner).await?;

        let db = self.db.lock().await;
        let existing = db
            .list_characters_for_owner(recipient.id)
            .map_err(|e| store_error(e, "characters"))?;
        ownership::ensure_transferable(
            &character,
            recipient.id,
            existing.iter().map(|c| c.name.as_str()),
        )?;

        db.set_character_owner(character.id, recipient.id)
            .map_err(|e| store_error(e, "the character"))?;
        info!(
            name = %character.name,
            from = %character.owner_id,
            to = %recipient.id,
            "character transferred"
        );
        Ok(())
    }

    /// Make a character the actor's default.  Owner-only; no permission
    /// fallback, since a default is personal.
    pub async fn set_default(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<(), EmissaryError> {
        let character = self.find(actor.id, guild, query).await?;
        ownership::authorize(&character, actor.id)?;

        let db = self.db.lock().await;
        db.set_default_character(actor.id, character.id)
            .map_err(|e| store_error(e, "the character"))
    }

    /// List the actor's characters.
    pub async fn list_for_owner(&self, owner: Snowflake) -> Result<Vec<Character>, EmissaryError> {
        let db = self.db.lock().await;
        db.list_characters_for_owner(owner)
            .map_err(|e| store_error(e, "characters"))
    }

    /// List every character created on the server.
    pub async fn list_for_server(
        &self,
        guild: &GuildProfile,
    ) -> Result<Vec<Character>, EmissaryError> {
        let db = self.db.lock().await;
        db.list_characters_for_server(guild.id)
            .map_err(|e| store_error(e, "characters"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::OwnedEntity;
    use emissary_shared::PermissionTarget;

    const OWNER: Snowflake = Snowflake(1);
    const OTHER_USER: Snowflake = Snowflake(2);
    const GUILD: GuildProfile = GuildProfile {
        id: Snowflake(100),
        owner_id: Snowflake(9),
    };

    fn build() -> (CharacterService, PermissionResolver) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let identity = IdentityService::new(db.clone());
        let resolver = PermissionResolver::new(db.clone());
        let mut commands = CommandRegistry::new();
        commands.register(NAME_GROUP, ["create", "show", "delete"]);
        let service = CharacterService::new(db, identity, resolver.clone(), Arc::new(commands));
        (service, resolver)
    }

    #[tokio::test]
    async fn create_and_find() {
        let (service, _) = build();
        let actor = UserProfile::member(OWNER);

        service.create(&actor, &GUILD, "Rex", None).await.unwrap();
        let found = service.find(OWNER, &GUILD, "rex").await.unwrap();
        assert_eq!(found.name, "Rex");
        assert!(found.is_owned_by(OWNER));
    }

    #[tokio::test]
    async fn create_rejects_command_names_and_duplicates() {
        let (service, _) = build();
        let actor = UserProfile::member(OWNER);

        assert!(matches!(
            service.create(&actor, &GUILD, "delete", None).await.unwrap_err(),
            EmissaryError::Validation(_)
        ));

        service.create(&actor, &GUILD, "Rex", None).await.unwrap();
        assert!(matches!(
            service.create(&actor, &GUILD, "REX", None).await.unwrap_err(),
            EmissaryError::DuplicateEntity(_)
        ));
    }

    #[tokio::test]
    async fn owner_colon_name_lookup() {
        let (service, _) = build();
        service
            .create(&UserProfile::member(OWNER), &GUILD, "Rex", None)
            .await
            .unwrap();

        let found = service
            .find(OTHER_USER, &GUILD, "<@1>:Rex")
            .await
            .unwrap();
        assert_eq!(found.owner_id, OWNER);
    }

    #[tokio::test]
    async fn non_owner_edit_requires_grant() {
        let (service, resolver) = build();
        service
            .create(&UserProfile::member(OWNER), &GUILD, "Rex", None)
            .await
            .unwrap();

        let intruder = UserProfile::member(OTHER_USER);
        assert!(matches!(
            service
                .set_summary(&intruder, &GUILD, "1:Rex", Some("mine now"))
                .await
                .unwrap_err(),
            EmissaryError::PermissionDenied
        ));

        resolver
            .grant(
                &GUILD,
                OTHER_USER,
                Permission::EditCharacter,
                PermissionTarget::OTHER,
            )
            .await
            .unwrap();
        let edited = service
            .set_summary(&intruder, &GUILD, "1:Rex", Some("updated"))
            .await
            .unwrap();
        assert_eq!(edited.summary.as_deref(), Some("updated"));
    }

    #[tokio::test]
    async fn transfer_blocked_by_name_collision() {
        let (service, _) = build();
        let owner = UserProfile::member(OWNER);
        let recipient = UserProfile::member(OTHER_USER);

        service.create(&owner, &GUILD, "Rex", None).await.unwrap();
        service.create(&recipient, &GUILD, "rex", None).await.unwrap();

        assert!(matches!(
            service
                .transfer(&owner, &GUILD, "Rex", &recipient)
                .await
                .unwrap_err(),
            EmissaryError::DuplicateEntity(_)
        ));
        // Still owned by the original owner.
        let character = service.find(OWNER, &GUILD, "Rex").await.unwrap();
        assert_eq!(character.owner_id, OWNER);
    }

    #[tokio::test]
    async fn transfer_succeeds_without_collision() {
        let (service, _) = build();
        let owner = UserProfile::member(OWNER);
        let recipient = UserProfile::member(OTHER_USER);

        service.create(&owner, &GUILD, "Rex", None).await.unwrap();
        service
            .transfer(&owner, &GUILD, "Rex", &recipient)
            .await
            .unwrap();

        let character = service.find(OTHER_USER, &GUILD, "Rex").await.unwrap();
        assert_eq!(character.owner_id, OTHER_USER);
    }
}
