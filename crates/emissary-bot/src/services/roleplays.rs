//! Roleplay logging and session management.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use emissary_shared::{naming, CommandRegistry, EmissaryError, Permission, Snowflake};
use emissary_store::{
    Database, ParticipantStatus, Roleplay, RoleplayMessage, RoleplayParticipant, StoreError,
};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::errors::store_error;
use crate::identity::{GuildProfile, IdentityService, UserProfile};
use crate::ownership;
use crate::permissions::PermissionResolver;

/// Command group consulted for reserved names.
const NAME_GROUP: &str = "roleplay";

#[derive(Clone)]
pub struct RoleplayService {
    db: Arc<Mutex<Database>>,
    identity: IdentityService,
    resolver: PermissionResolver,
    commands: Arc<CommandRegistry>,
}

impl RoleplayService {
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

    /// Create a roleplay owned by the actor, who joins it immediately.
    pub async fn create(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        name: &str,
        summary: Option<&str>,
        is_public: bool,
    ) -> Result<Roleplay, EmissaryError> {
        let owner = self.identity.get_or_register_user(actor).await?;
        self.identity.get_or_register_server(guild).await?;

        let name = name.trim();
        naming::validate_entity_name(name, &self.commands, NAME_GROUP)?;

        let roleplay = Roleplay {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            server_id: guild.id,
            name: name.to_string(),
            summary: summary.map(str::to_string),
            is_active: false,
            is_public,
            dedicated_channel: None,
            last_updated: Utc::now(),
            created_at: Utc::now(),
        };

        let db = self.db.lock().await;
        match db.create_roleplay(&roleplay) {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(EmissaryError::DuplicateEntity(format!(
                    "You already have a roleplay named \"{name}\"."
                )))
            }
            Err(e) => return Err(store_error(e, "the roleplay")),
        }

        db.upsert_participant(&RoleplayParticipant {
            roleplay_id: roleplay.id,
            user_id: owner.id,
            status: ParticipantStatus::Joined,
        })
        .map_err(|e| store_error(e, "the roleplay"))?;

        info!(owner = %owner.id, name = %roleplay.name, "roleplay created");
        Ok(roleplay)
    }

    /// Resolve a roleplay from a command argument (`owner:name` or a bare,
    /// server-unique name).
    pub async fn find(
        &self,
        actor: Snowflake,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<Roleplay, EmissaryError> {
        let db = self.db.lock().await;

        if let Some((owner_part, name_part)) = query.split_once(':') {
            let owner = Snowflake::parse(owner_part).ok_or_else(|| {
                EmissaryError::Validation(format!("\"{owner_part}\" isn't a user."))
            })?;
            return db
                .get_roleplay_by_name(owner, name_part.trim())
                .map_err(|e| match e {
                    StoreError::NotFound => EmissaryError::NotFound(format!(
                        "That user doesn't have a roleplay named \"{}\".",
                        name_part.trim()
                    )),
                    other => store_error(other, "the roleplay"),
                });
        }

        match db.get_roleplay_by_name(actor, query) {
            Ok(roleplay) => return Ok(roleplay),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(store_error(e, "the roleplay")),
        }

        let on_server = db
            .list_roleplays_for_server(guild.id)
            .map_err(|e| store_error(e, "roleplays"))?;
        let mut matches = on_server
            .iter()
            .filter(|r| r.name.eq_ignore_ascii_case(query));

        match (matches.next(), matches.next()) {
            (Some(roleplay), None) => Ok(roleplay.clone()),
            (Some(_), Some(_)) => Err(EmissaryError::Validation(format!(
                "More than one roleplay here is named \"{query}\". Use owner:name to pick one."
            ))),
            _ => {
                let message =
                    match naming::closest_match(query, on_server.iter().map(|r| r.name.as_str())) {
                        Some(suggestion) => format!(
                            "There's no roleplay named \"{query}\". Did you mean \"{suggestion}\"?"
                        ),
                        None => format!("There's no roleplay named \"{query}\"."),
                    };
                Err(EmissaryError::NotFound(message))
            }
        }
    }

    /// Invite a user.  Owner-or-`manage-roleplays` gated.
    pub async fn invite(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        invitee: &UserProfile,
    ) -> Result<(), EmissaryError> {
        let roleplay = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &roleplay,
            actor.id,
            Permission::ManageRoleplays,
            &self.resolver,
            Some(guild),
        )
        .await?;

        let invited = self.identity.get_or_register_user(invitee).await?;

        let db = self.db.lock().await;
        if let Ok(existing) = db.get_participant(roleplay.id, invited.id) {
            if existing.status == ParticipantStatus::Joined {
                return Err(EmissaryError::Validation(
                    "That user is already a participant.".into(),
                ));
            }
        }

        db.upsert_participant(&RoleplayParticipant {
            roleplay_id: roleplay.id,
            user_id: invited.id,
            status: ParticipantStatus::Invited,
        })
        .map_err(|e| store_error(e, "the roleplay"))
    }

    /// Join a roleplay.  Public roleplays are open to anyone who hasn't
    /// been kicked; private ones require a standing invite.
    pub async fn join(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<(), EmissaryError> {
        let roleplay = self.find(actor.id, guild, query).await?;
        let user = self.identity.get_or_register_user(actor).await?;

        let db = self.db.lock().await;
        let standing = match db.get_participant(roleplay.id, user.id) {
            Ok(participant) => Some(participant.status),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(store_error(e, "the roleplay")),
        };

        match standing {
            Some(ParticipantStatus::Joined) => {
                return Err(EmissaryError::Validation(
                    "You're already a participant.".into(),
                ))
            }
            Some(ParticipantStatus::Kicked) => return Err(EmissaryError::PermissionDenied),
            Some(ParticipantStatus::Invited) | Some(ParticipantStatus::Left) => {}
            None if roleplay.is_public => {}
            None => {
                return Err(EmissaryError::Validation(
                    "That roleplay is invite-only.".into(),
                ))
            }
        }

        db.upsert_participant(&RoleplayParticipant {
            roleplay_id: roleplay.id,
            user_id: user.id,
            status: ParticipantStatus::Joined,
        })
        .map_err(|e| store_error(e, "the roleplay"))
    }

    /// Leave a roleplay.
    pub async fn leave(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<(), EmissaryError> {
        let roleplay = self.find(actor.id, guild, query).await?;

        let db = self.db.lock().await;
        match db.get_participant(roleplay.id, actor.id) {
            Ok(p) if p.status == ParticipantStatus::Joined => db
                .upsert_participant(&RoleplayParticipant {
                    status: ParticipantStatus::Left,
                    ..p
                })
                .map_err(|e| store_error(e, "the roleplay")),
            _ => Err(EmissaryError::Validation(
                "You're not a participant of that roleplay.".into(),
            )),
        }
    }

    /// Remove a participant.  They can't rejoin without a fresh invite.
    pub async fn kick(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        target: Snowflake,
    ) -> Result<(), EmissaryError> {
        let roleplay = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &roleplay,
            actor.id,
            Permission::ManageRoleplays,
            &self.resolver,
            Some(guild),
        )
        .await?;

        let db = self.db.lock().await;
        db.get_participant(roleplay.id, target)
            .map_err(|e| match e {
                StoreError::NotFound => EmissaryError::NotFound(
                    "That user isn't a participant of that roleplay.".into(),
                ),
                other => store_error(other, "the roleplay"),
            })?;

        db.upsert_participant(&RoleplayParticipant {
            roleplay_id: roleplay.id,
            user_id: target,
            status: ParticipantStatus::Kicked,
        })
        .map_err(|e| store_error(e, "the roleplay"))
    }

    /// Start logging a roleplay in a channel.
    pub async fn start(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        channel: Snowflake,
    ) -> Result<Roleplay, EmissaryError> {
        let mut roleplay = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &roleplay,
            actor.id,
            Permission::StartRoleplay,
            &self.resolver,
            Some(guild),
        )
        .await?;

        let db = self.db.lock().await;
        let on_server = db
            .list_roleplays_for_server(guild.id)
            .map_err(|e| store_error(e, "roleplays"))?;
        let channel_busy = on_server.iter().any(|r| {
            r.id != roleplay.id && r.is_active && r.dedicated_channel == Some(channel)
        });
        if channel_busy {
            return Err(EmissaryError::Validation(
                "There's already an active roleplay in that channel.".into(),
            ));
        }

        roleplay.is_active = true;
        roleplay.dedicated_channel = Some(channel);
        roleplay.last_updated = Utc::now();
        db.update_roleplay(&roleplay)
            .map_err(|e| store_error(e, "the roleplay"))?;

        info!(name = %roleplay.name, %channel, "roleplay started");
        Ok(roleplay)
    }

    /// Stop logging a roleplay.
    pub async fn stop(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<Roleplay, EmissaryError> {
        let mut roleplay = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &roleplay,
            actor.id,
            Permission::StartRoleplay,
            &self.resolver,
            Some(guild),
        )
        .await?;

        if !roleplay.is_active {
            return Err(EmissaryError::Validation(
                "That roleplay isn't running.".into(),
            ));
        }

        roleplay.is_active = false;
        roleplay.dedicated_channel = None;
        let db = self.db.lock().await;
        db.update_roleplay(&roleplay)
            .map_err(|e| store_error(e, "the roleplay"))?;

        info!(name = %roleplay.name, "roleplay stopped");
        Ok(roleplay)
    }

    /// Log a channel message into whichever active roleplay is bound to
    /// the channel.  Non-participant chatter is ignored.  Returns whether
    /// the message was logged.
    pub async fn log_channel_message(
        &self,
        guild: &GuildProfile,
        channel: Snowflake,
        message_id: Snowflake,
        author: Snowflake,
        author_nickname: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, EmissaryError> {
        let db = self.db.lock().await;
        let on_server = db
            .list_roleplays_for_server(guild.id)
            .map_err(|e| store_error(e, "roleplays"))?;
        let Some(roleplay) = on_server
            .iter()
            .find(|r| r.is_active && r.dedicated_channel == Some(channel))
        else {
            return Ok(false);
        };

        match db.get_participant(roleplay.id, author) {
            Ok(p) if p.status == ParticipantStatus::Joined => {}
            Ok(_) | Err(StoreError::NotFound) => return Ok(false),
            Err(e) => return Err(store_error(e, "the roleplay")),
        }

        // Authors with a default character on this server are logged under
        // that persona rather than their Discord display name.
        let persona = match db.get_default_character(author, guild.id) {
            Ok(character) => character.nickname.unwrap_or(character.name),
            Err(StoreError::NotFound) => author_nickname.to_string(),
            Err(e) => return Err(store_error(e, "the roleplay")),
        };

        db.log_roleplay_message(&RoleplayMessage {
            id: message_id,
            roleplay_id: roleplay.id,
            author_id: author,
            author_nickname: persona,
            content: content.to_string(),
            timestamp,
        })
        .map_err(|e| store_error(e, "the roleplay"))?;
        db.touch_roleplay(roleplay.id, timestamp)
            .map_err(|e| store_error(e, "the roleplay"))?;
        Ok(true)
    }

    /// Export a roleplay's log as plain text, one line per message.
    pub async fn export_log(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<String, EmissaryError> {
        let roleplay = self.find(actor.id, guild, query).await?;

        let db = self.db.lock().await;
        let messages = db
            .list_roleplay_messages(roleplay.id)
            .map_err(|e| store_error(e, "the roleplay log"))?;

        let mut out = String::new();
        for message in &messages {
            out.push_str(&format!(
                "{}: {}\n",
                message.author_nickname, message.content
            ));
        }
        Ok(out)
    }

    /// Transfer a roleplay to a new owner.
    pub async fn transfer(
        &self,
        actor: &UserProfile,
        guild: &GuildProfile,
        query: &str,
        new_owner: &UserProfile,
    ) -> Result<(), EmissaryError> {
        let roleplay = self.find(actor.id, guild, query).await?;
        ownership::authorize_owner_or_permission(
            &roleplay,
            actor.id,
            Permission::ManageRoleplays,
            &self.resolver,
            Some(guild),
        )
        .await?;

        let recipient = self.identity.get_or_register_user(new_owner).await?;

        let db = self.db.lock().await;
        let existing = db
            .list_roleplays_for_server(guild.id)
            .map_err(|e| store_error(e, "roleplays"))?;
        let recipient_names = existing
            .iter()
            .filter(|r| r.owner_id == recipient.id)
            .map(|r| r.name.as_str());
        ownership::ensure_transferable(&roleplay, recipient.id, recipient_names)?;

        db.set_roleplay_owner(roleplay.id, recipient.id)
            .map_err(|e| store_error(e, "the roleplay"))
    }

    /// Participant rows of a roleplay, every status included.
    pub async fn participants(
        &self,
        actor: Snowflake,
        guild: &GuildProfile,
        query: &str,
    ) -> Result<Vec<RoleplayParticipant>, EmissaryError> {
        let roleplay = self.find(actor, guild, query).await?;
        let db = self.db.lock().await;
        db.list_participants(roleplay.id)
            .map_err(|e| store_error(e, "the roleplay"))
    }

    /// List every roleplay on the server.
    pub async fn list_for_server(
        &self,
        guild: &GuildProfile,
    ) -> Result<Vec<Roleplay>, EmissaryError> {
        let db = self.db.lock().await;
        db.list_roleplays_for_server(guild.id)
            .map_err(|e| store_error(e, "roleplays"))
    }

    /// Stop active roleplays whose last logged message is older than
    /// `timeout`.  Returns the number stopped.  Run periodically.
    pub async fn sweep_stale(&self, timeout: Duration) -> Result<usize, EmissaryError> {
        let cutoff = Utc::now() - timeout;
        let mut db = self.db.lock().await;
        let stopped = db
            .stop_stale_roleplays(cutoff)
            .map_err(|e| store_error(e, "roleplays"))?;
        for roleplay in &stopped {
            info!(name = %roleplay.name, server = %roleplay.server_id, "stopped stale roleplay");
        }
        Ok(stopped.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Snowflake = Snowflake(1);
    const PLAYER: Snowflake = Snowflake(2);
    const CHANNEL: Snowflake = Snowflake(500);
    const GUILD: GuildProfile = GuildProfile {
        id: Snowflake(100),
        owner_id: Snowflake(9),
    };

    fn build() -> RoleplayService {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let identity = IdentityService::new(db.clone());
        let resolver = PermissionResolver::new(db.clone());
        let mut commands = CommandRegistry::new();
        commands.register(NAME_GROUP, ["create", "join", "start", "stop"]);
        RoleplayService::new(db, identity, resolver, Arc::new(commands))
    }

    #[tokio::test]
    async fn creator_is_joined_automatically() {
        let service = build();
        let owner = UserProfile::member(OWNER);
        let rp = service
            .create(&owner, &GUILD, "The Long Night", None, false)
            .await
            .unwrap();
        assert!(!rp.is_active);

        // Owner can leave, proving they were joined.
        service.leave(&owner, &GUILD, "The Long Night").await.unwrap();
    }

    #[tokio::test]
    async fn private_roleplay_requires_invite() {
        let service = build();
        let owner = UserProfile::member(OWNER);
        let player = UserProfile::member(PLAYER);
        service
            .create(&owner, &GUILD, "Secret", None, false)
            .await
            .unwrap();

        assert!(matches!(
            service.join(&player, &GUILD, "1:Secret").await.unwrap_err(),
            EmissaryError::Validation(_)
        ));

        service.invite(&owner, &GUILD, "Secret", &player).await.unwrap();
        service.join(&player, &GUILD, "1:Secret").await.unwrap();
    }

    #[tokio::test]
    async fn kicked_player_cannot_rejoin_a_public_roleplay() {
        let service = build();
        let owner = UserProfile::member(OWNER);
        let player = UserProfile::member(PLAYER);
        service
            .create(&owner, &GUILD, "Open Tavern", None, true)
            .await
            .unwrap();

        service.join(&player, &GUILD, "1:Open Tavern").await.unwrap();
        service
            .kick(&owner, &GUILD, "Open Tavern", PLAYER)
            .await
            .unwrap();
        assert!(matches!(
            service.join(&player, &GUILD, "1:Open Tavern").await.unwrap_err(),
            EmissaryError::PermissionDenied
        ));
    }

    #[tokio::test]
    async fn only_participant_messages_in_the_bound_channel_are_logged() {
        let service = build();
        let owner = UserProfile::member(OWNER);
        service
            .create(&owner, &GUILD, "The Long Night", None, false)
            .await
            .unwrap();
        service
            .start(&owner, &GUILD, "The Long Night", CHANNEL)
            .await
            .unwrap();

        let logged = service
            .log_channel_message(
                &GUILD,
                CHANNEL,
                Snowflake(9001),
                OWNER,
                "Rex",
                "The night was long.",
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(logged);

        // Non-participant chatter is skipped.
        let skipped = service
            .log_channel_message(
                &GUILD,
                CHANNEL,
                Snowflake(9002),
                PLAYER,
                "Passerby",
                "hello?",
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(!skipped);

        // Messages in unrelated channels are skipped.
        let elsewhere = service
            .log_channel_message(
                &GUILD,
                Snowflake(501),
                Snowflake(9003),
                OWNER,
                "Rex",
                "wrong room",
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(!elsewhere);

        let log = service
            .export_log(&owner, &GUILD, "The Long Night")
            .await
            .unwrap();
        assert_eq!(log, "Rex: The night was long.\n");
    }

    #[tokio::test]
    async fn default_character_persona_replaces_the_display_name() {
        let service = build();
        let owner = UserProfile::member(OWNER);
        service
            .create(&owner, &GUILD, "The Long Night", None, false)
            .await
            .unwrap();
        service
            .start(&owner, &GUILD, "The Long Night", CHANNEL)
            .await
            .unwrap();

        {
            let db = service.db.lock().await;
            let character = emissary_store::Character {
                id: Uuid::new_v4(),
                owner_id: OWNER,
                server_id: GUILD.id,
                name: "Fenris".into(),
                nickname: None,
                summary: None,
                description: None,
                avatar_url: None,
                is_nsfw: false,
                is_default: false,
                created_at: Utc::now(),
            };
            db.create_character(&character).unwrap();
            db.set_default_character(OWNER, character.id).unwrap();
        }

        service
            .log_channel_message(
                &GUILD,
                CHANNEL,
                Snowflake(9001),
                OWNER,
                "some-discord-name",
                "A howl in the dark.",
                Utc::now(),
            )
            .await
            .unwrap();

        let log = service
            .export_log(&owner, &GUILD, "The Long Night")
            .await
            .unwrap();
        assert_eq!(log, "Fenris: A howl in the dark.\n");
    }

    #[tokio::test]
    async fn one_active_roleplay_per_channel() {
        let service = build();
        let owner = UserProfile::member(OWNER);
        service
            .create(&owner, &GUILD, "First", None, false)
            .await
            .unwrap();
        service
            .create(&owner, &GUILD, "Second", None, false)
            .await
            .unwrap();

        service.start(&owner, &GUILD, "First", CHANNEL).await.unwrap();
        assert!(matches!(
            service.start(&owner, &GUILD, "Second", CHANNEL).await.unwrap_err(),
            EmissaryError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn sweep_stops_only_stale_roleplays() {
        let service = build();
        let owner = UserProfile::member(OWNER);
        service
            .create(&owner, &GUILD, "Stale", None, false)
            .await
            .unwrap();
        let started = service
            .start(&owner, &GUILD, "Stale", CHANNEL)
            .await
            .unwrap();

        // Backdate the last update past the timeout.
        {
            let db = service.db.lock().await;
            db.touch_roleplay(started.id, Utc::now() - Duration::days(5))
                .unwrap();
        }

        let stopped = service.sweep_stale(Duration::days(3)).await.unwrap();
        assert_eq!(stopped, 1);
        let rp = service.find(OWNER, &GUILD, "Stale").await.unwrap();
        assert!(!rp.is_active);
        assert!(rp.dedicated_channel.is_none());

        // A second sweep finds nothing.
        assert_eq!(service.sweep_stale(Duration::days(3)).await.unwrap(), 0);
    }
}
