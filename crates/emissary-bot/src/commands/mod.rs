//! Command dispatch.
//!
//! The gateway adapter (or the dev console) turns a chat message into an
//! [`Invocation`]; the [`Dispatcher`] routes it to a feature service and
//! renders the outcome as a [`Reply`].  User-facing errors are rendered
//! verbatim; internal faults are logged and replaced with a generic line.

mod character;
mod dossier;
mod permission;
mod profile;
mod roleplay;

use std::sync::Arc;

use emissary_shared::{CommandRegistry, EmissaryError, PermissionRegistry, Snowflake};
use tracing::error;

use crate::identity::{GuildProfile, UserProfile};
use crate::permissions::PermissionResolver;
use crate::services::{CharacterService, DossierService, ProfileService, RoleplayService};

/// One parsed command from the outside world.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub actor: UserProfile,
    pub guild: Option<GuildProfile>,
    /// Channel the command was issued in, when there is one.
    pub channel: Option<Snowflake>,
    /// Tokenized command line: group, verb, then arguments.
    pub args: Vec<String>,
}

/// What gets sent back to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Every command name and alias, grouped the way entity-name validation
/// expects.  Built once at startup.
pub fn build_command_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(
        "permission",
        ["grant", "revoke", "revoke-target", "list", "list-granted"],
    );
    registry.register(
        "character",
        [
            "create", "show", "list", "rename", "delete", "transfer", "default", "nickname",
            "summary", "description", "avatar", "nsfw",
        ],
    );
    registry.register(
        "roleplay",
        [
            "create", "show", "list", "invite", "join", "leave", "kick", "start", "stop",
            "export", "transfer",
        ],
    );
    registry.register(
        "dossier",
        ["create", "show", "list", "rename", "summary", "attach", "delete"],
    );
    registry.register("user", ["show", "bio", "timezone"]);
    registry.register("server", ["show", "describe", "join-message", "nsfw"]);
    registry
}

/// Routes invocations to feature services.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) resolver: PermissionResolver,
    pub(crate) registry: Arc<PermissionRegistry>,
    pub(crate) characters: CharacterService,
    pub(crate) roleplays: RoleplayService,
    pub(crate) dossiers: DossierService,
    pub(crate) profiles: ProfileService,
}

impl Dispatcher {
    pub fn new(
        resolver: PermissionResolver,
        registry: Arc<PermissionRegistry>,
        characters: CharacterService,
        roleplays: RoleplayService,
        dossiers: DossierService,
        profiles: ProfileService,
    ) -> Self {
        Self {
            resolver,
            registry,
            characters,
            roleplays,
            dossiers,
            profiles,
        }
    }

    /// Handle one invocation, always producing a reply.
    pub async fn dispatch(&self, invocation: &Invocation) -> Reply {
        match self.route(invocation).await {
            Ok(reply) => reply,
            Err(err) if err.is_user_facing() => Reply::new(err.to_string()),
            Err(err) => {
                error!(%err, args = ?invocation.args, "command failed");
                Reply::new("Something went wrong on my end. It's been logged.")
            }
        }
    }

    async fn route(&self, invocation: &Invocation) -> Result<Reply, EmissaryError> {
        let group = arg(&invocation.args, 0, "a command")?;
        match group {
            "permission" => self.permission_command(invocation).await,
            "character" => self.character_command(invocation).await,
            "roleplay" => self.roleplay_command(invocation).await,
            "dossier" => self.dossier_command(invocation).await,
            "user" => self.user_command(invocation).await,
            "server" => self.server_command(invocation).await,
            other => Err(EmissaryError::NotFound(format!(
                "There's no \"{other}\" command. Try permission, character, roleplay, \
                 dossier, user, or server."
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Argument helpers shared by the handlers
// ---------------------------------------------------------------------------

pub(crate) fn arg<'a>(
    args: &'a [String],
    index: usize,
    what: &str,
) -> Result<&'a str, EmissaryError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| EmissaryError::Validation(format!("I need {what} for that.")))
}

pub(crate) fn opt_arg(args: &[String], index: usize) -> Option<&str> {
    args.get(index).map(String::as_str)
}

pub(crate) fn user_arg(args: &[String], index: usize) -> Result<Snowflake, EmissaryError> {
    let raw = arg(args, index, "a user")?;
    Snowflake::parse(raw)
        .ok_or_else(|| EmissaryError::Validation(format!("\"{raw}\" isn't a user.")))
}

pub(crate) fn require_guild(invocation: &Invocation) -> Result<&GuildProfile, EmissaryError> {
    invocation.guild.as_ref().ok_or_else(|| {
        EmissaryError::UnmetPrecondition("That command only works inside a server.".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityService;
    use emissary_store::Database;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const ACTOR: Snowflake = Snowflake(1);
    const SERVER_OWNER: Snowflake = Snowflake(9);

    fn guild() -> GuildProfile {
        GuildProfile {
            id: Snowflake(100),
            owner_id: SERVER_OWNER,
        }
    }

    fn dispatcher() -> Dispatcher {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let identity = IdentityService::new(db.clone());
        let resolver = PermissionResolver::new(db.clone());
        let registry = Arc::new(PermissionRegistry::builtin());
        let commands = Arc::new(build_command_registry());

        let characters = CharacterService::new(
            db.clone(),
            identity.clone(),
            resolver.clone(),
            commands.clone(),
        );
        let roleplays = RoleplayService::new(
            db.clone(),
            identity.clone(),
            resolver.clone(),
            commands.clone(),
        );
        let dossiers = DossierService::new(db.clone(), resolver.clone(), commands.clone());
        let profiles = ProfileService::new(db, identity, resolver.clone());

        Dispatcher::new(resolver, registry, characters, roleplays, dossiers, profiles)
    }

    fn invocation(actor: Snowflake, args: &[&str]) -> Invocation {
        Invocation {
            actor: UserProfile::member(actor),
            guild: Some(guild()),
            channel: Some(Snowflake(500)),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn unknown_command_gets_a_helpful_reply() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .dispatch(&invocation(ACTOR, &["frobnicate"]))
            .await;
        assert!(reply.text.contains("There's no \"frobnicate\" command"));
    }

    #[tokio::test]
    async fn character_lifecycle_through_the_dispatcher() {
        let dispatcher = dispatcher();

        let reply = dispatcher
            .dispatch(&invocation(ACTOR, &["character", "create", "Rex"]))
            .await;
        assert!(reply.text.contains("Rex"), "{}", reply.text);

        let reply = dispatcher
            .dispatch(&invocation(ACTOR, &["character", "show", "Rex"]))
            .await;
        assert!(reply.text.contains("Rex"));

        let reply = dispatcher
            .dispatch(&invocation(ACTOR, &["character", "create", "Rex"]))
            .await;
        assert!(reply.text.contains("already have a character"));
    }

    #[tokio::test]
    async fn permission_grant_flows_through_to_the_services() {
        let dispatcher = dispatcher();

        // A regular member can't grant.
        let reply = dispatcher
            .dispatch(&invocation(
                ACTOR,
                &["permission", "grant", "<@2>", "edit-character"],
            ))
            .await;
        assert_eq!(reply.text, "You don't have permission to do that.");

        // The server owner can.
        let reply = dispatcher
            .dispatch(&invocation(
                SERVER_OWNER,
                &["permission", "grant", "<@2>", "edit-character", "other"],
            ))
            .await;
        assert!(reply.text.contains("Granted"), "{}", reply.text);

        // Now user 2 can edit user 1's character.
        dispatcher
            .dispatch(&invocation(ACTOR, &["character", "create", "Rex"]))
            .await;
        let reply = dispatcher
            .dispatch(&invocation(
                Snowflake(2),
                &["character", "summary", "<@1>:Rex", "A good dog."],
            ))
            .await;
        assert!(reply.text.contains("Updated"), "{}", reply.text);
    }

    #[tokio::test]
    async fn misspelled_permission_names_get_a_suggestion() {
        let dispatcher = dispatcher();
        let reply = dispatcher
            .dispatch(&invocation(
                SERVER_OWNER,
                &["permission", "grant", "<@2>", "edit-charcter"],
            ))
            .await;
        assert!(reply.text.contains("Did you mean"), "{}", reply.text);
        assert!(reply.text.contains("edit-character"));
    }

    #[tokio::test]
    async fn user_profile_and_server_settings_commands() {
        let dispatcher = dispatcher();

        dispatcher
            .dispatch(&invocation(ACTOR, &["user", "bio", "Keeper of hounds."]))
            .await;
        let reply = dispatcher.dispatch(&invocation(ACTOR, &["user", "show"])).await;
        assert!(reply.text.contains("Keeper of hounds."), "{}", reply.text);

        // Server edits are permission-gated; the owner passes.
        let reply = dispatcher
            .dispatch(&invocation(ACTOR, &["server", "nsfw", "on"]))
            .await;
        assert_eq!(reply.text, "You don't have permission to do that.");
        let reply = dispatcher
            .dispatch(&invocation(SERVER_OWNER, &["server", "nsfw", "on"]))
            .await;
        assert_eq!(reply.text, "Updated.");
        let reply = dispatcher
            .dispatch(&invocation(ACTOR, &["server", "show"]))
            .await;
        assert!(reply.text.contains("NSFW allowed"), "{}", reply.text);
    }

    #[tokio::test]
    async fn guild_only_commands_refuse_direct_messages() {
        let dispatcher = dispatcher();
        let mut invocation = invocation(ACTOR, &["character", "create", "Rex"]);
        invocation.guild = None;
        let reply = dispatcher.dispatch(&invocation).await;
        assert!(reply.text.contains("inside a server"));
    }
}
