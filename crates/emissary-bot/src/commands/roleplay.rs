//! `roleplay` command group.

use emissary_shared::EmissaryError;

use super::{arg, opt_arg, require_guild, user_arg, Dispatcher, Invocation, Reply};
use crate::identity::UserProfile;

impl Dispatcher {
    pub(super) async fn roleplay_command(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        let guild = require_guild(invocation)?;
        let actor = &invocation.actor;
        let args = &invocation.args;

        match arg(args, 1, "a subcommand")? {
            "create" => {
                let name = arg(args, 2, "a name")?;
                let is_public = opt_arg(args, 3) == Some("public");
                let summary = if is_public { opt_arg(args, 4) } else { opt_arg(args, 3) };
                let roleplay = self
                    .roleplays
                    .create(actor, guild, name, summary, is_public)
                    .await?;
                Ok(Reply::new(format!(
                    "Created \"{}\" ({}). Start it in a channel when you're ready.",
                    roleplay.name,
                    if roleplay.is_public { "public" } else { "invite-only" }
                )))
            }
            "show" => {
                let query = arg(args, 2, "a roleplay")?;
                let roleplay = self.roleplays.find(actor.id, guild, query).await?;
                let mut text = format!(
                    "**{}** — owned by <@{}>, {}\n",
                    roleplay.name,
                    roleplay.owner_id,
                    if roleplay.is_active { "running" } else { "stopped" }
                );
                if let Some(summary) = &roleplay.summary {
                    text.push_str(summary);
                    text.push('\n');
                }
                let participants = self.roleplays.participants(actor.id, guild, query).await?;
                let joined: Vec<String> = participants
                    .iter()
                    .filter(|p| p.status == emissary_store::ParticipantStatus::Joined)
                    .map(|p| format!("<@{}>", p.user_id))
                    .collect();
                if !joined.is_empty() {
                    text.push_str(&format!("Participants: {}\n", joined.join(", ")));
                }
                Ok(Reply::new(text))
            }
            "list" => {
                let roleplays = self.roleplays.list_for_server(guild).await?;
                if roleplays.is_empty() {
                    return Ok(Reply::new("No roleplays on this server yet."));
                }
                let mut text = String::from("Roleplays:\n");
                for roleplay in &roleplays {
                    text.push_str(&format!(
                        "  {} — {}\n",
                        roleplay.name,
                        if roleplay.is_active { "running" } else { "stopped" }
                    ));
                }
                Ok(Reply::new(text))
            }
            "invite" => {
                let query = arg(args, 2, "a roleplay")?;
                let invitee = user_arg(args, 3)?;
                self.roleplays
                    .invite(actor, guild, query, &UserProfile::member(invitee))
                    .await?;
                Ok(Reply::new(format!("Invited <@{invitee}>.")))
            }
            "join" => {
                let query = arg(args, 2, "a roleplay")?;
                self.roleplays.join(actor, guild, query).await?;
                Ok(Reply::new("You're in."))
            }
            "leave" => {
                let query = arg(args, 2, "a roleplay")?;
                self.roleplays.leave(actor, guild, query).await?;
                Ok(Reply::new("You've left the roleplay."))
            }
            "kick" => {
                let query = arg(args, 2, "a roleplay")?;
                let target = user_arg(args, 3)?;
                self.roleplays.kick(actor, guild, query, target).await?;
                Ok(Reply::new(format!("Removed <@{target}>.")))
            }
            "start" => {
                let channel = invocation.channel.ok_or_else(|| {
                    EmissaryError::UnmetPrecondition(
                        "Start a roleplay from the channel it should run in.".into(),
                    )
                })?;
                let query = arg(args, 2, "a roleplay")?;
                let roleplay = self.roleplays.start(actor, guild, query, channel).await?;
                Ok(Reply::new(format!(
                    "\"{}\" is live in this channel. Messages from participants are being logged.",
                    roleplay.name
                )))
            }
            "stop" => {
                let query = arg(args, 2, "a roleplay")?;
                let roleplay = self.roleplays.stop(actor, guild, query).await?;
                Ok(Reply::new(format!("\"{}\" has stopped.", roleplay.name)))
            }
            "export" => {
                let query = arg(args, 2, "a roleplay")?;
                let log = self.roleplays.export_log(actor, guild, query).await?;
                if log.is_empty() {
                    return Ok(Reply::new("Nothing has been logged yet."));
                }
                Ok(Reply::new(log))
            }
            "transfer" => {
                let query = arg(args, 2, "a roleplay")?;
                let recipient = user_arg(args, 3)?;
                self.roleplays
                    .transfer(actor, guild, query, &UserProfile::member(recipient))
                    .await?;
                Ok(Reply::new(format!("Transferred to <@{recipient}>.")))
            }
            other => Err(EmissaryError::NotFound(format!(
                "There's no \"roleplay {other}\" command."
            ))),
        }
    }
}
