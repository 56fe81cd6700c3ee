//! `character` command group.

use emissary_shared::EmissaryError;
use emissary_store::Character;

use super::{arg, opt_arg, require_guild, user_arg, Dispatcher, Invocation, Reply};
use crate::identity::UserProfile;

impl Dispatcher {
    pub(super) async fn character_command(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        let guild = require_guild(invocation)?;
        let actor = &invocation.actor;
        let args = &invocation.args;

        match arg(args, 1, "a subcommand")? {
            "create" => {
                let name = arg(args, 2, "a name")?;
                let character = self
                    .characters
                    .create(actor, guild, name, opt_arg(args, 3))
                    .await?;
                Ok(Reply::new(format!(
                    "Created \"{}\". It's all yours.",
                    character.name
                )))
            }
            "show" => {
                let query = arg(args, 2, "a character")?;
                let character = self.characters.find(actor.id, guild, query).await?;
                Ok(Reply::new(render_character(&character)))
            }
            "list" => {
                let characters = match opt_arg(args, 2) {
                    Some("server") => self.characters.list_for_server(guild).await?,
                    _ => self.characters.list_for_owner(actor.id).await?,
                };
                if characters.is_empty() {
                    return Ok(Reply::new("No characters yet."));
                }
                let mut text = String::from("Characters:\n");
                for character in &characters {
                    text.push_str(&format!(
                        "  {} — {}\n",
                        character.name,
                        character.summary.as_deref().unwrap_or("no summary")
                    ));
                }
                Ok(Reply::new(text))
            }
            "rename" => {
                let query = arg(args, 2, "a character")?;
                let new_name = arg(args, 3, "a new name")?;
                let character = self.characters.rename(actor, guild, query, new_name).await?;
                Ok(Reply::new(format!("Renamed to \"{}\".", character.name)))
            }
            "delete" => {
                let query = arg(args, 2, "a character")?;
                self.characters.delete(actor, guild, query).await?;
                Ok(Reply::new("Deleted."))
            }
            "transfer" => {
                let query = arg(args, 2, "a character")?;
                let recipient = user_arg(args, 3)?;
                self.characters
                    .transfer(actor, guild, query, &UserProfile::member(recipient))
                    .await?;
                Ok(Reply::new(format!("Transferred to <@{recipient}>.")))
            }
            "default" => {
                let query = arg(args, 2, "a character")?;
                self.characters.set_default(actor, guild, query).await?;
                Ok(Reply::new("That's your default character now."))
            }
            "nickname" => {
                let query = arg(args, 2, "a character")?;
                self.characters
                    .set_nickname(actor, guild, query, opt_arg(args, 3))
                    .await?;
                Ok(Reply::new("Updated."))
            }
            "summary" => {
                let query = arg(args, 2, "a character")?;
                self.characters
                    .set_summary(actor, guild, query, opt_arg(args, 3))
                    .await?;
                Ok(Reply::new("Updated."))
            }
            "description" => {
                let query = arg(args, 2, "a character")?;
                self.characters
                    .set_description(actor, guild, query, opt_arg(args, 3))
                    .await?;
                Ok(Reply::new("Updated."))
            }
            "avatar" => {
                let query = arg(args, 2, "a character")?;
                self.characters
                    .set_avatar(actor, guild, query, opt_arg(args, 3))
                    .await?;
                Ok(Reply::new("Updated."))
            }
            "nsfw" => {
                let query = arg(args, 2, "a character")?;
                let flag = match arg(args, 3, "on or off")? {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(EmissaryError::Validation(format!(
                            "\"{other}\" isn't a flag. Use on or off."
                        )))
                    }
                };
                self.characters.set_nsfw(actor, guild, query, flag).await?;
                Ok(Reply::new("Updated."))
            }
            other => Err(EmissaryError::NotFound(format!(
                "There's no \"character {other}\" command."
            ))),
        }
    }
}

fn render_character(character: &Character) -> String {
    let mut text = format!("**{}**", character.name);
    if let Some(nickname) = &character.nickname {
        text.push_str(&format!(" \"{nickname}\""));
    }
    text.push_str(&format!(" — owned by <@{}>\n", character.owner_id));
    if let Some(summary) = &character.summary {
        text.push_str(summary);
        text.push('\n');
    }
    if let Some(description) = &character.description {
        text.push_str(description);
        text.push('\n');
    }
    if character.is_nsfw {
        text.push_str("(NSFW)\n");
    }
    text
}
