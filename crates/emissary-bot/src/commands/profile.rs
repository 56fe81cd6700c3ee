//! `user` and `server` command groups.

use emissary_shared::EmissaryError;

use super::{arg, opt_arg, require_guild, user_arg, Dispatcher, Invocation, Reply};

impl Dispatcher {
    pub(super) async fn user_command(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        let actor = &invocation.actor;
        let args = &invocation.args;

        match arg(args, 1, "a subcommand")? {
            "show" => {
                let id = match opt_arg(args, 2) {
                    Some(_) => user_arg(args, 2)?,
                    None => actor.id,
                };
                let user = self.profiles.get_user(id).await?;
                let mut text = format!("<@{}>\n", user.id);
                if let Some(bio) = &user.bio {
                    text.push_str(bio);
                    text.push('\n');
                }
                if let Some(offset) = user.timezone_offset {
                    text.push_str(&format!("Timezone: UTC{offset:+}\n"));
                }
                Ok(Reply::new(text))
            }
            "bio" => {
                self.profiles.set_bio(actor, opt_arg(args, 2)).await?;
                Ok(Reply::new("Updated."))
            }
            "timezone" => {
                let offset = match opt_arg(args, 2) {
                    None => None,
                    Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                        EmissaryError::Validation(format!(
                            "\"{raw}\" isn't a UTC offset in hours."
                        ))
                    })?),
                };
                self.profiles.set_timezone(actor, offset).await?;
                Ok(Reply::new("Updated."))
            }
            other => Err(EmissaryError::NotFound(format!(
                "There's no \"user {other}\" command."
            ))),
        }
    }

    pub(super) async fn server_command(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        let guild = require_guild(invocation)?;
        let actor = &invocation.actor;
        let args = &invocation.args;

        match arg(args, 1, "a subcommand")? {
            "show" => {
                let server = self.profiles.get_server(guild).await?;
                let mut text = format!("Server {}\n", server.id);
                if let Some(description) = &server.description {
                    text.push_str(description);
                    text.push('\n');
                }
                if server.is_nsfw {
                    text.push_str("(NSFW allowed)\n");
                }
                Ok(Reply::new(text))
            }
            "describe" => {
                let description = opt_arg(args, 2).map(str::to_string);
                self.profiles
                    .update_server(actor, guild, |s| s.description = description)
                    .await?;
                Ok(Reply::new("Updated."))
            }
            "join-message" => {
                let message = opt_arg(args, 2).map(str::to_string);
                self.profiles
                    .update_server(actor, guild, |s| {
                        s.send_join_message = message.is_some();
                        s.join_message = message;
                    })
                    .await?;
                Ok(Reply::new("Updated."))
            }
            "nsfw" => {
                let flag = match arg(args, 2, "on or off")? {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(EmissaryError::Validation(format!(
                            "\"{other}\" isn't a flag. Use on or off."
                        )))
                    }
                };
                self.profiles
                    .update_server(actor, guild, |s| s.is_nsfw = flag)
                    .await?;
                Ok(Reply::new("Updated."))
            }
            other => Err(EmissaryError::NotFound(format!(
                "There's no \"server {other}\" command."
            ))),
        }
    }
}
