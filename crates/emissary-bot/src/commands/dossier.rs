//! `dossier` command group.

use emissary_shared::EmissaryError;

use super::{arg, opt_arg, Dispatcher, Invocation, Reply};

impl Dispatcher {
    pub(super) async fn dossier_command(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        let actor = invocation.actor.id;
        let guild = invocation.guild.as_ref();
        let args = &invocation.args;

        match arg(args, 1, "a subcommand")? {
            "create" => {
                let title = arg(args, 2, "a title")?;
                let dossier = self
                    .dossiers
                    .create(actor, guild, title, opt_arg(args, 3))
                    .await?;
                Ok(Reply::new(format!("Filed \"{}\".", dossier.title)))
            }
            "show" => {
                let title = arg(args, 2, "a title")?;
                let dossier = self.dossiers.view(title).await?;
                let mut text = format!("**{}**\n", dossier.title);
                if let Some(summary) = &dossier.summary {
                    text.push_str(summary);
                    text.push('\n');
                }
                if dossier.body_path.is_some() {
                    text.push_str("(has an attached document)\n");
                }
                Ok(Reply::new(text))
            }
            "list" => {
                let dossiers = self.dossiers.list().await?;
                if dossiers.is_empty() {
                    return Ok(Reply::new("No dossiers on file."));
                }
                let mut text = String::from("Dossiers:\n");
                for dossier in &dossiers {
                    text.push_str(&format!(
                        "  {} — {}\n",
                        dossier.title,
                        dossier.summary.as_deref().unwrap_or("no summary")
                    ));
                }
                Ok(Reply::new(text))
            }
            "rename" => {
                let title = arg(args, 2, "a title")?;
                let new_title = arg(args, 3, "a new title")?;
                self.dossiers.rename(actor, guild, title, new_title).await?;
                Ok(Reply::new(format!("Retitled to \"{new_title}\".")))
            }
            "summary" => {
                let title = arg(args, 2, "a title")?;
                self.dossiers
                    .set_summary(actor, guild, title, opt_arg(args, 3))
                    .await?;
                Ok(Reply::new("Updated."))
            }
            "attach" => {
                let title = arg(args, 2, "a title")?;
                let path = arg(args, 3, "a document path")?;
                self.dossiers.attach_body(actor, guild, title, path).await?;
                Ok(Reply::new("Attached."))
            }
            "delete" => {
                let title = arg(args, 2, "a title")?;
                self.dossiers.delete(actor, guild, title).await?;
                Ok(Reply::new("Shredded."))
            }
            other => Err(EmissaryError::NotFound(format!(
                "There's no \"dossier {other}\" command."
            ))),
        }
    }
}
