//! `permission` command group.
//!
//! Managing someone else's grants requires `manage-permissions` at target
//! `other` (the server owner is always exempt).  `list` is open to all.

use emissary_shared::{EmissaryError, Permission, PermissionTarget};

use super::{arg, opt_arg, require_guild, user_arg, Dispatcher, Invocation, Reply};

impl Dispatcher {
    pub(super) async fn permission_command(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        let args = &invocation.args;
        match arg(args, 1, "a subcommand (grant, revoke, revoke-target, list, list-granted)")? {
            "grant" => self.permission_grant(invocation).await,
            "revoke" => self.permission_revoke(invocation).await,
            "revoke-target" => self.permission_revoke_target(invocation).await,
            "list" => Ok(self.permission_list()),
            "list-granted" => self.permission_list_granted(invocation).await,
            other => Err(EmissaryError::NotFound(format!(
                "There's no \"permission {other}\" command."
            ))),
        }
    }

    async fn require_manager(&self, invocation: &Invocation) -> Result<(), EmissaryError> {
        self.resolver
            .check_in_context(
                invocation.actor.id,
                invocation.guild.as_ref(),
                Permission::ManagePermissions,
                PermissionTarget::OTHER,
            )
            .await
    }

    /// `permission grant <user> <permission> [self|other|all] [global]`
    async fn permission_grant(&self, invocation: &Invocation) -> Result<Reply, EmissaryError> {
        self.require_manager(invocation).await?;
        let guild = require_guild(invocation)?;
        let args = &invocation.args;

        let user = user_arg(args, 2)?;
        let descriptor = self.registry.resolve(arg(args, 3, "a permission name")?)?;
        let mut cursor = 4;
        let targets = match opt_arg(args, cursor).and_then(PermissionTarget::parse) {
            Some(targets) => {
                cursor += 1;
                targets
            }
            None => descriptor.default_targets,
        };
        let global = opt_arg(args, cursor) == Some("global");

        if global {
            self.resolver
                .grant_global(user, descriptor.permission, targets)
                .await?;
            Ok(Reply::new(format!(
                "Granted {} ({targets}) to <@{user}> everywhere.",
                descriptor.permission
            )))
        } else {
            self.resolver
                .grant(guild, user, descriptor.permission, targets)
                .await?;
            Ok(Reply::new(format!(
                "Granted {} ({targets}) to <@{user}>.",
                descriptor.permission
            )))
        }
    }

    /// `permission revoke <user> <permission> [global]`
    async fn permission_revoke(&self, invocation: &Invocation) -> Result<Reply, EmissaryError> {
        self.require_manager(invocation).await?;
        let guild = require_guild(invocation)?;
        let args = &invocation.args;

        let user = user_arg(args, 2)?;
        let descriptor = self.registry.resolve(arg(args, 3, "a permission name")?)?;

        if opt_arg(args, 4) == Some("global") {
            self.resolver
                .revoke_global(user, descriptor.permission)
                .await?;
            Ok(Reply::new(format!(
                "Revoked {} from <@{user}> everywhere.",
                descriptor.permission
            )))
        } else {
            self.resolver
                .revoke(guild.id, user, descriptor.permission)
                .await?;
            Ok(Reply::new(format!(
                "Revoked {} from <@{user}>.",
                descriptor.permission
            )))
        }
    }

    /// `permission revoke-target <user> <permission> <self|other|all>`
    async fn permission_revoke_target(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        self.require_manager(invocation).await?;
        let guild = require_guild(invocation)?;
        let args = &invocation.args;

        let user = user_arg(args, 2)?;
        let descriptor = self.registry.resolve(arg(args, 3, "a permission name")?)?;
        let raw = arg(args, 4, "a target scope (self, other, or all)")?;
        let target = PermissionTarget::parse(raw).ok_or_else(|| {
            EmissaryError::Validation(format!(
                "\"{raw}\" isn't a target scope. Use self, other, or all."
            ))
        })?;

        self.resolver
            .revoke_target(guild.id, user, descriptor.permission, target)
            .await?;
        Ok(Reply::new(format!(
            "Removed the {target} scope of {} from <@{user}>.",
            descriptor.permission
        )))
    }

    /// `permission list` — every known permission with its summary.
    fn permission_list(&self) -> Reply {
        let mut text = String::from("Available permissions:\n");
        for descriptor in self.registry.iter() {
            text.push_str(&format!(
                "  {} — {} (default scope: {})\n",
                descriptor.permission, descriptor.summary, descriptor.default_targets
            ));
        }
        Reply::new(text)
    }

    /// `permission list-granted <user>` — the user's grant rows.
    async fn permission_list_granted(
        &self,
        invocation: &Invocation,
    ) -> Result<Reply, EmissaryError> {
        let guild = require_guild(invocation)?;
        let user = user_arg(&invocation.args, 2)?;

        let (global, local) = self.resolver.list_grants(guild.id, user).await?;
        if global.is_empty() && local.iter().all(|g| !g.is_granted) {
            return Ok(Reply::new(format!("<@{user}> has no permission grants.")));
        }

        let mut text = format!("Grants for <@{user}>:\n");
        for grant in &global {
            text.push_str(&format!(
                "  {} ({}) — everywhere\n",
                grant.permission, grant.targets
            ));
        }
        for grant in local.iter().filter(|g| g.is_granted) {
            text.push_str(&format!("  {} ({})\n", grant.permission, grant.targets));
        }
        Ok(Reply::new(text))
    }
}
