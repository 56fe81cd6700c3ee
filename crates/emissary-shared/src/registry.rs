//! Startup-time registries.
//!
//! Both registries are built once during boot and passed by reference to
//! whatever needs them.  Nothing here is discovered at runtime; the set of
//! permissions and the set of command names are fixed when the binary
//! starts.

use std::collections::{HashMap, HashSet};

use crate::error::EmissaryError;
use crate::naming;
use crate::permissions::{Permission, PermissionTarget};

// ---------------------------------------------------------------------------
// Permission registry
// ---------------------------------------------------------------------------

/// Human-facing description of a permission.
#[derive(Debug, Clone)]
pub struct PermissionDescriptor {
    pub permission: Permission,
    /// One-line summary shown by `permission list`.
    pub summary: &'static str,
    /// Target flags applied when a grant doesn't name a scope explicitly.
    pub default_targets: PermissionTarget,
}

/// Mapping from permission name to descriptor.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    descriptors: HashMap<&'static str, PermissionDescriptor>,
}

impl PermissionRegistry {
    /// Build the registry of built-in permissions.
    pub fn builtin() -> Self {
        let mut descriptors = HashMap::new();

        let mut register = |permission: Permission,
                            summary: &'static str,
                            default_targets: PermissionTarget| {
            descriptors.insert(
                permission.name(),
                PermissionDescriptor {
                    permission,
                    summary,
                    default_targets,
                },
            );
        };

        register(
            Permission::ManagePermissions,
            "Grant and revoke permissions for other users.",
            PermissionTarget::OTHER,
        );
        register(
            Permission::CreateCharacter,
            "Create new characters.",
            PermissionTarget::SELF,
        );
        register(
            Permission::EditCharacter,
            "Edit character details.",
            PermissionTarget::SELF,
        );
        register(
            Permission::DeleteCharacter,
            "Delete characters.",
            PermissionTarget::SELF,
        );
        register(
            Permission::TransferCharacter,
            "Transfer character ownership.",
            PermissionTarget::SELF,
        );
        register(
            Permission::StartRoleplay,
            "Start and stop roleplays.",
            PermissionTarget::SELF,
        );
        register(
            Permission::ManageRoleplays,
            "Administer roleplays owned by anyone.",
            PermissionTarget::OTHER,
        );
        register(
            Permission::ManageDossiers,
            "Create, edit, and delete dossiers.",
            PermissionTarget::ALL,
        );
        register(
            Permission::EditServerInfo,
            "Edit the server description, join message, and flags.",
            PermissionTarget::ALL,
        );

        Self { descriptors }
    }

    pub fn get(&self, name: &str) -> Option<&PermissionDescriptor> {
        self.descriptors.get(name)
    }

    pub fn descriptor_of(&self, permission: Permission) -> Option<&PermissionDescriptor> {
        self.descriptors.get(permission.name())
    }

    /// Resolve a permission by its command-argument name.  On a miss, the
    /// error carries a "did you mean" suggestion when a close match exists.
    pub fn resolve(&self, name: &str) -> Result<&PermissionDescriptor, EmissaryError> {
        if let Some(descriptor) = self.descriptors.get(name.trim()) {
            return Ok(descriptor);
        }

        let message = match naming::closest_match(name, self.descriptors.keys().copied()) {
            Some(suggestion) => {
                format!("There's no permission named \"{name}\". Did you mean \"{suggestion}\"?")
            }
            None => format!("There's no permission named \"{name}\"."),
        };
        Err(EmissaryError::NotFound(message))
    }

    /// Iterate descriptors in stable name order.
    pub fn iter(&self) -> impl Iterator<Item = &PermissionDescriptor> {
        let mut names: Vec<_> = self.descriptors.keys().copied().collect();
        names.sort_unstable();
        names.into_iter().map(|n| &self.descriptors[n])
    }
}

// ---------------------------------------------------------------------------
// Command registry
// ---------------------------------------------------------------------------

/// Reserved command/alias names per command group, consulted by entity-name
/// validation so an entity can never shadow a command.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    groups: HashMap<String, HashSet<String>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register command names (including aliases) under a group.
    pub fn register<I, S>(&mut self, group: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.groups.entry(group.to_string()).or_default();
        for name in names {
            entry.insert(name.into().to_lowercase());
        }
    }

    /// Whether `name` collides with a command or alias in `group`.
    pub fn is_reserved(&self, group: &str, name: &str) -> bool {
        self.groups
            .get(group)
            .map(|names| names.contains(&name.to_lowercase()))
            .unwrap_or(false)
    }

    pub fn reserved_in(&self, group: &str) -> Option<&HashSet<String>> {
        self.groups.get(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_permission() {
        let registry = PermissionRegistry::builtin();
        for p in Permission::ALL {
            assert!(registry.descriptor_of(*p).is_some(), "missing {p}");
        }
    }

    #[test]
    fn resolve_suggests_close_matches() {
        let registry = PermissionRegistry::builtin();
        let err = registry.resolve("manage-permission").unwrap_err();
        assert!(err.to_string().contains("manage-permissions"));
    }

    #[test]
    fn resolve_known_name() {
        let registry = PermissionRegistry::builtin();
        let descriptor = registry.resolve("manage-permissions").unwrap();
        assert_eq!(descriptor.permission, Permission::ManagePermissions);
    }

    #[test]
    fn command_names_are_case_insensitive() {
        let mut registry = CommandRegistry::new();
        registry.register("character", ["Show"]);
        assert!(registry.is_reserved("character", "show"));
        assert!(!registry.is_reserved("roleplay", "show"));
    }
}
