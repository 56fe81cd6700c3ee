//! Permission identifiers and target-scope flags.
//!
//! A grant pairs a [`Permission`] with a [`PermissionTarget`] bit set.  The
//! target scope says *whose* data the permission applies to: the grantee's
//! own (`SELF`), other people's (`OTHER`), or both (`ALL`).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Target scope
// ---------------------------------------------------------------------------

/// Bit-flag target scope of a permission grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PermissionTarget(u8);

impl PermissionTarget {
    pub const NONE: Self = Self(0);
    /// The grantee's own entities.
    pub const SELF: Self = Self(1 << 1);
    /// Entities owned by other users.
    pub const OTHER: Self = Self(1 << 2);
    /// Both scopes combined.
    pub const ALL: Self = Self(1 << 1 | 1 << 2);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Reconstruct from a stored integer, masking off any unknown bits.
    pub fn from_bits(raw: u8) -> Self {
        Self(raw & Self::ALL.0)
    }

    /// Whether a grant carrying these flags satisfies a request for
    /// `requested`.  Matching is a bitwise superset test: a grant for `ALL`
    /// satisfies either single scope, a grant for `SELF` alone never
    /// satisfies `OTHER`, and a request for `ALL` needs both bits granted.
    pub fn satisfies(self, requested: PermissionTarget) -> bool {
        !requested.is_empty() && self.0 & requested.0 == requested.0
    }

    pub fn union(self, other: PermissionTarget) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove `other`'s bits, keeping the rest.
    pub fn without(self, other: PermissionTarget) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a target-scope name as it appears in command arguments.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "self" => Some(Self::SELF),
            "other" => Some(Self::OTHER),
            "all" => Some(Self::ALL),
            _ => None,
        }
    }
}

impl std::fmt::Display for PermissionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            Self::SELF => "self",
            Self::OTHER => "other",
            Self::ALL => "all",
            _ => "none",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Permission identifiers
// ---------------------------------------------------------------------------

/// Every permission the bot knows about.
///
/// Stored by stable kebab-case name rather than discriminant so that
/// reordering this enum never corrupts persisted grants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Grant and revoke permissions for other users.
    ManagePermissions,
    /// Create new characters.
    CreateCharacter,
    /// Edit character details.
    EditCharacter,
    /// Delete characters.
    DeleteCharacter,
    /// Transfer character ownership.
    TransferCharacter,
    /// Start and stop roleplays.
    StartRoleplay,
    /// Administer roleplays: kick participants, stop, transfer, export.
    ManageRoleplays,
    /// Create, edit, and delete dossiers.
    ManageDossiers,
    /// Edit the server description, join message, and flags.
    EditServerInfo,
}

impl Permission {
    pub const ALL: &'static [Permission] = &[
        Permission::ManagePermissions,
        Permission::CreateCharacter,
        Permission::EditCharacter,
        Permission::DeleteCharacter,
        Permission::TransferCharacter,
        Permission::StartRoleplay,
        Permission::ManageRoleplays,
        Permission::ManageDossiers,
        Permission::EditServerInfo,
    ];

    /// Stable storage / command-argument name.
    pub fn name(self) -> &'static str {
        match self {
            Permission::ManagePermissions => "manage-permissions",
            Permission::CreateCharacter => "create-character",
            Permission::EditCharacter => "edit-character",
            Permission::DeleteCharacter => "delete-character",
            Permission::TransferCharacter => "transfer-character",
            Permission::StartRoleplay => "start-roleplay",
            Permission::ManageRoleplays => "manage-roleplays",
            Permission::ManageDossiers => "manage-dossiers",
            Permission::EditServerInfo => "edit-server-info",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_satisfies_either_single_scope() {
        assert!(PermissionTarget::ALL.satisfies(PermissionTarget::SELF));
        assert!(PermissionTarget::ALL.satisfies(PermissionTarget::OTHER));
    }

    #[test]
    fn self_does_not_satisfy_other() {
        assert!(!PermissionTarget::SELF.satisfies(PermissionTarget::OTHER));
        assert!(PermissionTarget::SELF.satisfies(PermissionTarget::SELF));
    }

    #[test]
    fn single_scope_does_not_satisfy_a_request_for_both() {
        assert!(!PermissionTarget::SELF.satisfies(PermissionTarget::ALL));
        assert!(!PermissionTarget::OTHER.satisfies(PermissionTarget::ALL));
        assert!(PermissionTarget::ALL.satisfies(PermissionTarget::ALL));
    }

    #[test]
    fn without_removes_only_requested_bits() {
        let remaining = PermissionTarget::ALL.without(PermissionTarget::OTHER);
        assert_eq!(remaining, PermissionTarget::SELF);
        assert!(PermissionTarget::SELF.without(PermissionTarget::SELF).is_empty());
    }

    #[test]
    fn from_bits_masks_garbage() {
        assert_eq!(PermissionTarget::from_bits(0xFF), PermissionTarget::ALL);
    }

    #[test]
    fn name_round_trip() {
        for p in Permission::ALL {
            assert_eq!(Permission::from_name(p.name()), Some(*p));
        }
    }
}
