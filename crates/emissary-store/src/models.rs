//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to embed/export layers.

use chrono::{DateTime, Utc};
use emissary_shared::{Permission, PermissionTarget, Snowflake};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// User (core plugin)
// ---------------------------------------------------------------------------

/// A Discord account mirrored locally.  At most one row per snowflake;
/// created lazily on first interaction and never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Discord snowflake of the account.
    pub id: Snowflake,
    /// Optional free-text biography.
    pub bio: Option<String>,
    /// Optional UTC-offset timezone, in hours.
    pub timezone_offset: Option<i32>,
    /// When this user was first seen locally.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Server (core plugin)
// ---------------------------------------------------------------------------

/// A Discord guild mirrored locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    /// Discord snowflake of the guild.
    pub id: Snowflake,
    /// Snowflake of the guild owner, recorded at registration.
    pub owner_id: Snowflake,
    /// Free-text server description.
    pub description: Option<String>,
    /// Message sent to users when they join.
    pub join_message: Option<String>,
    /// Whether NSFW content is allowed on this server.
    pub is_nsfw: bool,
    /// Whether the join message is sent at all.
    pub send_join_message: bool,
    /// When this server was first seen locally.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Permission grants (permissions plugin)
// ---------------------------------------------------------------------------

/// A server-scoped permission grant.  At most one row per
/// (server, user, permission); superseded grants update in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalPermissionGrant {
    pub server_id: Snowflake,
    pub user_id: Snowflake,
    pub permission: Permission,
    pub targets: PermissionTarget,
    pub is_granted: bool,
}

/// A grant that applies across all servers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalPermissionGrant {
    pub user_id: Snowflake,
    pub permission: Permission,
    pub targets: PermissionTarget,
    pub is_granted: bool,
}

// ---------------------------------------------------------------------------
// Character (characters plugin)
// ---------------------------------------------------------------------------

/// A roleplay character.  Names are unique per owner, case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Character {
    pub id: Uuid,
    /// Snowflake of the current owner.
    pub owner_id: Snowflake,
    /// Server the character was created on.
    pub server_id: Snowflake,
    pub name: String,
    /// Nickname applied when the character is assumed.
    pub nickname: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub is_nsfw: bool,
    /// Whether this is the owner's default character on the server.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Roleplay (roleplays plugin)
// ---------------------------------------------------------------------------

/// A logged roleplay session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roleplay {
    pub id: Uuid,
    /// Snowflake of the current owner.
    pub owner_id: Snowflake,
    pub server_id: Snowflake,
    pub name: String,
    pub summary: Option<String>,
    /// Whether messages are currently being logged.
    pub is_active: bool,
    /// Public roleplays can be joined without an invite.
    pub is_public: bool,
    /// Channel the active roleplay is bound to, if any.
    pub dedicated_channel: Option<Snowflake>,
    /// Last time a message was logged; drives the expiry sweep.
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Participation state of a user in a roleplay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParticipantStatus {
    /// Invited but not yet joined.
    Invited,
    /// Actively participating.
    Joined,
    /// Left of their own accord.
    Left,
    /// Removed by the owner; may not rejoin without a new invite.
    Kicked,
}

impl ParticipantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantStatus::Invited => "invited",
            ParticipantStatus::Joined => "joined",
            ParticipantStatus::Left => "left",
            ParticipantStatus::Kicked => "kicked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "invited" => Some(ParticipantStatus::Invited),
            "joined" => Some(ParticipantStatus::Joined),
            "left" => Some(ParticipantStatus::Left),
            "kicked" => Some(ParticipantStatus::Kicked),
            _ => None,
        }
    }
}

/// A user's membership row in a roleplay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleplayParticipant {
    pub roleplay_id: Uuid,
    pub user_id: Snowflake,
    pub status: ParticipantStatus,
}

/// A single logged roleplay message.  Keyed by the Discord message
/// snowflake so that message edits upsert instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleplayMessage {
    /// Discord snowflake of the source message.
    pub id: Snowflake,
    pub roleplay_id: Uuid,
    pub author_id: Snowflake,
    /// Display name of the author at the time of logging.
    pub author_nickname: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Dossier (dossiers plugin)
// ---------------------------------------------------------------------------

/// A titled document record.  Titles are unique case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dossier {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    /// Path of the stored document body on disk, once uploaded.
    pub body_path: Option<String>,
    pub created_at: DateTime<Utc>,
}
