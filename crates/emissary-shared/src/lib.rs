//! # emissary-shared
//!
//! Building blocks shared by every Emissary crate: snowflake identifiers,
//! the error taxonomy, permission identifiers and target-scope flags, the
//! startup-time permission/command registries, and entity-name validation.

pub mod error;
pub mod naming;
pub mod permissions;
pub mod registry;
pub mod types;

pub use error::EmissaryError;
pub use permissions::{Permission, PermissionTarget};
pub use registry::{CommandRegistry, PermissionRegistry};
pub use types::Snowflake;
