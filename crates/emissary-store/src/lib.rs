//! # emissary-store
//!
//! Local storage for the Emissary bot, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model.  Tables are grouped per feature plugin by name prefix (`core_`,
//! `perm_`, `chr_`, `rp_`, `dos_`); each plugin's schema arrives in its own
//! migration and only the core identity tables (`core_users`,
//! `core_servers`) are referenced across plugin boundaries.

pub mod characters;
pub mod database;
pub mod dossiers;
pub mod migrations;
pub mod models;
pub mod permissions;
pub mod roleplays;
pub mod servers;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
