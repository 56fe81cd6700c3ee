//! Per-feature services.
//!
//! Each service gates its mutations on ownership and permission checks
//! before touching the store.  The command dispatcher is the only caller.

pub mod characters;
pub mod dossiers;
pub mod profiles;
pub mod roleplays;

pub use characters::CharacterService;
pub use dossiers::DossierService;
pub use profiles::ProfileService;
pub use roleplays::RoleplayService;
