//! Shared server dossiers.
//!
//! Dossiers aren't owned by anyone; every mutation is gated on the
//! `manage-dossiers` permission instead.  Reading is open to all.

use std::sync::Arc;

use chrono::Utc;
use emissary_shared::{
    naming, CommandRegistry, EmissaryError, Permission, PermissionTarget, Snowflake,
};
use emissary_store::{Database, Dossier, StoreError};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::errors::store_error;
use crate::identity::GuildProfile;
use crate::permissions::PermissionResolver;

/// Command group whose verb names dossier titles may not collide with.
const NAME_GROUP: &str = "dossier";

#[derive(Clone)]
pub struct DossierService {
    db: Arc<Mutex<Database>>,
    resolver: PermissionResolver,
    commands: Arc<CommandRegistry>,
}

impl DossierService {
    pub fn new(
        db: Arc<Mutex<Database>>,
        resolver: PermissionResolver,
        commands: Arc<CommandRegistry>,
    ) -> Self {
        Self {
            db,
            resolver,
            commands,
        }
    }

    async fn authorize(
        &self,
        actor: Snowflake,
        guild: Option<&GuildProfile>,
    ) -> Result<(), EmissaryError> {
        self.resolver
            .check_in_context(actor, guild, Permission::ManageDossiers, PermissionTarget::ALL)
            .await
    }

    pub async fn create(
        &self,
        actor: Snowflake,
        guild: Option<&GuildProfile>,
        title: &str,
        summary: Option<&str>,
    ) -> Result<Dossier, EmissaryError> {
        self.authorize(actor, guild).await?;

        let title = title.trim();
        naming::validate_entity_name(title, &self.commands, NAME_GROUP)?;

        let dossier = Dossier {
            id: Uuid::new_v4(),
            title: title.to_string(),
            summary: summary.map(str::to_string),
            body_path: None,
            created_at: Utc::now(),
        };

        let db = self.db.lock().await;
        match db.create_dossier(&dossier) {
            Ok(()) => {
                info!(title = %dossier.title, "dossier created");
                Ok(dossier)
            }
            Err(StoreError::Duplicate(_)) => Err(EmissaryError::DuplicateEntity(format!(
                "There's already a dossier titled \"{title}\"."
            ))),
            Err(e) => Err(store_error(e, "the dossier")),
        }
    }

    /// Look up a dossier by title, with a did-you-mean suggestion on a miss.
    pub async fn view(&self, title: &str) -> Result<Dossier, EmissaryError> {
        let db = self.db.lock().await;
        match db.get_dossier_by_title(title) {
            Ok(dossier) => Ok(dossier),
            Err(StoreError::NotFound) => {
                let all = db.list_dossiers().map_err(|e| store_error(e, "dossiers"))?;
                let message =
                    match naming::closest_match(title, all.iter().map(|d| d.title.as_str())) {
                        Some(suggestion) => format!(
                            "There's no dossier titled \"{title}\". Did you mean \"{suggestion}\"?"
                        ),
                        None => format!("There's no dossier titled \"{title}\"."),
                    };
                Err(EmissaryError::NotFound(message))
            }
            Err(e) => Err(store_error(e, "the dossier")),
        }
    }

    pub async fn list(&self) -> Result<Vec<Dossier>, EmissaryError> {
        let db = self.db.lock().await;
        db.list_dossiers().map_err(|e| store_error(e, "dossiers"))
    }

    pub async fn set_summary(
        &self,
        actor: Snowflake,
        guild: Option<&GuildProfile>,
        title: &str,
        summary: Option<&str>,
    ) -> Result<(), EmissaryError> {
        self.authorize(actor, guild).await?;
        let mut dossier = self.view(title).await?;
        dossier.summary = summary.map(str::to_string);

        let db = self.db.lock().await;
        db.update_dossier(&dossier)
            .map_err(|e| store_error(e, "the dossier"))
    }

    pub async fn rename(
        &self,
        actor: Snowflake,
        guild: Option<&GuildProfile>,
        title: &str,
        new_title: &str,
    ) -> Result<(), EmissaryError> {
        self.authorize(actor, guild).await?;

        let new_title = new_title.trim();
        naming::validate_entity_name(new_title, &self.commands, NAME_GROUP)?;

        let mut dossier = self.view(title).await?;
        dossier.title = new_title.to_string();

        let db = self.db.lock().await;
        match db.update_dossier(&dossier) {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(_)) => Err(EmissaryError::DuplicateEntity(format!(
                "There's already a dossier titled \"{new_title}\"."
            ))),
            Err(e) => Err(store_error(e, "the dossier")),
        }
    }

    /// Record where a dossier's uploaded body document lives on disk.
    pub async fn attach_body(
        &self,
        actor: Snowflake,
        guild: Option<&GuildProfile>,
        title: &str,
        body_path: &str,
    ) -> Result<(), EmissaryError> {
        self.authorize(actor, guild).await?;
        let mut dossier = self.view(title).await?;
        dossier.body_path = Some(body_path.to_string());

        let db = self.db.lock().await;
        db.update_dossier(&dossier)
            .map_err(|e| store_error(e, "the dossier"))
    }

    pub async fn delete(
        &self,
        actor: Snowflake,
        guild: Option<&GuildProfile>,
        title: &str,
    ) -> Result<(), EmissaryError> {
        self.authorize(actor, guild).await?;
        let dossier = self.view(title).await?;

        let db = self.db.lock().await;
        let deleted = db
            .delete_dossier(dossier.id)
            .map_err(|e| store_error(e, "the dossier"))?;
        if !deleted {
            return Err(EmissaryError::NotFound(format!(
                "There's no dossier titled \"{title}\"."
            )));
        }
        info!(title = %dossier.title, "dossier deleted");
        Ok(())
    }
}
