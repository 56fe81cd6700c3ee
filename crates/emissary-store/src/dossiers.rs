//! CRUD operations for [`Dossier`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Dossier;

impl Database {
    /// Insert a new dossier.  Fails with [`StoreError::Duplicate`] when the
    /// title is already taken (case-insensitive).
    pub fn create_dossier(&self, dossier: &Dossier) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO dos_dossiers (id, title, summary, body_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    dossier.id.to_string(),
                    dossier.title,
                    dossier.summary,
                    dossier.body_path,
                    dossier.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "dossier title already in use"))?;
        Ok(())
    }

    /// Fetch a dossier by title (case-insensitive).
    pub fn get_dossier_by_title(&self, title: &str) -> Result<Dossier> {
        self.conn()
            .query_row(
                "SELECT id, title, summary, body_path, created_at
                 FROM dos_dossiers
                 WHERE title = ?1",
                params![title],
                row_to_dossier,
            )
            .map_err(StoreError::from)
    }

    /// List all dossiers, ordered by title.
    pub fn list_dossiers(&self) -> Result<Vec<Dossier>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, summary, body_path, created_at
             FROM dos_dossiers
             ORDER BY title ASC",
        )?;
        let rows = stmt.query_map([], row_to_dossier)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Persist the mutable details of a dossier.  A title rename that
    /// collides maps to [`StoreError::Duplicate`].
    pub fn update_dossier(&self, dossier: &Dossier) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                "UPDATE dos_dossiers
                 SET title = ?2, summary = ?3, body_path = ?4
                 WHERE id = ?1",
                params![
                    dossier.id.to_string(),
                    dossier.title,
                    dossier.summary,
                    dossier.body_path,
                ],
            )
            .map_err(|e| StoreError::on_conflict(e, "dossier title already in use"))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete a dossier by row id.  Returns `true` if a row was deleted.
    pub fn delete_dossier(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM dos_dossiers WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

/// Map a `rusqlite::Row` to a [`Dossier`].
fn row_to_dossier(row: &rusqlite::Row<'_>) -> rusqlite::Result<Dossier> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_str: String = row.get(4)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Dossier {
        id,
        title: row.get(1)?,
        summary: row.get(2)?,
        body_path: row.get(3)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_dossier(title: &str) -> Dossier {
        Dossier {
            id: Uuid::new_v4(),
            title: title.to_string(),
            summary: None,
            body_path: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn title_lookup_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.create_dossier(&fresh_dossier("Operation Sunrise")).unwrap();

        let fetched = db.get_dossier_by_title("operation sunrise").unwrap();
        assert_eq!(fetched.title, "Operation Sunrise");
    }

    #[test]
    fn duplicate_title_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_dossier(&fresh_dossier("Operation Sunrise")).unwrap();

        assert!(matches!(
            db.create_dossier(&fresh_dossier("OPERATION SUNRISE"))
                .unwrap_err(),
            StoreError::Duplicate(_)
        ));
    }

    #[test]
    fn rename_collision_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_dossier(&fresh_dossier("First")).unwrap();
        let mut second = fresh_dossier("Second");
        db.create_dossier(&second).unwrap();

        second.title = "first".to_string();
        assert!(matches!(
            db.update_dossier(&second).unwrap_err(),
            StoreError::Duplicate(_)
        ));
    }

    #[test]
    fn list_is_title_ordered() {
        let db = Database::open_in_memory().unwrap();
        db.create_dossier(&fresh_dossier("Zeta")).unwrap();
        db.create_dossier(&fresh_dossier("Alpha")).unwrap();

        let titles: Vec<_> = db
            .list_dossiers()
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["Alpha", "Zeta"]);
    }
}
