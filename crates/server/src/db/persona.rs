//! Persona settings repository.
//!
//! The settings table holds at most one record. Create fails when a record
//! exists; update fails when none does. The chat surface never reads this
//! directly - it goes through the persona service, which supplies a default.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shoptalk_core::PersonaSettingsId;

use crate::models::{PersonaInput, PersonaSettings};

use super::{RepositoryError, parse_timestamp};

/// Repository for the singleton persona settings record.
#[derive(Clone)]
pub struct PersonaRepository {
    pool: SqlitePool,
}

impl PersonaRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the settings record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` on storage failure.
    pub async fn get(&self) -> Result<Option<PersonaSettings>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, personality, messaging, updated_at
             FROM persona_settings LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_settings).transpose()
    }

    /// Create the settings record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a record already exists.
    pub async fn create(&self, input: &PersonaInput) -> Result<PersonaSettings, RepositoryError> {
        if self.get().await?.is_some() {
            return Err(RepositoryError::Conflict(
                "persona settings already exist".to_string(),
            ));
        }

        let settings = PersonaSettings {
            id: PersonaSettingsId::generate(),
            name: input.name.clone(),
            description: input.description.clone(),
            personality: input.personality.clone(),
            messaging: input.messaging.clone(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO persona_settings (id, name, description, personality, messaging, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(settings.id.to_string())
        .bind(&settings.name)
        .bind(&settings.description)
        .bind(&settings.personality)
        .bind(&settings.messaging)
        .bind(settings.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Replace the settings record's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no record exists yet.
    pub async fn update(&self, input: &PersonaInput) -> Result<PersonaSettings, RepositoryError> {
        let current = self.get().await?.ok_or(RepositoryError::NotFound)?;
        let updated_at = Utc::now();

        let result = sqlx::query(
            "UPDATE persona_settings
             SET name = ?2, description = ?3, personality = ?4, messaging = ?5, updated_at = ?6
             WHERE id = ?1",
        )
        .bind(current.id.to_string())
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.personality)
        .bind(&input.messaging)
        .bind(updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(PersonaSettings {
            id: current.id,
            name: input.name.clone(),
            description: input.description.clone(),
            personality: input.personality.clone(),
            messaging: input.messaging.clone(),
            updated_at,
        })
    }
}

/// Map a settings row into the domain model.
fn row_to_settings(row: &SqliteRow) -> Result<PersonaSettings, RepositoryError> {
    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<PersonaSettingsId>()
        .map_err(|e| RepositoryError::DataCorruption(format!("settings id {id_str:?}: {e}")))?;

    let updated_at_str: String = row.try_get("updated_at")?;

    Ok(PersonaSettings {
        id,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        personality: row.try_get("personality")?,
        messaging: row.try_get("messaging")?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}
