use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::error::{AppError, AppResult};

pub(crate) const ATTESTATION_COLUMNS: &str = "id, name, description, event_id";

/// Certificate issued for an event. Survives the event's deletion with its
/// `event_id` cleared.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attestation {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub event_id: Option<i64>,
}

impl Attestation {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let attestation = sqlx::query_as::<_, Attestation>(&format!(
            "SELECT {ATTESTATION_COLUMNS} FROM attestations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(attestation)
    }

    pub async fn require(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::not_found("Attestation not found"))
    }

    pub async fn for_event(event_id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let attestation = sqlx::query_as::<_, Attestation>(&format!(
            "SELECT {ATTESTATION_COLUMNS} FROM attestations WHERE event_id = ?"
        ))
        .bind(event_id)
        .fetch_optional(db)
        .await?;

        Ok(attestation)
    }

    /// Inserts an attestation, refusing a second one for the same event.
    pub async fn create(
        name: &str,
        description: &str,
        event_id: Option<i64>,
        db: &mut SqliteConnection,
    ) -> AppResult<Self> {
        if let Some(event_id) = event_id {
            if Self::for_event(event_id, &mut *db).await?.is_some() {
                return Err(AppError::conflict("Event already has an attestation"));
            }
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO attestations (name, description, event_id)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(event_id)
        .fetch_one(&mut *db)
        .await?;
        tracing::info!(attestation_id = id, ?event_id, "attestation created");

        Self::require(id, db).await
    }
}
