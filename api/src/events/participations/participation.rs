use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::error::{AppError, AppResult};

pub(crate) const PARTICIPATION_COLUMNS: &str = "id, user_id, event_id, date";

/// A user's attendance at an event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Participation {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub date: NaiveDate,
}

impl Participation {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let participation = sqlx::query_as::<_, Participation>(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(participation)
    }

    pub async fn require(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::not_found("Participation not found"))
    }

    pub async fn find(
        user_id: i64,
        event_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<Option<Self>> {
        let participation = sqlx::query_as::<_, Participation>(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE user_id = ? AND event_id = ?"
        ))
        .bind(user_id)
        .bind(event_id)
        .fetch_optional(db)
        .await?;

        Ok(participation)
    }

    pub async fn list_for_user(user_id: i64, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let participations = sqlx::query_as::<_, Participation>(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE user_id = ? ORDER BY date, id"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;

        Ok(participations)
    }

    pub async fn list_for_event(event_id: i64, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let participations = sqlx::query_as::<_, Participation>(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE event_id = ? ORDER BY id"
        ))
        .bind(event_id)
        .fetch_all(db)
        .await?;

        Ok(participations)
    }

    /// Records attendance. Conflict when the user is already registered
    /// for the event.
    pub async fn create(
        user_id: i64,
        event_id: i64,
        date: NaiveDate,
        db: &mut SqliteConnection,
    ) -> AppResult<Self> {
        if Self::find(user_id, event_id, &mut *db).await?.is_some() {
            return Err(AppError::conflict(
                "User already participates in this event",
            ));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO participations (user_id, event_id, date)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .bind(date)
        .fetch_one(&mut *db)
        .await?;
        tracing::info!(user_id, event_id, participation_id = id, "participation recorded");

        Self::require(id, db).await
    }
}
