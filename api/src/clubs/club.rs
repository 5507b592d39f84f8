use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::error::{AppError, AppResult};

pub(crate) const CLUB_COLUMNS: &str = "id, name, description, logo, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Club {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub logo: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Club {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let club = sqlx::query_as::<_, Club>(&format!(
            "SELECT {CLUB_COLUMNS} FROM clubs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(club)
    }

    pub async fn from_name(name: &str, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let club = sqlx::query_as::<_, Club>(&format!(
            "SELECT {CLUB_COLUMNS} FROM clubs WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(db)
        .await?;

        Ok(club)
    }

    pub async fn require(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::not_found("Club not found"))
    }

    pub async fn require_reference(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("club {id} does not exist")))
    }
}
