use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::Role;
use crate::error::{AppError, AppResult};

pub(crate) const USER_COLUMNS: &str = r#"
    id, first_name, last_name, email, password_hash, role, avatar,
    created_at, updated_at
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(user)
    }

    pub async fn from_email(email: &str, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;

        Ok(user)
    }

    /// Loads the user or fails with `NotFound`.
    pub async fn require(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Loads a user referenced from a request body; a dangling id is the
    /// caller's mistake, so it fails with `BadRequest`.
    pub async fn require_reference(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("user {id} does not exist")))
    }
}
