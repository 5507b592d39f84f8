use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::AppResult,
    users::{apply_role_event, RoleEvent},
};

pub(crate) const PRESIDENT_TERM_COLUMNS: &str =
    "id, user_id, club_id, started_at, ended_at, is_current";

/// One stretch of a user leading a club.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PresidentTerm {
    pub id: i64,
    pub user_id: i64,
    pub club_id: i64,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub is_current: bool,
}

/// Outcome of handing a club over to a new president.
#[derive(Debug, Serialize, Deserialize)]
pub struct Succession {
    pub previous: Option<PresidentTerm>,
    pub current: PresidentTerm,
    pub replaced_previous: bool,
}

impl PresidentTerm {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let term = sqlx::query_as::<_, PresidentTerm>(&format!(
            "SELECT {PRESIDENT_TERM_COLUMNS} FROM president_terms WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(term)
    }

    pub async fn current(club_id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let term = sqlx::query_as::<_, PresidentTerm>(&format!(
            "SELECT {PRESIDENT_TERM_COLUMNS} FROM president_terms
             WHERE club_id = ? AND is_current = 1"
        ))
        .bind(club_id)
        .fetch_optional(db)
        .await?;

        Ok(term)
    }

    /// All terms of a club, newest first.
    pub async fn history(club_id: i64, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let terms = sqlx::query_as::<_, PresidentTerm>(&format!(
            "SELECT {PRESIDENT_TERM_COLUMNS} FROM president_terms
             WHERE club_id = ?
             ORDER BY started_at DESC, id DESC"
        ))
        .bind(club_id)
        .fetch_all(db)
        .await?;

        Ok(terms)
    }

    pub async fn current_for_user(user_id: i64, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let terms = sqlx::query_as::<_, PresidentTerm>(&format!(
            "SELECT {PRESIDENT_TERM_COLUMNS} FROM president_terms
             WHERE user_id = ? AND is_current = 1
             ORDER BY club_id"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;

        Ok(terms)
    }

    // Closes the club's current term at `ended_at` and hands back the closed
    // row, or None when the club had no president.
    async fn close_current(
        club_id: i64,
        ended_at: NaiveDateTime,
        db: &mut SqliteConnection,
    ) -> AppResult<Option<Self>> {
        let Some(term) = Self::current(club_id, &mut *db).await? else {
            return Ok(None);
        };

        sqlx::query("UPDATE president_terms SET is_current = 0, ended_at = ? WHERE id = ?")
            .bind(ended_at)
            .bind(term.id)
            .execute(&mut *db)
            .await?;
        tracing::info!(
            club_id,
            user_id = term.user_id,
            term_id = term.id,
            %ended_at,
            "president term closed"
        );
        apply_role_event(
            &mut *db,
            RoleEvent::LeadershipChanged {
                user_id: term.user_id,
            },
        )
        .await?;

        Ok(Some(PresidentTerm {
            ended_at: Some(ended_at),
            is_current: false,
            ..term
        }))
    }

    async fn open_term(
        user_id: i64,
        club_id: i64,
        started_at: NaiveDateTime,
        db: &mut SqliteConnection,
    ) -> AppResult<Self> {
        let other_clubs: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM president_terms WHERE user_id = ? AND club_id != ? AND is_current = 1",
        )
        .bind(user_id)
        .bind(club_id)
        .fetch_one(&mut *db)
        .await?;
        if other_clubs > 0 {
            tracing::warn!(
                user_id,
                club_id,
                other_clubs,
                "user already presides over another club"
            );
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO president_terms (user_id, club_id, started_at, is_current)
            VALUES (?, ?, ?, 1)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(club_id)
        .bind(started_at)
        .fetch_one(&mut *db)
        .await?;
        tracing::info!(user_id, club_id, term_id = id, "president appointed");

        apply_role_event(&mut *db, RoleEvent::LeadershipChanged { user_id }).await?;

        Self::from_id(id, db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("president term {id} vanished after insert").into())
    }

    async fn succeed(
        user_id: i64,
        club_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<Succession> {
        let now = Utc::now().naive_utc();
        let previous = Self::close_current(club_id, now, &mut *db).await?;
        let current = Self::open_term(user_id, club_id, now, db).await?;

        Ok(Succession {
            replaced_previous: previous.is_some(),
            previous,
            current,
        })
    }

    /// Makes `user_id` the current president of `club_id`, closing the
    /// outgoing term at the same instant the new one starts.
    pub async fn appoint(user_id: i64, club_id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Ok(Self::succeed(user_id, club_id, db).await?.current)
    }

    pub async fn change(
        club_id: i64,
        user_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<Succession> {
        Self::succeed(user_id, club_id, db).await
    }

    /// Leaves the club without a president. False when it had none.
    pub async fn remove(club_id: i64, db: &mut SqliteConnection) -> AppResult<bool> {
        let closed = Self::close_current(club_id, Utc::now().naive_utc(), db).await?;
        Ok(closed.is_some())
    }

    /// Like [`PresidentTerm::remove`] but with a caller-chosen end date,
    /// which may lie in the past.
    pub async fn end(
        club_id: i64,
        ended_at: NaiveDateTime,
        db: &mut SqliteConnection,
    ) -> AppResult<bool> {
        let closed = Self::close_current(club_id, ended_at, db).await?;
        Ok(closed.is_some())
    }
}
