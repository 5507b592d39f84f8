use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    error::AppResult,
    users::{apply_role_event, RoleEvent},
};

pub(crate) const MEMBERSHIP_COLUMNS: &str = "id, user_id, club_id, joined_at, is_active";

/// The durable (user, club) record. One row per pair; leaving and rejoining
/// flips `is_active` instead of inserting again.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub club_id: i64,
    pub joined_at: NaiveDateTime,
    pub is_active: bool,
}

impl Membership {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(membership)
    }

    pub async fn find(
        user_id: i64,
        club_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<Option<Self>> {
        let membership = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ? AND club_id = ?"
        ))
        .bind(user_id)
        .bind(club_id)
        .fetch_optional(db)
        .await?;

        Ok(membership)
    }

    pub async fn is_member(user_id: i64, club_id: i64, db: &mut SqliteConnection) -> AppResult<bool> {
        Ok(Self::find(user_id, club_id, db)
            .await?
            .map_or(false, |m| m.is_active))
    }

    /// Counts every membership row of the club, inactive ones included.
    pub async fn count(club_id: i64, db: &mut SqliteConnection) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE club_id = ?")
            .bind(club_id)
            .fetch_one(db)
            .await?;

        Ok(count)
    }

    pub async fn count_active(club_id: i64, db: &mut SqliteConnection) -> AppResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM memberships WHERE club_id = ? AND is_active = 1",
        )
        .bind(club_id)
        .fetch_one(db)
        .await?;

        Ok(count)
    }

    pub async fn list_for_club(
        club_id: i64,
        active_only: bool,
        db: &mut SqliteConnection,
    ) -> AppResult<Vec<Self>> {
        let memberships = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE club_id = ? AND (is_active = 1 OR ? = 0)
             ORDER BY id"
        ))
        .bind(club_id)
        .bind(active_only)
        .fetch_all(db)
        .await?;

        Ok(memberships)
    }

    pub async fn list_for_user(
        user_id: i64,
        active_only: bool,
        db: &mut SqliteConnection,
    ) -> AppResult<Vec<Self>> {
        let memberships = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE user_id = ? AND (is_active = 1 OR ? = 0)
             ORDER BY id"
        ))
        .bind(user_id)
        .bind(active_only)
        .fetch_all(db)
        .await?;

        Ok(memberships)
    }

    /// Makes `user_id` an active member of `club_id`.
    ///
    /// Reactivates an inactive row, returns an active one untouched, or
    /// inserts a new row.
    pub async fn add(user_id: i64, club_id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        let membership = match Self::find(user_id, club_id, &mut *db).await? {
            Some(existing) if existing.is_active => return Ok(existing),
            Some(existing) => {
                Self::set_active(existing.id, true, &mut *db).await?;
                tracing::info!(user_id, club_id, "membership reactivated");
                Membership {
                    is_active: true,
                    ..existing
                }
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO memberships (user_id, club_id, joined_at, is_active)
                    VALUES (?, ?, ?, 1)
                    RETURNING id
                    "#,
                )
                .bind(user_id)
                .bind(club_id)
                .bind(Utc::now().naive_utc())
                .fetch_one(&mut *db)
                .await?;
                tracing::info!(user_id, club_id, membership_id = id, "membership created");

                Self::from_id(id, &mut *db)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("membership {id} vanished after insert"))?
            }
        };

        apply_role_event(db, RoleEvent::MembershipChanged { user_id }).await?;
        Ok(membership)
    }

    /// Deletes the (user, club) row. Returns false when there was none.
    pub async fn remove(user_id: i64, club_id: i64, db: &mut SqliteConnection) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM memberships WHERE user_id = ? AND club_id = ?")
            .bind(user_id)
            .bind(club_id)
            .execute(&mut *db)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        tracing::info!(user_id, club_id, "membership removed");
        apply_role_event(db, RoleEvent::MembershipChanged { user_id }).await?;
        Ok(true)
    }

    pub async fn deactivate(
        user_id: i64,
        club_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<bool> {
        Self::toggle(user_id, club_id, false, db).await
    }

    pub async fn reactivate(
        user_id: i64,
        club_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<bool> {
        Self::toggle(user_id, club_id, true, db).await
    }

    // false when the row is missing or already in the target state
    async fn toggle(
        user_id: i64,
        club_id: i64,
        active: bool,
        db: &mut SqliteConnection,
    ) -> AppResult<bool> {
        let Some(membership) = Self::find(user_id, club_id, &mut *db).await? else {
            return Ok(false);
        };
        if membership.is_active == active {
            return Ok(false);
        }

        Self::set_active(membership.id, active, &mut *db).await?;
        tracing::info!(user_id, club_id, active, "membership toggled");
        apply_role_event(db, RoleEvent::MembershipChanged { user_id }).await?;
        Ok(true)
    }

    async fn set_active(id: i64, active: bool, db: &mut SqliteConnection) -> AppResult<()> {
        sqlx::query("UPDATE memberships SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
