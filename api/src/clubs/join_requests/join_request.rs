use std::{fmt, str::FromStr};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    clubs::memberships::Membership,
    error::{AppError, AppResult},
};

pub(crate) const JOIN_REQUEST_COLUMNS: &str =
    "id, user_id, club_id, status, requested_at, responded_at, comment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Refused,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Refused => "REFUSED",
        })
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RequestStatus::Pending),
            "APPROVED" => Ok(RequestStatus::Approved),
            "REFUSED" => Ok(RequestStatus::Refused),
            _ => Err(AppError::bad_request(format!("unknown request status: {s}"))),
        }
    }
}

/// A user's application to join a club.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: i64,
    pub user_id: i64,
    pub club_id: i64,
    pub status: RequestStatus,
    pub requested_at: NaiveDateTime,
    pub responded_at: Option<NaiveDateTime>,
    pub comment: Option<String>,
}

fn append_rejection_reason(comment: Option<&str>, reason: &str) -> String {
    match comment {
        Some(comment) if !comment.is_empty() => {
            format!("{comment}\nRejection reason: {reason}")
        }
        _ => format!("Rejection reason: {reason}"),
    }
}

impl JoinRequest {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {JOIN_REQUEST_COLUMNS} FROM join_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(request)
    }

    pub async fn require(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::not_found("Join request not found"))
    }

    /// Most recent request of the pair, whatever its status.
    pub async fn latest(
        user_id: i64,
        club_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<Option<Self>> {
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {JOIN_REQUEST_COLUMNS} FROM join_requests
             WHERE user_id = ? AND club_id = ?
             ORDER BY requested_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(club_id)
        .fetch_optional(db)
        .await?;

        Ok(request)
    }

    pub async fn has_pending(
        user_id: i64,
        club_id: i64,
        db: &mut SqliteConnection,
    ) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM join_requests WHERE user_id = ? AND club_id = ? AND status = ?",
        )
        .bind(user_id)
        .bind(club_id)
        .bind(RequestStatus::Pending)
        .fetch_one(db)
        .await?;

        Ok(count > 0)
    }

    pub async fn list_for_club(
        club_id: i64,
        status: Option<RequestStatus>,
        db: &mut SqliteConnection,
    ) -> AppResult<Vec<Self>> {
        let mut query = sqlx::QueryBuilder::new(format!(
            "SELECT {JOIN_REQUEST_COLUMNS} FROM join_requests WHERE club_id = "
        ));
        query.push_bind(club_id);
        if let Some(status) = status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        query.push(" ORDER BY requested_at DESC, id DESC");

        Ok(query.build_query_as::<JoinRequest>().fetch_all(db).await?)
    }

    pub async fn list_for_user(
        user_id: i64,
        status: Option<RequestStatus>,
        db: &mut SqliteConnection,
    ) -> AppResult<Vec<Self>> {
        let mut query = sqlx::QueryBuilder::new(format!(
            "SELECT {JOIN_REQUEST_COLUMNS} FROM join_requests WHERE user_id = "
        ));
        query.push_bind(user_id);
        if let Some(status) = status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        query.push(" ORDER BY requested_at DESC, id DESC");

        Ok(query.build_query_as::<JoinRequest>().fetch_all(db).await?)
    }

    pub async fn list_by_status(
        status: RequestStatus,
        db: &mut SqliteConnection,
    ) -> AppResult<Vec<Self>> {
        let requests = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {JOIN_REQUEST_COLUMNS} FROM join_requests WHERE status = ? ORDER BY id"
        ))
        .bind(status)
        .fetch_all(db)
        .await?;

        Ok(requests)
    }

    /// Opens a PENDING request. Active members and users with an open
    /// request for the club are turned away with `Conflict`.
    pub async fn create(
        user_id: i64,
        club_id: i64,
        comment: Option<String>,
        db: &mut SqliteConnection,
    ) -> AppResult<Self> {
        if Membership::is_member(user_id, club_id, &mut *db).await? {
            return Err(AppError::conflict("User is already a member of this club"));
        }
        if Self::has_pending(user_id, club_id, &mut *db).await? {
            return Err(AppError::conflict(
                "User already has a pending request for this club",
            ));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO join_requests (user_id, club_id, status, requested_at, comment)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(club_id)
        .bind(RequestStatus::Pending)
        .bind(Utc::now().naive_utc())
        .bind(comment)
        .fetch_one(&mut *db)
        .await?;
        tracing::info!(user_id, club_id, request_id = id, "join request created");

        Self::require(id, db).await
    }

    // NotFound for unknown ids, InvalidState once the request was answered
    async fn require_pending(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        let request = Self::require(id, db).await?;
        if request.status != RequestStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "Join request is {}, not PENDING",
                request.status
            )));
        }
        Ok(request)
    }

    /// Accepts a pending request and makes the requester an active member.
    pub async fn approve(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        let request = Self::require_pending(id, &mut *db).await?;

        sqlx::query("UPDATE join_requests SET status = ?, responded_at = ? WHERE id = ?")
            .bind(RequestStatus::Approved)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&mut *db)
            .await?;
        Membership::add(request.user_id, request.club_id, &mut *db).await?;
        tracing::info!(
            request_id = id,
            user_id = request.user_id,
            club_id = request.club_id,
            "join request approved"
        );

        Self::require(id, db).await
    }

    pub async fn reject(id: i64, reason: &str, db: &mut SqliteConnection) -> AppResult<Self> {
        let request = Self::require_pending(id, &mut *db).await?;

        sqlx::query(
            "UPDATE join_requests SET status = ?, responded_at = ?, comment = ? WHERE id = ?",
        )
        .bind(RequestStatus::Refused)
        .bind(Utc::now().naive_utc())
        .bind(append_rejection_reason(request.comment.as_deref(), reason))
        .bind(id)
        .execute(&mut *db)
        .await?;
        tracing::info!(request_id = id, "join request refused");

        Self::require(id, db).await
    }

    /// Withdraws a pending request. Anything else is left alone and yields
    /// false.
    pub async fn cancel(id: i64, db: &mut SqliteConnection) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM join_requests WHERE id = ? AND status = ?")
            .bind(id)
            .bind(RequestStatus::Pending)
            .execute(db)
            .await?;

        let cancelled = result.rows_affected() > 0;
        if cancelled {
            tracing::info!(request_id = id, "join request cancelled");
        }
        Ok(cancelled)
    }
}
