mod join_request;

pub use join_request::*;

use crate::clubs::Club;
use crate::error::{AppError, AppResult};
use crate::users::User;
use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateJoinRequestParams {
    pub user_id: i64,
    pub club_id: i64,
    pub comment: Option<String>,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn create_join_request(
    State(state): State<AppState>,
    Json(params): Json<CreateJoinRequestParams>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    User::require_reference(params.user_id, &mut tx).await?;
    Club::require_reference(params.club_id, &mut tx).await?;

    let request =
        JoinRequest::create(params.user_id, params.club_id, params.comment, &mut tx).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(request)))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn approve_join_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<JoinRequest>> {
    let mut tx = state.db.begin().await?;
    let request = JoinRequest::approve(id, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(request))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RejectParams {
    pub reason: String,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn reject_join_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(RejectParams { reason }): Json<RejectParams>,
) -> AppResult<Json<JoinRequest>> {
    let mut tx = state.db.begin().await?;
    let request = JoinRequest::reject(id, &reason, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(request))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn cancel_join_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.acquire().await?;
    if !JoinRequest::cancel(id, &mut conn).await? {
        return Err(AppError::invalid_state(
            "Join request not found or no longer pending",
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_join_requests(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    let requests = sqlx::query_as::<_, JoinRequest>(&format!(
        "SELECT {JOIN_REQUEST_COLUMNS} FROM join_requests ORDER BY id"
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(requests))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_join_request_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<JoinRequest>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(JoinRequest::require(id, &mut conn).await?))
}

async fn club_requests(
    state: &AppState,
    club_id: i64,
    status: Option<RequestStatus>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    let mut conn = state.db.acquire().await?;
    Club::require(club_id, &mut conn).await?;
    Ok(Json(
        JoinRequest::list_for_club(club_id, status, &mut conn).await?,
    ))
}

async fn user_requests(
    state: &AppState,
    user_id: i64,
    status: Option<RequestStatus>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    let mut conn = state.db.acquire().await?;
    User::require(user_id, &mut conn).await?;
    Ok(Json(
        JoinRequest::list_for_user(user_id, status, &mut conn).await?,
    ))
}

#[debug_handler]
pub async fn get_club_join_requests(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    club_requests(&state, club_id, None).await
}

#[debug_handler]
pub async fn get_pending_club_join_requests(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    club_requests(&state, club_id, Some(RequestStatus::Pending)).await
}

#[debug_handler]
pub async fn get_user_join_requests(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    user_requests(&state, user_id, None).await
}

#[debug_handler]
pub async fn get_pending_user_join_requests(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    user_requests(&state, user_id, Some(RequestStatus::Pending)).await
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_join_requests_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    let status: RequestStatus = status.parse()?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(JoinRequest::list_by_status(status, &mut conn).await?))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RequestKey {
    pub user_id: i64,
    pub club_id: i64,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn check_pending_request(
    State(state): State<AppState>,
    Query(RequestKey { user_id, club_id }): Query<RequestKey>,
) -> AppResult<Json<bool>> {
    let mut conn = state.db.acquire().await?;
    User::require(user_id, &mut conn).await?;
    Club::require(club_id, &mut conn).await?;

    Ok(Json(
        JoinRequest::has_pending(user_id, club_id, &mut conn).await?,
    ))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_latest_join_request(
    State(state): State<AppState>,
    Query(RequestKey { user_id, club_id }): Query<RequestKey>,
) -> AppResult<Json<JoinRequest>> {
    let mut conn = state.db.acquire().await?;
    User::require(user_id, &mut conn).await?;
    Club::require(club_id, &mut conn).await?;

    JoinRequest::latest(user_id, club_id, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("No join request for this user and club"))
}
