mod participation;

pub use participation::*;

use crate::error::{AppError, AppResult};
use crate::events::Event;
use crate::users::User;
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateParticipationParams {
    pub user_id: i64,
    pub event_id: i64,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn create_participation(
    State(state): State<AppState>,
    Json(params): Json<CreateParticipationParams>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    User::require_reference(params.user_id, &mut tx).await?;
    Event::require_reference(params.event_id, &mut tx).await?;

    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let participation =
        Participation::create(params.user_id, params.event_id, date, &mut tx).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(participation)))
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateParticipationParams {
    pub user_id: Option<i64>,
    pub event_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn update_participation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(params): Json<UpdateParticipationParams>,
) -> AppResult<Json<Participation>> {
    let mut tx = state.db.begin().await?;
    let existing = Participation::require(id, &mut tx).await?;

    let user_id = params.user_id.unwrap_or(existing.user_id);
    let event_id = params.event_id.unwrap_or(existing.event_id);
    User::require_reference(user_id, &mut tx).await?;
    Event::require_reference(event_id, &mut tx).await?;

    sqlx::query("UPDATE participations SET user_id = ?, event_id = ?, date = ? WHERE id = ?")
        .bind(user_id)
        .bind(event_id)
        .bind(params.date.unwrap_or(existing.date))
        .bind(id)
        .execute(&mut tx)
        .await?;

    let participation = Participation::require(id, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(participation))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn delete_participation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM participations WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    match result.rows_affected() {
        0 => Err(AppError::not_found("Participation not found")),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_participations(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Participation>>> {
    let participations = sqlx::query_as::<_, Participation>(&format!(
        "SELECT {PARTICIPATION_COLUMNS} FROM participations ORDER BY id"
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(participations))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_participation_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Participation>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(Participation::require(id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_user_participations(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<Participation>>> {
    let mut conn = state.db.acquire().await?;
    User::require(user_id, &mut conn).await?;

    Ok(Json(Participation::list_for_user(user_id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_event_participations(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<Vec<Participation>>> {
    let mut conn = state.db.acquire().await?;
    Event::require(event_id, &mut conn).await?;

    Ok(Json(
        Participation::list_for_event(event_id, &mut conn).await?,
    ))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_participation_for_user_and_event(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(i64, i64)>,
) -> AppResult<Json<Participation>> {
    let mut conn = state.db.acquire().await?;
    Participation::find(user_id, event_id, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Participation not found"))
}
