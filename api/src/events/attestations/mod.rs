mod attestation;

pub use attestation::*;

use crate::error::{require_text, AppError, AppResult};
use crate::events::Event;
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateAttestationParams {
    pub name: String,
    pub description: String,
    pub event_id: Option<i64>,
}

#[debug_handler]
#[tracing::instrument(skip(state, params))]
pub async fn create_attestation(
    State(state): State<AppState>,
    Json(params): Json<CreateAttestationParams>,
) -> AppResult<impl IntoResponse> {
    require_text(&params.name, "name")?;

    let mut tx = state.db.begin().await?;
    if let Some(event_id) = params.event_id {
        Event::require_reference(event_id, &mut tx).await?;
    }
    let attestation =
        Attestation::create(&params.name, &params.description, params.event_id, &mut tx).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(attestation)))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerateAttestationParams {
    pub name: String,
    pub description: String,
}

/// Issues the attestation of an existing event.
#[debug_handler]
#[tracing::instrument(skip(state, params))]
pub async fn generate_attestation(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(params): Json<GenerateAttestationParams>,
) -> AppResult<impl IntoResponse> {
    require_text(&params.name, "name")?;

    let mut tx = state.db.begin().await?;
    Event::require(event_id, &mut tx).await?;
    let attestation =
        Attestation::create(&params.name, &params.description, Some(event_id), &mut tx).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(attestation)))
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateAttestationParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub event_id: Option<i64>,
}

#[debug_handler]
#[tracing::instrument(skip(state, params))]
pub async fn update_attestation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(params): Json<UpdateAttestationParams>,
) -> AppResult<Json<Attestation>> {
    let mut tx = state.db.begin().await?;
    let existing = Attestation::require(id, &mut tx).await?;

    let name = params.name.unwrap_or(existing.name);
    require_text(&name, "name")?;
    let event_id = match params.event_id {
        Some(event_id) => {
            Event::require_reference(event_id, &mut tx).await?;
            Some(event_id)
        }
        None => existing.event_id,
    };

    // a clash on the event_id index surfaces as Conflict
    sqlx::query("UPDATE attestations SET name = ?, description = ?, event_id = ? WHERE id = ?")
        .bind(name)
        .bind(params.description.unwrap_or(existing.description))
        .bind(event_id)
        .bind(id)
        .execute(&mut tx)
        .await?;

    let attestation = Attestation::require(id, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(attestation))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn delete_attestation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM attestations WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    match result.rows_affected() {
        0 => Err(AppError::not_found("Attestation not found")),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_attestations(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Attestation>>> {
    let attestations = sqlx::query_as::<_, Attestation>(&format!(
        "SELECT {ATTESTATION_COLUMNS} FROM attestations ORDER BY id"
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(attestations))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_attestation_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Attestation>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(Attestation::require(id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_event_attestation(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> AppResult<Json<Attestation>> {
    let mut conn = state.db.acquire().await?;
    Event::require(event_id, &mut conn).await?;

    Attestation::for_event(event_id, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Event has no attestation"))
}
