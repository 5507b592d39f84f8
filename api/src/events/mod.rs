mod event;
pub mod attestations;
pub mod participations;

pub use event::*;

use crate::clubs::Club;
use crate::error::{require_text, AppError, AppResult};
use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateEventParams {
    pub club_id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub image: Option<String>,
    #[serde(default)]
    pub event_type: EventType,
}

#[debug_handler]
#[tracing::instrument(skip(state, params), fields(club_id = params.club_id))]
pub async fn create_event(
    State(state): State<AppState>,
    Json(params): Json<CreateEventParams>,
) -> AppResult<impl IntoResponse> {
    require_text(&params.title, "title")?;
    require_text(&params.description, "description")?;

    let mut tx = state.db.begin().await?;
    Club::require_reference(params.club_id, &mut tx).await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO events (club_id, title, description, date, image, event_type)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(params.club_id)
    .bind(&params.title)
    .bind(&params.description)
    .bind(params.date)
    .bind(&params.image)
    .bind(params.event_type)
    .fetch_one(&mut tx)
    .await?;

    let event = Event::require(id, &mut tx).await?;
    tx.commit().await?;

    tracing::info!(event_id = event.id, title = %event.title, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateEventParams {
    pub club_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub image: Option<String>,
    pub event_type: Option<EventType>,
}

#[debug_handler]
#[tracing::instrument(skip(state, params))]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(params): Json<UpdateEventParams>,
) -> AppResult<Json<Event>> {
    let mut tx = state.db.begin().await?;
    Event::require(id, &mut tx).await?;

    let mut query = sqlx::QueryBuilder::new("UPDATE events SET ");
    let mut separated = query.separated(", ");
    // keeps the statement valid when nothing else changes
    separated.push("id = id");
    if let Some(club_id) = params.club_id {
        Club::require_reference(club_id, &mut tx).await?;
        separated.push("club_id = ");
        separated.push_bind_unseparated(club_id);
    }
    if let Some(title) = params.title {
        require_text(&title, "title")?;
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }
    if let Some(description) = params.description {
        require_text(&description, "description")?;
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }
    if let Some(date) = params.date {
        separated.push("date = ");
        separated.push_bind_unseparated(date);
    }
    if let Some(image) = params.image {
        separated.push("image = ");
        separated.push_bind_unseparated(image);
    }
    if let Some(event_type) = params.event_type {
        separated.push("event_type = ");
        separated.push_bind_unseparated(event_type);
    }
    query.push(" WHERE id = ");
    query.push_bind(id);
    tracing::debug!("Query: {}", query.sql());
    query.build().execute(&mut tx).await?;

    let event = Event::require(id, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(event))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    match result.rows_affected() {
        0 => Err(AppError::not_found("Event not found")),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_events(State(state): State<AppState>) -> AppResult<Json<Vec<Event>>> {
    let events = sqlx::query_as::<_, Event>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events ORDER BY id"
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(events))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_event_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Event>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(Event::require(id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_club_events(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<Vec<Event>>> {
    let mut conn = state.db.acquire().await?;
    Club::require(club_id, &mut conn).await?;

    Ok(Json(Event::list_for_club(club_id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_events_by_type(
    State(state): State<AppState>,
    Path(event_type): Path<String>,
) -> AppResult<Json<Vec<Event>>> {
    let event_type: EventType = event_type.parse()?;
    let mut conn = state.db.acquire().await?;

    Ok(Json(Event::list_by_type(event_type, &mut conn).await?))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpcomingParams {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_upcoming_events(
    State(state): State<AppState>,
    Query(UpcomingParams { date }): Query<UpcomingParams>,
) -> AppResult<Json<Vec<Event>>> {
    let after = date.unwrap_or_else(|| Utc::now().date_naive());
    let mut conn = state.db.acquire().await?;

    Ok(Json(Event::upcoming(after, &mut conn).await?))
}
