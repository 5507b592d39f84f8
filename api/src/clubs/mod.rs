mod club;
pub mod join_requests;
pub mod memberships;
pub mod presidents;

pub use club::*;

use crate::error::{require_text, AppError, AppResult};
use crate::users::{apply_role_event, RoleEvent};
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Deserialize, Serialize)]
pub struct CreateClubParams {
    name: String,
    description: String,
    logo: Option<String>,
}

#[debug_handler]
#[tracing::instrument(skip(state, params))]
pub async fn create_club(
    State(state): State<AppState>,
    Json(params): Json<CreateClubParams>,
) -> AppResult<impl IntoResponse> {
    require_text(&params.name, "name")?;
    require_text(&params.description, "description")?;

    let mut tx = state.db.begin().await?;
    if Club::from_name(&params.name, &mut tx).await?.is_some() {
        return Err(AppError::conflict("a club with this name already exists"));
    }

    let now = Utc::now().naive_utc();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO clubs (name, description, logo, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&params.name)
    .bind(&params.description)
    .bind(&params.logo)
    .bind(now)
    .bind(now)
    .fetch_one(&mut tx)
    .await?;

    let club = Club::require(id, &mut tx).await?;
    tx.commit().await?;

    tracing::info!(club_id = club.id, name = %club.name, "club created");
    Ok((StatusCode::CREATED, Json(club)))
}

#[derive(Default, Deserialize, Serialize)]
pub struct UpdateClubParams {
    name: Option<String>,
    description: Option<String>,
    logo: Option<String>,
}

#[debug_handler]
#[tracing::instrument(skip(state, params))]
pub async fn update_club(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(params): Json<UpdateClubParams>,
) -> AppResult<Json<Club>> {
    let mut tx = state.db.begin().await?;
    Club::require(id, &mut tx).await?;

    let now = Utc::now().naive_utc();

    let mut query = sqlx::QueryBuilder::new(
        r#"
        UPDATE clubs SET
        "#,
    );
    let mut separated = query.separated(", ");
    if let Some(name) = params.name {
        require_text(&name, "name")?;
        separated.push("name = ");
        separated.push_bind_unseparated(name);
    }
    if let Some(description) = params.description {
        require_text(&description, "description")?;
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }
    if let Some(logo) = params.logo {
        separated.push("logo = ");
        separated.push_bind_unseparated(logo);
    }
    separated.push("updated_at = ");
    separated.push_bind_unseparated(now);
    query.push(" WHERE id = ");
    query.push_bind(id);
    tracing::debug!("Query: {}", query.sql());
    query.build().execute(&mut tx).await?;

    let club = Club::require(id, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(club))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_clubs(State(state): State<AppState>) -> AppResult<Json<Vec<Club>>> {
    let clubs = sqlx::query_as::<_, Club>(&format!("SELECT {CLUB_COLUMNS} FROM clubs ORDER BY id"))
        .fetch_all(&state.db)
        .await?;

    Ok(Json(clubs))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_club_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Club>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(Club::require(id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_club_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Club>> {
    let mut conn = state.db.acquire().await?;
    Club::from_name(&name, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Club not found"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn delete_club(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    // collected before the cascade wipes the rows
    let affected: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT user_id FROM memberships WHERE club_id = ?
        UNION
        SELECT user_id FROM president_terms WHERE club_id = ?
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_all(&mut tx)
    .await?;

    let result = sqlx::query("DELETE FROM clubs WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Club not found"));
    }

    for user_id in affected {
        apply_role_event(&mut tx, RoleEvent::MembershipChanged { user_id }).await?;
    }
    tx.commit().await?;

    tracing::info!(club_id = id, "club deleted");
    Ok(StatusCode::NO_CONTENT)
}
