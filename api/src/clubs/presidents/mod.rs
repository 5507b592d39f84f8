mod president;

pub use president::*;

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
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct AppointParams {
    pub user_id: i64,
    pub club_id: i64,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn appoint_president(
    State(state): State<AppState>,
    Json(AppointParams { user_id, club_id }): Json<AppointParams>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    User::require_reference(user_id, &mut tx).await?;
    Club::require_reference(club_id, &mut tx).await?;

    let term = PresidentTerm::appoint(user_id, club_id, &mut tx).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(term)))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn change_president(
    State(state): State<AppState>,
    Json(AppointParams { user_id, club_id }): Json<AppointParams>,
) -> AppResult<Json<Succession>> {
    let mut tx = state.db.begin().await?;
    User::require_reference(user_id, &mut tx).await?;
    Club::require_reference(club_id, &mut tx).await?;

    let succession = PresidentTerm::change(club_id, user_id, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(succession))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn remove_president(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    Club::require(club_id, &mut tx).await?;

    if !PresidentTerm::remove(club_id, &mut tx).await? {
        return Err(AppError::not_found("Club has no current president"));
    }
    tx.commit().await?;

    Ok((StatusCode::OK, "President removed successfully"))
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndTermParams {
    pub ended_at: Option<NaiveDateTime>,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn end_president_term(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
    Query(EndTermParams { ended_at }): Query<EndTermParams>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    Club::require(club_id, &mut tx).await?;

    let ended_at = ended_at.unwrap_or_else(|| Utc::now().naive_utc());
    if !PresidentTerm::end(club_id, ended_at, &mut tx).await? {
        return Err(AppError::not_found("Club has no current president"));
    }
    tx.commit().await?;

    Ok((StatusCode::OK, "President term ended successfully"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_president_terms(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PresidentTerm>>> {
    let terms = sqlx::query_as::<_, PresidentTerm>(&format!(
        "SELECT {PRESIDENT_TERM_COLUMNS} FROM president_terms ORDER BY id"
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(terms))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_president_term_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PresidentTerm>> {
    let mut conn = state.db.acquire().await?;
    PresidentTerm::from_id(id, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("President term not found"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_current_president(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<PresidentTerm>> {
    let mut conn = state.db.acquire().await?;
    Club::require(club_id, &mut conn).await?;

    PresidentTerm::current(club_id, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Club has no current president"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_president_history(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<Vec<PresidentTerm>>> {
    let mut conn = state.db.acquire().await?;
    Club::require(club_id, &mut conn).await?;

    Ok(Json(PresidentTerm::history(club_id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_user_presidencies(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<PresidentTerm>>> {
    let mut conn = state.db.acquire().await?;
    User::require(user_id, &mut conn).await?;

    Ok(Json(
        PresidentTerm::current_for_user(user_id, &mut conn).await?,
    ))
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::clubs::test::create_test_club;
    use crate::tests::create_test_server;
    use crate::users::test::{create_test_user, create_user, user_params};
    use crate::users::Role;
    use axum_test::TestServer;

    pub async fn appoint(server: &TestServer, user_id: i64, club_id: i64) -> PresidentTerm {
        let response = server
            .post("/presidents/appoint")
            .json(&AppointParams { user_id, club_id })
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_appoint_president() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        let club = create_test_club(&server).await;

        let term = appoint(&server, user.id, club.id).await;
        assert!(term.is_current);
        assert!(term.ended_at.is_none());

        let current: PresidentTerm = server
            .get(&format!("/presidents/club/{}/current", club.id))
            .await
            .json();
        assert_eq!(current.id, term.id);

        let user: User = server.get(&format!("/users/{}", user.id)).await.json();
        assert_eq!(user.role, Role::President);

        let response = server
            .post("/presidents/appoint")
            .json(&AppointParams {
                user_id: 999,
                club_id: club.id,
            })
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_succession() {
        let server = create_test_server().await;
        let ada = create_user(&server, user_params("ada@example.com", "Ada", "Lovelace")).await;
        let bob = create_user(&server, user_params("bob@example.com", "Bob", "Marley")).await;
        let club = create_test_club(&server).await;

        appoint(&server, ada.id, club.id).await;
        appoint(&server, bob.id, club.id).await;

        let current: PresidentTerm = server
            .get(&format!("/presidents/club/{}/current", club.id))
            .await
            .json();
        assert_eq!(current.user_id, bob.id);

        let history: Vec<PresidentTerm> = server
            .get(&format!("/presidents/club/{}/history", club.id))
            .await
            .json();
        assert_eq!(history.len(), 2);
        let outgoing = history.iter().find(|term| term.user_id == ada.id).unwrap();
        assert!(!outgoing.is_current);
        assert!(outgoing.ended_at.is_some());

        let all: Vec<PresidentTerm> = server.get("/presidents").await.json();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_change_president() {
        let server = create_test_server().await;
        let ada = create_user(&server, user_params("ada@example.com", "Ada", "Lovelace")).await;
        let bob = create_user(&server, user_params("bob@example.com", "Bob", "Marley")).await;
        let club = create_test_club(&server).await;

        let response = server
            .put("/presidents/change")
            .json(&AppointParams {
                user_id: ada.id,
                club_id: club.id,
            })
            .await;
        response.assert_status(StatusCode::OK);
        let succession: Succession = response.json();
        assert!(!succession.replaced_previous);

        let succession: Succession = server
            .put("/presidents/change")
            .json(&AppointParams {
                user_id: bob.id,
                club_id: club.id,
            })
            .await
            .json();
        assert!(succession.replaced_previous);
        assert_eq!(succession.previous.unwrap().user_id, ada.id);
        assert_eq!(succession.current.user_id, bob.id);

        let terms: Vec<PresidentTerm> = server
            .get(&format!("/presidents/user/{}/current", bob.id))
            .await
            .json();
        assert_eq!(terms.len(), 1);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_remove_and_end_president() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        let club = create_test_club(&server).await;

        let response = server.delete(&format!("/presidents/club/{}", club.id)).await;
        response.assert_status(StatusCode::NOT_FOUND);

        appoint(&server, user.id, club.id).await;
        let response = server.delete(&format!("/presidents/club/{}", club.id)).await;
        response.assert_status(StatusCode::OK);

        let response = server
            .get(&format!("/presidents/club/{}/current", club.id))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let user: User = server.get(&format!("/users/{}", user.id)).await.json();
        assert_eq!(user.role, Role::Guest);

        let term = appoint(&server, user.id, club.id).await;
        let response = server
            .put(&format!("/presidents/club/{}/end", club.id))
            .add_query_param("ended_at", "2021-06-30T12:00:00")
            .await;
        response.assert_status(StatusCode::OK);

        let ended: PresidentTerm = server
            .get(&format!("/presidents/{}", term.id))
            .await
            .json();
        assert!(!ended.is_current);
        assert_eq!(
            ended.ended_at.map(|at| at.to_string()),
            Some("2021-06-30 12:00:00".to_string())
        );

        let response = server
            .put(&format!("/presidents/club/{}/end", club.id))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server.get("/presidents/club/999/history").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
