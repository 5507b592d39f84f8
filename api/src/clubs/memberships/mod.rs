mod membership;

pub use membership::*;

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

/// Identifies a membership by its (user, club) pair.
#[derive(Debug, Deserialize, Serialize)]
pub struct MembershipKey {
    pub user_id: i64,
    pub club_id: i64,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn add_member(
    State(state): State<AppState>,
    Json(MembershipKey { user_id, club_id }): Json<MembershipKey>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    User::require_reference(user_id, &mut tx).await?;
    Club::require_reference(club_id, &mut tx).await?;

    let membership = Membership::add(user_id, club_id, &mut tx).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(membership)))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn remove_member(
    State(state): State<AppState>,
    Query(MembershipKey { user_id, club_id }): Query<MembershipKey>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    User::require(user_id, &mut tx).await?;
    Club::require(club_id, &mut tx).await?;

    if !Membership::remove(user_id, club_id, &mut tx).await? {
        return Err(AppError::not_found("Membership not found"));
    }
    tx.commit().await?;

    Ok((StatusCode::OK, "Member removed successfully"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn deactivate_member(
    State(state): State<AppState>,
    Query(MembershipKey { user_id, club_id }): Query<MembershipKey>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    User::require(user_id, &mut tx).await?;
    Club::require(club_id, &mut tx).await?;

    if !Membership::deactivate(user_id, club_id, &mut tx).await? {
        return Err(AppError::invalid_state(
            "Membership not found or already inactive",
        ));
    }
    tx.commit().await?;

    Ok((StatusCode::OK, "Member deactivated successfully"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn reactivate_member(
    State(state): State<AppState>,
    Query(MembershipKey { user_id, club_id }): Query<MembershipKey>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;
    User::require(user_id, &mut tx).await?;
    Club::require(club_id, &mut tx).await?;

    if !Membership::reactivate(user_id, club_id, &mut tx).await? {
        return Err(AppError::invalid_state(
            "Membership not found or already active",
        ));
    }
    tx.commit().await?;

    Ok((StatusCode::OK, "Member reactivated successfully"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn check_membership(
    State(state): State<AppState>,
    Query(MembershipKey { user_id, club_id }): Query<MembershipKey>,
) -> AppResult<Json<bool>> {
    let mut conn = state.db.acquire().await?;
    User::require(user_id, &mut conn).await?;
    Club::require(club_id, &mut conn).await?;

    Ok(Json(Membership::is_member(user_id, club_id, &mut conn).await?))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MemberCount {
    pub club_id: i64,
    /// Every membership row, inactive ones included.
    pub total: i64,
    pub active: i64,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn member_count(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<MemberCount>> {
    let mut conn = state.db.acquire().await?;
    Club::require(club_id, &mut conn).await?;

    Ok(Json(MemberCount {
        club_id,
        total: Membership::count(club_id, &mut conn).await?,
        active: Membership::count_active(club_id, &mut conn).await?,
    }))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_memberships(State(state): State<AppState>) -> AppResult<Json<Vec<Membership>>> {
    let memberships = sqlx::query_as::<_, Membership>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS} FROM memberships ORDER BY id"
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(memberships))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_membership_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Membership>> {
    let mut conn = state.db.acquire().await?;
    Membership::from_id(id, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Membership not found"))
}

async fn club_memberships(
    state: &AppState,
    club_id: i64,
    active_only: bool,
) -> AppResult<Json<Vec<Membership>>> {
    let mut conn = state.db.acquire().await?;
    Club::require(club_id, &mut conn).await?;
    Ok(Json(
        Membership::list_for_club(club_id, active_only, &mut conn).await?,
    ))
}

async fn user_memberships(
    state: &AppState,
    user_id: i64,
    active_only: bool,
) -> AppResult<Json<Vec<Membership>>> {
    let mut conn = state.db.acquire().await?;
    User::require(user_id, &mut conn).await?;
    Ok(Json(
        Membership::list_for_user(user_id, active_only, &mut conn).await?,
    ))
}

#[debug_handler]
pub async fn get_club_memberships(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<Vec<Membership>>> {
    club_memberships(&state, club_id, false).await
}

#[debug_handler]
pub async fn get_active_club_memberships(
    State(state): State<AppState>,
    Path(club_id): Path<i64>,
) -> AppResult<Json<Vec<Membership>>> {
    club_memberships(&state, club_id, true).await
}

#[debug_handler]
pub async fn get_user_memberships(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<Membership>>> {
    user_memberships(&state, user_id, false).await
}

#[debug_handler]
pub async fn get_active_user_memberships(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<Membership>>> {
    user_memberships(&state, user_id, true).await
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::clubs::test::{create_named_club, create_test_club};
    use crate::tests::create_test_server;
    use crate::users::test::create_test_user;
    use crate::users::Role;
    use axum_test::TestServer;

    pub async fn add_member(server: &TestServer, user_id: i64, club_id: i64) -> Membership {
        let response = server
            .post("/memberships")
            .json(&MembershipKey { user_id, club_id })
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_add_member() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        let club = create_test_club(&server).await;

        let membership = add_member(&server, user.id, club.id).await;
        assert_eq!(membership.user_id, user.id);
        assert_eq!(membership.club_id, club.id);
        assert!(membership.is_active);

        let user: User = server.get(&format!("/users/{}", user.id)).await.json();
        assert_eq!(user.role, Role::Member);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_add_member_with_dangling_reference() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;

        let response = server
            .post("/memberships")
            .json(&MembershipKey {
                user_id: user.id,
                club_id: 42,
            })
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_remove_member() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        let club = create_test_club(&server).await;
        add_member(&server, user.id, club.id).await;

        let response = server
            .delete("/memberships")
            .add_query_param("user_id", user.id)
            .add_query_param("club_id", club.id)
            .await;
        response.assert_status(StatusCode::OK);

        let is_member: bool = server
            .get("/memberships/check")
            .add_query_param("user_id", user.id)
            .add_query_param("club_id", club.id)
            .await
            .json();
        assert!(!is_member);

        let response = server
            .delete("/memberships")
            .add_query_param("user_id", user.id)
            .add_query_param("club_id", club.id)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_deactivate_and_reactivate_member() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        let club = create_test_club(&server).await;
        add_member(&server, user.id, club.id).await;

        let response = server
            .put("/memberships/deactivate")
            .add_query_param("user_id", user.id)
            .add_query_param("club_id", club.id)
            .await;
        response.assert_status(StatusCode::OK);

        let response = server
            .put("/memberships/deactivate")
            .add_query_param("user_id", user.id)
            .add_query_param("club_id", club.id)
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let active: Vec<Membership> = server
            .get(&format!("/memberships/club/{}/active", club.id))
            .await
            .json();
        assert!(active.is_empty());

        let response = server
            .put("/memberships/reactivate")
            .add_query_param("user_id", user.id)
            .add_query_param("club_id", club.id)
            .await;
        response.assert_status(StatusCode::OK);

        let active: Vec<Membership> = server
            .get(&format!("/memberships/user/{}/active", user.id))
            .await
            .json();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_member_count() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        let club = create_test_club(&server).await;
        let other = create_named_club(&server, "Other Club").await;
        add_member(&server, user.id, club.id).await;
        add_member(&server, user.id, other.id).await;

        server
            .put("/memberships/deactivate")
            .add_query_param("user_id", user.id)
            .add_query_param("club_id", club.id)
            .await
            .assert_status(StatusCode::OK);

        let count: MemberCount = server
            .get(&format!("/memberships/count/{}", club.id))
            .await
            .json();
        assert_eq!(count.total, 1);
        assert_eq!(count.active, 0);

        let response = server.get("/memberships/count/999").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_get_memberships() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        let club = create_test_club(&server).await;
        let membership = add_member(&server, user.id, club.id).await;

        let all: Vec<Membership> = server.get("/memberships").await.json();
        assert_eq!(all.len(), 1);

        let response = server.get(&format!("/memberships/{}", membership.id)).await;
        response.assert_status(StatusCode::OK);

        let by_user: Vec<Membership> = server
            .get(&format!("/memberships/user/{}", user.id))
            .await
            .json();
        assert_eq!(by_user.len(), 1);

        let response = server.get("/memberships/user/999").await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server.get("/memberships/999").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
