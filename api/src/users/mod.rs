mod role;
mod user;

pub use role::*;
pub use user::*;

use crate::error::{require_text, AppError, AppResult};
use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterUserParams {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub avatar: Option<String>,
}

fn validate_email(email: &str) -> AppResult<()> {
    require_text(email, "email")?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::bad_request("invalid email")),
    }
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[debug_handler]
#[tracing::instrument(skip(state, params), fields(email = %params.email))]
pub async fn register_user(
    State(state): State<AppState>,
    Json(params): Json<RegisterUserParams>,
) -> AppResult<impl IntoResponse> {
    require_text(&params.first_name, "first_name")?;
    require_text(&params.last_name, "last_name")?;
    validate_email(&params.email)?;
    validate_password(&params.password)?;

    let mut tx = state.db.begin().await?;

    if User::from_email(&params.email, &mut tx).await?.is_some() {
        return Err(AppError::conflict("email is already in use"));
    }

    let password_hash = state.hasher.hash(&params.password)?;
    let now = Utc::now().naive_utc();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, first_name, last_name, password_hash, role, avatar, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&params.email)
    .bind(&params.first_name)
    .bind(&params.last_name)
    .bind(password_hash)
    .bind(Role::Guest)
    .bind(&params.avatar)
    .bind(now)
    .bind(now)
    .fetch_one(&mut tx)
    .await?;

    let user = User::require(id, &mut tx).await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginParams {
    pub email: String,
    pub password: String,
}

#[debug_handler]
#[tracing::instrument(skip(state, params), fields(email = %params.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(params): Json<LoginParams>,
) -> AppResult<Json<User>> {
    let mut conn = state.db.acquire().await?;

    if let Some(user) = User::from_email(&params.email, &mut conn).await? {
        match state.hasher.verify(&params.password, &user.password_hash) {
            Ok(true) => return Ok(Json(user)),
            Ok(false) => {}
            Err(e) => tracing::warn!(user_id = user.id, "unusable stored password hash: {e:#}"),
        }
    }

    tracing::debug!("rejected login");
    Err(AppError::unauthorized("invalid email or password"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(User::require(id, &mut conn).await?))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<User>> {
    let mut conn = state.db.acquire().await?;
    User::from_email(&email, &mut conn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn get_users_by_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let role: Role = role.parse()?;
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY id"
    ))
    .bind(role)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(users))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn check_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<bool>> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(count > 0))
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateUserParams {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

#[debug_handler]
#[tracing::instrument(skip(state, params))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(params): Json<UpdateUserParams>,
) -> AppResult<Json<User>> {
    let mut tx = state.db.begin().await?;
    User::require(id, &mut tx).await?;

    let mut query = sqlx::QueryBuilder::new(
        r#"
        UPDATE users SET
        "#,
    );
    let mut separated = query.separated(", ");
    if let Some(email) = params.email {
        validate_email(&email)?;
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }
    if let Some(first_name) = params.first_name {
        require_text(&first_name, "first_name")?;
        separated.push("first_name = ");
        separated.push_bind_unseparated(first_name);
    }
    if let Some(last_name) = params.last_name {
        require_text(&last_name, "last_name")?;
        separated.push("last_name = ");
        separated.push_bind_unseparated(last_name);
    }
    // an empty password keeps the current one
    if let Some(password) = params.password.filter(|p| !p.is_empty()) {
        validate_password(&password)?;
        separated.push("password_hash = ");
        separated.push_bind_unseparated(state.hasher.hash(&password)?);
    }
    if let Some(avatar) = params.avatar {
        separated.push("avatar = ");
        separated.push_bind_unseparated(avatar);
    }
    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now().naive_utc());
    query.push(" WHERE id = ");
    query.push_bind(id);
    tracing::debug!("Query: {}", query.sql());
    query.build().execute(&mut tx).await?;

    let user = User::require(id, &mut tx).await?;
    tx.commit().await?;

    Ok(Json(user))
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    match result.rows_affected() {
        0 => Err(AppError::not_found("User not found")),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FindUserParams {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[debug_handler]
#[tracing::instrument(skip(state))]
pub async fn find_users(
    Query(params): Query<FindUserParams>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<User>>> {
    if params.email.is_none() && params.first_name.is_none() && params.last_name.is_none() {
        return Err(AppError::bad_request("No search parameters provided"));
    }
    let mut query = sqlx::QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE "));
    let mut separated = query.separated(" AND ");
    if let Some(email) = params.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }
    if let Some(first_name) = params.first_name {
        separated.push("first_name = ");
        separated.push_bind_unseparated(first_name);
    }
    if let Some(last_name) = params.last_name {
        separated.push("last_name = ");
        separated.push_bind_unseparated(last_name);
    }
    query.push(" ORDER BY id");

    tracing::debug!("Query: {}", query.sql());

    let users = query.build_query_as::<User>().fetch_all(&state.db).await?;

    if users.is_empty() {
        return Err(AppError::not_found("No users found"));
    }
    Ok(Json(users))
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::tests::{create_test_server, create_test_server_with_pool, insert_user};
    use axum_test::TestServer;
    use tracing_test::traced_test;

    pub async fn create_user(server: &TestServer, user: RegisterUserParams) -> User {
        let response = server.post("/users/register").json(&user).await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    pub fn user_params(email: &str, first_name: &str, last_name: &str) -> RegisterUserParams {
        RegisterUserParams {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            password: "secret-pass".to_string(),
            avatar: None,
        }
    }

    pub async fn create_test_user(server: &TestServer) -> User {
        create_user(server, user_params("test@example.com", "Test", "User")).await
    }

    #[tokio::test]
    #[traced_test]
    async fn test_register_user() {
        let server = create_test_server().await;
        let created_user = create_test_user(&server).await;
        assert_eq!(created_user.role, Role::Guest);

        let response = server.get(&format!("/users/{}", created_user.id)).await;
        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "test@example.com");
        assert_eq!(body["role"], "GUEST");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_register_duplicate_email() {
        let server = create_test_server().await;
        create_test_user(&server).await;

        let response = server
            .post("/users/register")
            .json(&user_params("test@example.com", "Other", "Person"))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_register_validation() {
        let server = create_test_server().await;

        let mut params = user_params("not-an-email", "Test", "User");
        let response = server.post("/users/register").json(&params).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        params.email = "ok@example.com".to_string();
        params.password = "abc".to_string();
        let response = server.post("/users/register").json(&params).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        params.password = "long-enough".to_string();
        params.first_name = "  ".to_string();
        let response = server.post("/users/register").json(&params).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_login() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;

        let response = server
            .post("/users/login")
            .json(&LoginParams {
                email: user.email.clone(),
                password: "secret-pass".to_string(),
            })
            .await;
        response.assert_status(StatusCode::OK);
        let logged_in: User = response.json();
        assert_eq!(logged_in.id, user.id);

        let response = server
            .post("/users/login")
            .json(&LoginParams {
                email: user.email.clone(),
                password: "wrong-pass".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/users/login")
            .json(&LoginParams {
                email: "nobody@example.com".to_string(),
                password: "secret-pass".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_login_with_unparseable_stored_hash() {
        let (server, db) = create_test_server_with_pool().await;
        let mut conn = db.acquire().await.unwrap();
        // seeded with a password_hash that is not a PHC string
        insert_user(&mut conn, "legacy@example.com").await;
        drop(conn);

        let response = server
            .post("/users/login")
            .json(&LoginParams {
                email: "legacy@example.com".to_string(),
                password: "secret-pass".to_string(),
            })
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: crate::error::ErrorBody = response.json();
        assert_eq!(body.message, "invalid email or password");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_get_users() {
        let server = create_test_server().await;

        let user = create_test_user(&server).await;

        let response = server.get("/users/list").await;
        assert_eq!(response.status_code(), 200);
        let users: Vec<User> = response.json();
        assert!(!users.is_empty());
        assert_eq!(users[0].email, user.email);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_get_user_by_email_and_check_email() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;

        let response = server.get(&format!("/users/email/{}", user.email)).await;
        response.assert_status(StatusCode::OK);
        let found: User = response.json();
        assert_eq!(found.id, user.id);

        let response = server.get("/users/email/missing@example.com").await;
        response.assert_status(StatusCode::NOT_FOUND);

        let exists: bool = server
            .get(&format!("/users/check-email/{}", user.email))
            .await
            .json();
        assert!(exists);
        let exists: bool = server
            .get("/users/check-email/missing@example.com")
            .await
            .json();
        assert!(!exists);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_get_users_by_role() {
        let server = create_test_server().await;
        create_test_user(&server).await;

        let guests: Vec<User> = server.get("/users/role/guest").await.json();
        assert_eq!(guests.len(), 1);

        let members: Vec<User> = server.get("/users/role/MEMBER").await.json();
        assert!(members.is_empty());

        let response = server.get("/users/role/chair").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_update_user() {
        let server = create_test_server().await;

        let user = create_test_user(&server).await;
        let id = user.id;

        let response = server
            .put(&format!("/users/{}", id))
            .json(&UpdateUserParams {
                email: Some("updated@example.com".to_string()),
                first_name: Some("Updated".to_string()),
                last_name: Some("Name".to_string()),
                password: Some("brand-new-pass".to_string()),
                avatar: Some("avatars/updated.png".to_string()),
            })
            .await;

        assert_eq!(response.status_code(), 200);
        let updated_user: User = response.json();
        assert_eq!(updated_user.email, "updated@example.com");
        assert_eq!(updated_user.first_name, "Updated");
        assert_eq!(updated_user.last_name, "Name");
        assert_eq!(updated_user.avatar.as_deref(), Some("avatars/updated.png"));

        let response = server
            .post("/users/login")
            .json(&LoginParams {
                email: "updated@example.com".to_string(),
                password: "brand-new-pass".to_string(),
            })
            .await;
        response.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_update_missing_user() {
        let server = create_test_server().await;
        let response = server
            .put("/users/999")
            .json(&UpdateUserParams::default())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_delete_user() {
        let server = create_test_server().await;

        let user = create_test_user(&server).await;
        let id = user.id;

        let response = server.delete(&format!("/users/{}", id)).await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server.get(&format!("/users/{}", id)).await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server.delete(&format!("/users/{}", id)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_find_users_by_email() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;

        let response = server
            .get("/users/search")
            .add_query_param("email", &user.email)
            .await;
        response.assert_status(StatusCode::OK);
        let users: Vec<User> = response.json();
        assert_eq!(users.len(), 1);
        assert_eq!(&users[0].email, &user.email);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_find_user_by_first_and_last_name() {
        let server = create_test_server().await;
        let user = create_test_user(&server).await;
        create_user(&server, user_params("test2@example.com", "Test2", "User")).await;
        create_user(&server, user_params("test3@example.com", "Test", "User2")).await;

        let response = server
            .get(&format!(
                "/users/search?first_name={}&last_name={}",
                user.first_name, user.last_name
            ))
            .await;

        response.assert_status(StatusCode::OK);
        let users: Vec<User> = response.json();
        assert_eq!(users.len(), 1);
        assert_eq!(&users[0].email, &user.email);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_find_users_errors() {
        let server = create_test_server().await;

        let response = server.get("/users/search").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .get("/users/search")
            .add_query_param("email", "nonexistent@example.com")
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
