mod auth;
mod clubs;
mod error;
mod events;
mod settings;
mod sqlite;
mod users;

use std::sync::Arc;

use anyhow::Result;
use auth::{Argon2Hasher, CredentialHasher};
use clubs::{join_requests, memberships, presidents};
use events::{attestations, participations};
use settings::Settings;
use sqlx::SqlitePool;
use tokio::{net::TcpListener, time::Instant};

use axum::{
    routing::{delete, get, post, put},
    serve, Router,
};
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    db: SqlitePool,
    hasher: Arc<dyn CredentialHasher>,
}

async fn create_app(settings: &Settings) -> Result<Router> {
    let db = sqlite::create_pool(&settings.sqlite).await?;
    let hasher = Arc::new(Argon2Hasher::new(&settings.password)?);

    Ok(router(AppState { db, hasher }))
}

fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/users/register", post(users::register_user))
        .route("/users/login", post(users::login))
        .route("/users/list", get(users::get_users))
        .route("/users/search", get(users::find_users))
        .route("/users/email/{email}", get(users::get_user_by_email))
        .route("/users/role/{role}", get(users::get_users_by_role))
        .route("/users/check-email/{email}", get(users::check_email))
        .route(
            "/users/{id}",
            get(users::get_user_by_id)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/clubs", post(clubs::create_club))
        .route("/clubs/list", get(clubs::get_clubs))
        .route("/clubs/name/{name}", get(clubs::get_club_by_name))
        .route(
            "/clubs/{id}",
            get(clubs::get_club_by_id)
                .put(clubs::update_club)
                .delete(clubs::delete_club),
        )
        .route(
            "/memberships",
            get(memberships::get_memberships)
                .post(memberships::add_member)
                .delete(memberships::remove_member),
        )
        .route(
            "/memberships/deactivate",
            put(memberships::deactivate_member),
        )
        .route(
            "/memberships/reactivate",
            put(memberships::reactivate_member),
        )
        .route("/memberships/check", get(memberships::check_membership))
        .route("/memberships/count/{id}", get(memberships::member_count))
        .route(
            "/memberships/club/{id}",
            get(memberships::get_club_memberships),
        )
        .route(
            "/memberships/club/{id}/active",
            get(memberships::get_active_club_memberships),
        )
        .route(
            "/memberships/user/{id}",
            get(memberships::get_user_memberships),
        )
        .route(
            "/memberships/user/{id}/active",
            get(memberships::get_active_user_memberships),
        )
        .route("/memberships/{id}", get(memberships::get_membership_by_id))
        .route(
            "/requests",
            get(join_requests::get_join_requests).post(join_requests::create_join_request),
        )
        .route("/requests/check", get(join_requests::check_pending_request))
        .route("/requests/latest", get(join_requests::get_latest_join_request))
        .route(
            "/requests/club/{id}",
            get(join_requests::get_club_join_requests),
        )
        .route(
            "/requests/club/{id}/pending",
            get(join_requests::get_pending_club_join_requests),
        )
        .route(
            "/requests/user/{id}",
            get(join_requests::get_user_join_requests),
        )
        .route(
            "/requests/user/{id}/pending",
            get(join_requests::get_pending_user_join_requests),
        )
        .route(
            "/requests/status/{status}",
            get(join_requests::get_join_requests_by_status),
        )
        .route(
            "/requests/{id}",
            get(join_requests::get_join_request_by_id).delete(join_requests::cancel_join_request),
        )
        .route(
            "/requests/{id}/approve",
            put(join_requests::approve_join_request),
        )
        .route(
            "/requests/{id}/reject",
            put(join_requests::reject_join_request),
        )
        .route("/presidents", get(presidents::get_president_terms))
        .route("/presidents/appoint", post(presidents::appoint_president))
        .route("/presidents/change", put(presidents::change_president))
        .route(
            "/presidents/club/{id}",
            delete(presidents::remove_president),
        )
        .route(
            "/presidents/club/{id}/current",
            get(presidents::get_current_president),
        )
        .route(
            "/presidents/club/{id}/history",
            get(presidents::get_president_history),
        )
        .route(
            "/presidents/club/{id}/end",
            put(presidents::end_president_term),
        )
        .route(
            "/presidents/user/{id}/current",
            get(presidents::get_user_presidencies),
        )
        .route(
            "/presidents/{id}",
            get(presidents::get_president_term_by_id),
        )
        .route("/events", get(events::get_events).post(events::create_event))
        .route("/events/upcoming", get(events::get_upcoming_events))
        .route("/events/club/{id}", get(events::get_club_events))
        .route("/events/type/{event_type}", get(events::get_events_by_type))
        .route(
            "/events/{id}",
            get(events::get_event_by_id)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/participations",
            get(participations::get_participations).post(participations::create_participation),
        )
        .route(
            "/participations/user/{user_id}",
            get(participations::get_user_participations),
        )
        .route(
            "/participations/event/{event_id}",
            get(participations::get_event_participations),
        )
        .route(
            "/participations/user/{user_id}/event/{event_id}",
            get(participations::get_participation_for_user_and_event),
        )
        .route(
            "/participations/{id}",
            get(participations::get_participation_by_id)
                .put(participations::update_participation)
                .delete(participations::delete_participation),
        )
        .route(
            "/attestations",
            get(attestations::get_attestations).post(attestations::create_attestation),
        )
        .route(
            "/attestations/event/{event_id}",
            get(attestations::get_event_attestation),
        )
        .route(
            "/attestations/generate/{event_id}",
            post(attestations::generate_attestation),
        )
        .route(
            "/attestations/{id}",
            get(attestations::get_attestation_by_id)
                .put(attestations::update_attestation)
                .delete(attestations::delete_attestation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    dotenv::from_path("./api/.env").ok();

    let start = Instant::now();

    let settings = Settings::new()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let app = create_app(&settings).await?;

    let listener =
        TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    let shutdown = async move {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::error!("failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => {},
            _ = terminate => {},
        }
        let duration = start.elapsed();
        info!("Shutting down gracefully... in {:?}", duration);
    };

    serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
