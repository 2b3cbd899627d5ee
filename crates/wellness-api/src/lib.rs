pub mod auth;
pub mod convert;
pub mod error;
pub mod middleware;
pub mod sessions;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use auth::{AppState, AppStateInner};

/// Assemble every REST route. Public routes need no token; the rest go
/// through [`middleware::require_auth`].
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/sessions", get(sessions::list_published))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/my-sessions", get(sessions::list_mine))
        .route("/my-sessions/save-draft", post(sessions::save_draft))
        .route("/my-sessions/publish", post(sessions::publish))
        .route(
            "/my-sessions/{id}",
            get(sessions::get_mine).delete(sessions::delete_mine),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// GET /health: liveness check (no auth).
pub async fn health() -> &'static str {
    "ok"
}
