use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: health checks, sign-up and sign-in,
/// and read-only provider discovery.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Supabase sign-up plus the mirrored profile row carrying the role.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Exchanges credentials for a session and sets the session cookie.
        .route("/login", post(handlers::login))
        // GET /providers?category=...&location=...
        .route("/providers", get(handlers::list_providers))
        // GET /providers/{id}
        .route("/providers/{id}", get(handlers::get_provider))
        // GET /providers/{id}/reviews
        .route("/providers/{id}/reviews", get(handlers::get_provider_reviews))
}
