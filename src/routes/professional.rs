use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Professional Router Module
///
/// Nested under `/professional`. The access guard only lets callers with the
/// `professional` role through this prefix.
pub fn professional_routes() -> Router<AppState> {
    Router::new()
        // POST /professional/onboarding
        // Creates the caller's provider record; required before answers or checks.
        .route("/onboarding", post(handlers::onboard_provider))
        // POST /professional/answers
        // Service-intake answers, at most once per (form, service) per provider.
        .route("/answers", post(handlers::submit_service_answers))
        // GET/POST /professional/background-check
        .route(
            "/background-check",
            get(handlers::get_background_check).post(handlers::create_background_check),
        )
        // POST /professional/background-check/upload
        // Presigned URL for the identity document.
        .route(
            "/background-check/upload",
            post(handlers::get_background_check_upload_url),
        )
}
