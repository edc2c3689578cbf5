use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Customer Router Module
///
/// Nested under `/customer`. The access guard only lets callers with the
/// `customer` role through this prefix.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        // POST /customer/providers/{id}/reviews
        .route("/providers/{id}/reviews", post(handlers::create_review))
}
