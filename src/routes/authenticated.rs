use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Routes for any caller with a valid session and an assigned role. The router
/// is wrapped in `auth_middleware` (see `lib.rs`), so every handler here also
/// receives a resolved `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // --- Messaging ---
        // POST /messages
        .route("/messages", post(handlers::send_message))
        // GET /inbox
        .route("/inbox", get(handlers::get_inbox))
        // PATCH /messages/{id}/read
        // Recipient-only; anyone else gets a 404.
        .route("/messages/{id}/read", patch(handlers::mark_message_read))
        // --- Presence ---
        // POST marks the caller online, DELETE removes them, GET lists who is online.
        .route(
            "/presence",
            get(handlers::get_presence)
                .post(handlers::track_presence)
                .delete(handlers::leave_presence),
        )
}
