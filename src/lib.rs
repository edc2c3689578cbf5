use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod access;
pub mod answers;
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod repository;
pub mod storage;

pub mod routes;
use auth::AuthUser;
use routes::{authenticated, customer, professional, public};

// --- Public Re-exports ---

pub use access::{AccessDecision, RoutePolicy, access_guard, check_access};
pub use answers::{SubmissionError, submit_answers};
pub use config::AppConfig;
pub use presence::{PresenceHub, PresenceState};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every annotated handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_me,
        handlers::list_providers, handlers::get_provider, handlers::onboard_provider,
        handlers::submit_service_answers, handlers::create_review, handlers::get_provider_reviews,
        handlers::send_message, handlers::get_inbox, handlers::mark_message_read,
        handlers::get_background_check_upload_url, handlers::create_background_check,
        handlers::get_background_check, handlers::track_presence, handlers::leave_presence,
        handlers::get_presence
    ),
    components(
        schemas(
            models::Role, models::Profile, models::Provider, models::AnswerScalar, models::AnswerValue,
            models::AnswerEntry, models::SubmitAnswersResponse, models::Review, models::Message,
            models::BackgroundCheck, models::RegisterUserRequest, models::LoginRequest,
            models::SessionResponse, models::CreateProviderRequest, models::CreateReviewRequest,
            models::SendMessageRequest, models::CreateBackgroundCheckRequest,
            models::PresignedUrlRequest, models::PresignedUrlResponse, models::UserProfile,
            presence::PresenceStatus, presence::PresenceEntry, presence::TrackPresenceRequest,
        )
    ),
    tags(
        (name = "marketplace", description = "Service Marketplace API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into
/// every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production, mocks in tests).
    pub repo: RepositoryState,
    /// Object storage for background-check documents.
    pub storage: StorageState,
    /// The process-wide online presence channel.
    pub presence: PresenceState,
    /// Immutable configuration loaded at startup, including the route policy.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for PresenceState {
    fn from_ref(app_state: &AppState) -> PresenceState {
        app_state.presence.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Requires a resolvable `AuthUser` for the authenticated routes. Extraction
/// failure rejects the request before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles routes, the access guard, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest("/customer", customer::customer_routes())
        .nest("/professional", professional::professional_routes())
        // Role gate for every configured path prefix. Paths outside the policy pass through.
        .layer(middleware::from_fn_with_state(state.clone(), access_guard))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request, tagged with method, uri and the `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
