use crate::{
    AppState,
    answers::{SubmissionError, submit_answers},
    auth::{AuthUser, GuardError, Identity},
    config::Env,
    models::{
        AnswerEntry, BackgroundCheck, CreateBackgroundCheckRequest, CreateProviderRequest,
        CreateReviewRequest, LoginRequest, Message, PresignedUrlRequest, PresignedUrlResponse,
        Profile, Provider, RegisterUserRequest, Review, SendMessageRequest, SessionResponse,
        SubmitAnswersResponse, UserProfile,
    },
    presence::{PresenceEntry, TrackPresenceRequest},
    repository::RepositoryError,
    storage::{self, BACKGROUND_CHECK_PREFIX},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// ProviderFilter
///
/// Query parameters for provider discovery (GET /providers).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ProviderFilter {
    /// Exact service category, case-insensitive.
    pub category: Option<String>,
    /// Substring of the provider's location.
    pub location: Option<String>,
}

/// Minimal view of the Supabase sign-up response: just the new user's id.
#[derive(Deserialize)]
struct SupabaseAuthResponse {
    id: Uuid,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn supabase_endpoint(state: &AppState) -> Result<(String, String), StatusCode> {
    match (&state.config.supabase_url, &state.config.supabase_key) {
        (Some(url), Some(key)) => Ok((url.trim_end_matches('/').to_string(), key.clone())),
        _ => {
            tracing::error!("SUPABASE_URL / SUPABASE_KEY not configured");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Resolves the caller's provider id, mapping "not onboarded" to 404.
async fn caller_provider_id(state: &AppState, user_id: Uuid) -> Result<Uuid, StatusCode> {
    match state.repo.get_provider_id_for_user(user_id).await {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(%user_id, error = %e, "provider lookup failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// --- Identity & Session ---

/// register_user
///
/// [Public Route] Signs the user up with Supabase Auth, then mirrors the new
/// `auth.users.id` into `public.profiles` with the requested role.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "Registered", body = Profile),
        (status = 400, description = "Rejected by the auth provider")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<Profile>, StatusCode> {
    let (supabase_url, supabase_key) = supabase_endpoint(&state)?;

    let response = reqwest::Client::new()
        .post(format!("{}/auth/v1/signup", supabase_url))
        .header("apikey", supabase_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "supabase signup request failed");
            StatusCode::BAD_GATEWAY
        })?;

    if !response.status().is_success() {
        tracing::info!(status = %response.status(), "supabase rejected signup");
        return Err(StatusCode::BAD_REQUEST);
    }

    let supabase_user = response.json::<SupabaseAuthResponse>().await.map_err(|e| {
        tracing::error!(error = %e, "unexpected supabase signup response");
        StatusCode::BAD_GATEWAY
    })?;

    let profile = Profile {
        id: supabase_user.id,
        email: payload.email,
        role: Some(payload.role.as_str().to_string()),
    };

    match state.repo.create_profile(profile).await {
        Ok(created) => Ok(Json(created)),
        Err(RepositoryError::UniqueViolation(_)) => Err(StatusCode::CONFLICT),
        Err(e) => {
            tracing::error!(error = %e, "create_profile failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// login
///
/// [Public Route] Exchanges email/password for a Supabase session. The access
/// token is returned and also set as the session cookie the access guard reads.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (supabase_url, supabase_key) = supabase_endpoint(&state)?;

    let response = reqwest::Client::new()
        .post(format!("{}/auth/v1/token?grant_type=password", supabase_url))
        .header("apikey", supabase_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "supabase token request failed");
            StatusCode::BAD_GATEWAY
        })?;

    if !response.status().is_success() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let session = response.json::<SessionResponse>().await.map_err(|e| {
        tracing::error!(error = %e, "unexpected supabase token response");
        StatusCode::BAD_GATEWAY
    })?;

    let cookie = session_cookie(
        &state.config.session_cookie,
        &session.access_token,
        session.expires_in,
        state.config.env == Env::Production,
    );

    Ok(([(header::SET_COOKIE, cookie)], Json(session)))
}

/// session_cookie
///
/// Formats the `Set-Cookie` value for a freshly issued access token.
pub fn session_cookie(name: &str, token: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, token);
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// get_me
///
/// [Authenticated Route] The caller's profile, role and provider id (if onboarded).
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, role }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    let profile = state
        .repo
        .get_profile(id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %id, error = %e, "get_profile failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let provider_id = state.repo.get_provider_id_for_user(id).await.unwrap_or_else(|e| {
        tracing::warn!(user_id = %id, error = %e, "provider lookup failed");
        None
    });

    Ok(Json(UserProfile {
        id,
        email: profile.email,
        role,
        provider_id,
    }))
}

// --- Provider Discovery & Onboarding ---

/// list_providers
///
/// [Public Route] Discover providers by category and/or location.
#[utoipa::path(
    get,
    path = "/providers",
    params(ProviderFilter),
    responses((status = 200, description = "Matching providers", body = [Provider]))
)]
pub async fn list_providers(
    State(state): State<AppState>,
    Query(filter): Query<ProviderFilter>,
) -> Json<Vec<Provider>> {
    let providers = state
        .repo
        .list_providers(non_blank(filter.category), non_blank(filter.location))
        .await;
    Json(providers)
}

/// get_provider
///
/// [Public Route] A single provider's public profile.
#[utoipa::path(
    get,
    path = "/providers/{id}",
    params(("id" = Uuid, Path, description = "Provider ID")),
    responses(
        (status = 200, description = "Found", body = Provider),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Provider>, StatusCode> {
    state
        .repo
        .get_provider(id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// onboard_provider
///
/// [Professional Route] Creates the caller's provider record. Each identity may
/// onboard once; a second attempt is a 409.
#[utoipa::path(
    post,
    path = "/professional/onboarding",
    request_body = CreateProviderRequest,
    responses(
        (status = 201, description = "Onboarded", body = Provider),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Already onboarded")
    )
)]
pub async fn onboard_provider(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<Provider>), StatusCode> {
    let required = [&payload.business_name, &payload.category, &payload.location];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let request = CreateProviderRequest {
        business_name: payload.business_name.trim().to_string(),
        category: payload.category.trim().to_string(),
        location: payload.location.trim().to_string(),
        description: non_blank(payload.description),
    };

    match state.repo.create_provider(id, request).await {
        Ok(provider) => {
            tracing::info!(user_id = %id, provider_id = %provider.id, "provider onboarded");
            Ok((StatusCode::CREATED, Json(provider)))
        }
        Err(RepositoryError::UniqueViolation(_)) => Err(StatusCode::CONFLICT),
        Err(e) => {
            tracing::error!(user_id = %id, error = %e, "create_provider failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// --- Service Intake Answers ---

fn submission_status(err: &SubmissionError) -> StatusCode {
    match err {
        SubmissionError::Unauthenticated => StatusCode::UNAUTHORIZED,
        SubmissionError::ProviderNotFound => StatusCode::NOT_FOUND,
        SubmissionError::EmptyBatch
        | SubmissionError::BatchTooLarge
        | SubmissionError::InvalidPayload => StatusCode::BAD_REQUEST,
        SubmissionError::DuplicateSubmission => StatusCode::CONFLICT,
        SubmissionError::WriteFailed | SubmissionError::Unexpected => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// submit_service_answers
///
/// [Professional Route] Stores a batch of intake answers for the caller's provider.
/// Always answers with `{success, error?}`; `error` is the message to show the user.
#[utoipa::path(
    post,
    path = "/professional/answers",
    request_body = [AnswerEntry],
    responses(
        (status = 200, description = "Stored", body = SubmitAnswersResponse),
        (status = 400, description = "Empty, oversized or unreadable batch", body = SubmitAnswersResponse),
        (status = 401, description = "No session", body = SubmitAnswersResponse),
        (status = 404, description = "No provider profile", body = SubmitAnswersResponse),
        (status = 409, description = "Already submitted", body = SubmitAnswersResponse)
    )
)]
pub async fn submit_service_answers(
    identity: Result<Identity, GuardError>,
    State(state): State<AppState>,
    body: Result<Json<Vec<AnswerEntry>>, JsonRejection>,
) -> (StatusCode, Json<SubmitAnswersResponse>) {
    let result = match (identity, body) {
        (Ok(identity), Ok(Json(entries))) => {
            submit_answers(state.repo.as_ref(), identity.id, entries).await
        }
        (Err(GuardError::Unauthenticated), _) => Err(SubmissionError::Unauthenticated),
        (Err(e), _) => {
            tracing::error!(error = %e, "identity resolution failed during submission");
            Err(SubmissionError::Unexpected)
        }
        (Ok(identity), Err(rejection)) => {
            tracing::debug!(user_id = %identity.id, error = %rejection.body_text(), "unreadable answer batch");
            Err(SubmissionError::InvalidPayload)
        }
    };

    match result {
        Ok(_) => (StatusCode::OK, Json(SubmitAnswersResponse::ok())),
        Err(err) => (submission_status(&err), Json(err.into())),
    }
}

// --- Reviews ---

/// create_review
///
/// [Customer Route] Rates a provider from 1 to 5.
#[utoipa::path(
    post,
    path = "/customer/providers/{id}/reviews",
    params(("id" = Uuid, Path, description = "Provider ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Provider not found")
    )
)]
pub async fn create_review(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), StatusCode> {
    if !(1..=5).contains(&payload.rating) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if state.repo.get_provider(provider_id).await.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let request = CreateReviewRequest {
        rating: payload.rating,
        comment: payload.comment.trim().to_string(),
    };

    state
        .repo
        .add_review(provider_id, id, request)
        .await
        .map(|review| (StatusCode::CREATED, Json(review)))
        .map_err(|e| {
            tracing::error!(%provider_id, error = %e, "add_review failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// get_provider_reviews
///
/// [Public Route] Reviews for a provider, newest first.
#[utoipa::path(
    get,
    path = "/providers/{id}/reviews",
    params(("id" = Uuid, Path, description = "Provider ID")),
    responses((status = 200, description = "Reviews", body = [Review]))
)]
pub async fn get_provider_reviews(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> Json<Vec<Review>> {
    Json(state.repo.get_reviews(provider_id).await)
}

// --- Messaging ---

/// send_message
///
/// [Authenticated Route] Sends a direct message to another user.
#[utoipa::path(
    post,
    path = "/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Sent", body = Message),
        (status = 400, description = "Empty body or self-addressed"),
        (status = 404, description = "Recipient not found")
    )
)]
pub async fn send_message(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), StatusCode> {
    let body = payload.body.trim();
    if body.is_empty() || payload.recipient_id == id {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.repo.get_profile(payload.recipient_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(error = %e, "recipient lookup failed");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    let request = SendMessageRequest {
        recipient_id: payload.recipient_id,
        body: body.to_string(),
    };

    state
        .repo
        .send_message(id, request)
        .await
        .map(|message| (StatusCode::CREATED, Json(message)))
        .map_err(|e| {
            tracing::error!(sender_id = %id, error = %e, "send_message failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// get_inbox
///
/// [Authenticated Route] Messages addressed to the caller, newest first.
#[utoipa::path(
    get,
    path = "/inbox",
    responses((status = 200, description = "Inbox", body = [Message]))
)]
pub async fn get_inbox(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Message>> {
    Json(state.repo.get_inbox(id).await)
}

/// mark_message_read
///
/// [Authenticated Route] Marks one of the caller's received messages as read.
#[utoipa::path(
    patch,
    path = "/messages/{id}/read",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn mark_message_read(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if state.repo.mark_message_read(id, user_id).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Background Checks ---

/// get_background_check_upload_url
///
/// [Professional Route] Presigned PUT URL for the identity document of a
/// background check. The key is scoped under the caller's provider id.
#[utoipa::path(
    post,
    path = "/professional/background-check/upload",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 404, description = "Caller has not onboarded")
    )
)]
pub async fn get_background_check_upload_url(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, StatusCode> {
    let provider_id = caller_provider_id(&state, id).await?;
    let object_key = storage::document_key(provider_id, &payload.filename);

    match state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
    {
        Ok(url) => Ok(Json(PresignedUrlResponse {
            upload_url: url,
            resource_key: object_key,
        })),
        Err(e) => {
            tracing::error!(%provider_id, error = %e, "presign failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// create_background_check
///
/// [Professional Route] Records a background-check intake as `pending`.
/// The document key must come from this provider's upload prefix.
#[utoipa::path(
    post,
    path = "/professional/background-check",
    request_body = CreateBackgroundCheckRequest,
    responses(
        (status = 201, description = "Submitted", body = BackgroundCheck),
        (status = 400, description = "Invalid intake"),
        (status = 404, description = "Caller has not onboarded")
    )
)]
pub async fn create_background_check(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBackgroundCheckRequest>,
) -> Result<(StatusCode, Json<BackgroundCheck>), StatusCode> {
    let provider_id = caller_provider_id(&state, id).await?;

    let expected_prefix = format!("{}/{}/", BACKGROUND_CHECK_PREFIX, provider_id);
    let document_key = storage::sanitize_key(&payload.document_key);
    if payload.full_legal_name.trim().is_empty() || !document_key.starts_with(&expected_prefix) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let request = CreateBackgroundCheckRequest {
        full_legal_name: payload.full_legal_name.trim().to_string(),
        date_of_birth: payload.date_of_birth,
        document_key,
    };

    state
        .repo
        .create_background_check(provider_id, request)
        .await
        .map(|check| {
            tracing::info!(%provider_id, check_id = %check.id, "background check submitted");
            (StatusCode::CREATED, Json(check))
        })
        .map_err(|e| {
            tracing::error!(%provider_id, error = %e, "create_background_check failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// get_background_check
///
/// [Professional Route] The caller's most recent background-check intake.
#[utoipa::path(
    get,
    path = "/professional/background-check",
    responses(
        (status = 200, description = "Latest intake", body = BackgroundCheck),
        (status = 404, description = "None submitted")
    )
)]
pub async fn get_background_check(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BackgroundCheck>, StatusCode> {
    let provider_id = caller_provider_id(&state, id).await?;
    state
        .repo
        .get_latest_background_check(provider_id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// --- Presence ---

/// track_presence
///
/// [Authenticated Route] Marks the caller online (or away/busy).
#[utoipa::path(
    post,
    path = "/presence",
    request_body = TrackPresenceRequest,
    responses((status = 200, description = "Tracked", body = PresenceEntry))
)]
pub async fn track_presence(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<TrackPresenceRequest>,
) -> Json<PresenceEntry> {
    Json(state.presence.track(id, payload.status))
}

/// leave_presence
///
/// [Authenticated Route] Removes the caller from the online set.
#[utoipa::path(
    delete,
    path = "/presence",
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Was not tracked")
    )
)]
pub async fn leave_presence(AuthUser { id, .. }: AuthUser, State(state): State<AppState>) -> StatusCode {
    if state.presence.untrack(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// get_presence
///
/// [Authenticated Route] Everyone currently online.
#[utoipa::path(
    get,
    path = "/presence",
    responses((status = 200, description = "Online users", body = [PresenceEntry]))
)]
pub async fn get_presence(_user: AuthUser, State(state): State<AppState>) -> Json<Vec<PresenceEntry>> {
    Json(state.presence.sync())
}
