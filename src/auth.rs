use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::Role,
    repository::{Repository, RepositoryState},
};

/// Header accepted in `Env::Local` in place of a session token.
pub const DEV_BYPASS_HEADER: &str = "x-user-id";

/// Claims
///
/// The subset of a Supabase access token this service relies on.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the `auth.users.id` of the caller, also the `profiles.id`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Identity
///
/// The authenticated principal resolved for a request. Carries no role: the role
/// is looked up separately so a missing assignment can be told apart from a
/// missing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
}

/// AuthUser
///
/// An identity together with its resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// GuardError
///
/// Why identity or role resolution refused a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("no valid session")]
    Unauthenticated,
    #[error("no role assigned")]
    NoRoleAssigned,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GuardError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required".to_string(),
            ),
            GuardError::NoRoleAssigned => (
                StatusCode::FORBIDDEN,
                "NO_ROLE_ASSIGNED",
                "No role assigned to this account".to_string(),
            ),
            GuardError::Unexpected(msg) => {
                tracing::error!(error = %msg, "identity resolution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

/// session_token
///
/// Pulls the access token from `Authorization: Bearer …`, falling back to the
/// session cookie set by `/login`.
pub fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(bearer.trim());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// decode_session
///
/// Validates the token signature and expiry. Problems with the token itself
/// mean the caller is unauthenticated; anything else (key or crypto setup) is
/// an unexpected failure.
pub fn decode_session(token: &str, secret: &str) -> Result<Claims, GuardError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    // Supabase sets `aud: "authenticated"`; the audience carries no meaning here.
    validation.validate_aud = false;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => {
                tracing::debug!(error = ?e, "rejected session token");
                Err(GuardError::Unauthenticated)
            }
            _ => Err(GuardError::Unexpected(e.to_string())),
        },
    }
}

/// resolve_identity
///
/// Resolves the caller of a request:
/// 1. `Env::Local` only: an `x-user-id` header naming an existing profile.
///    A failed profile lookup is `Unexpected`, not a fall-through.
/// 2. A session token from the `Authorization` header or session cookie.
pub async fn resolve_identity(
    headers: &HeaderMap,
    config: &AppConfig,
    repo: &dyn Repository,
) -> Result<Identity, GuardError> {
    if config.env == Env::Local {
        if let Some(user_id) = headers
            .get(DEV_BYPASS_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
        {
            // The bypassed id must still map to a real profile.
            match repo.get_profile(user_id).await {
                Ok(Some(profile)) => return Ok(Identity { id: profile.id }),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(%user_id, error = %e, "dev bypass profile lookup failed");
                    return Err(GuardError::Unexpected(e.to_string()));
                }
            }
        }
    }

    let token =
        session_token(headers, &config.session_cookie).ok_or(GuardError::Unauthenticated)?;
    let claims = decode_session(token, &config.jwt_secret)?;

    Ok(Identity { id: claims.sub })
}

/// resolve_role
///
/// Looks up the single role assigned to an identity. A missing profile, a
/// missing or unrecognised role string, and a failed lookup all count as no role.
pub async fn resolve_role(repo: &dyn Repository, identity: Identity) -> Result<Role, GuardError> {
    let profile = match repo.get_profile(identity.id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(user_id = %identity.id, error = %e, "role lookup failed");
            return Err(GuardError::NoRoleAssigned);
        }
    };

    let raw = profile
        .and_then(|p| p.role)
        .ok_or(GuardError::NoRoleAssigned)?;

    raw.parse::<Role>().map_err(|e| {
        tracing::warn!(user_id = %identity.id, error = %e, "unrecognised role");
        GuardError::NoRoleAssigned
    })
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        resolve_identity(&parts.headers, &config, repo.as_ref()).await
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        let repo = RepositoryState::from_ref(state);
        let role = resolve_role(repo.as_ref(), identity).await?;
        Ok(AuthUser {
            id: identity.id,
            role,
        })
    }
}
