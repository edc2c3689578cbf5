use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles ---

/// Role
///
/// The closed set of roles a profile may hold. Stored as free text in
/// `public.profiles.role`; parsing is case-insensitive and anything outside
/// this set is treated as "no role assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Customer,
    Professional,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Professional => "professional",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored or configured role string is not a known [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("customer") {
            Ok(Role::Customer)
        } else if trimmed.eq_ignore_ascii_case("professional") {
            Ok(Role::Professional)
        } else {
            Err(UnknownRole(s.to_string()))
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// Profile
///
/// The role assignment for an identity, stored in `public.profiles`.
/// The `role` column is nullable: a freshly signed-up user may not have one yet.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    // Primary Key, also the Foreign Key to the external auth.users table.
    pub id: Uuid,
    pub email: String,
    pub role: Option<String>,
}

/// Provider
///
/// A service-provider business, linked one-to-one with an identity through `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Provider {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub category: String,
    pub location: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// AnswerScalar
///
/// One answer value as sent by the intake form: text, a yes/no toggle, or a number.
/// Nulls and objects are not answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum AnswerScalar {
    Text(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl AnswerScalar {
    /// Text is stored verbatim; booleans and numbers as their JSON literal.
    pub fn to_stored(&self) -> String {
        match self {
            AnswerScalar::Text(value) => value.clone(),
            AnswerScalar::Bool(value) => value.to_string(),
            AnswerScalar::Integer(value) => value.to_string(),
            AnswerScalar::Float(value) => value.to_string(),
        }
    }
}

/// AnswerValue
///
/// A single intake answer. Multi-select questions send a list; everything else
/// a single scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum AnswerValue {
    List(Vec<AnswerScalar>),
    Scalar(AnswerScalar),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Scalar(AnswerScalar::Text(value.into()))
    }

    pub fn texts<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::List(
            values
                .into_iter()
                .map(|v| AnswerScalar::Text(v.into()))
                .collect(),
        )
    }

    /// The textual form written to `service_answers.answer`.
    /// Lists become their JSON encoding, scalars are stored as-is.
    pub fn to_stored(&self) -> Result<String, serde_json::Error> {
        match self {
            AnswerValue::Scalar(value) => Ok(value.to_stored()),
            AnswerValue::List(values) => serde_json::to_string(values),
        }
    }
}

/// AnswerEntry
///
/// One element of a submission batch (POST /professional/answers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AnswerEntry {
    pub form_id: i64,
    pub service_id: i64,
    pub answer: AnswerValue,
}

/// NewAnswerRecord
///
/// A row ready for insertion into `public.service_answers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswerRecord {
    pub form_id: i64,
    pub service_id: i64,
    pub provider_id: Uuid,
    pub answer: String,
}

/// SubmitAnswersResponse
///
/// Result envelope of the answer submission endpoint.
/// `error` carries the human-readable classification and is omitted on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmitAnswersResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Review
///
/// A customer's rating of a provider, from `public.reviews`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub id: i64,
    pub provider_id: Uuid,
    pub customer_id: Uuid,
    pub rating: i16,
    pub comment: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Message
///
/// A direct message between two profiles, from `public.messages`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub is_read: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// BackgroundCheck
///
/// A background-check intake record. `status` starts as "pending" and is
/// advanced by the external vetting process.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct BackgroundCheck {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub full_legal_name: String,
    #[ts(type = "string")]
    pub date_of_birth: NaiveDate,
    pub document_key: String,
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for POST /register. The password is forwarded to Supabase
/// and never persisted or logged by this service.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// LoginRequest
///
/// Credentials exchanged for a session at POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// SessionResponse
///
/// The session issued by the auth provider. The access token is also set as
/// the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// CreateProviderRequest
///
/// Onboarding payload (POST /professional/onboarding).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProviderRequest {
    pub business_name: String,
    pub category: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CreateReviewRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

/// SendMessageRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub body: String,
}

/// CreateBackgroundCheckRequest
///
/// `document_key` is the object key returned by the presigned upload flow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateBackgroundCheckRequest {
    pub full_legal_name: String,
    #[ts(type = "string")]
    pub date_of_birth: NaiveDate,
    pub document_key: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a background-check document.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "drivers_license.pdf")]
    pub filename: String,
    /// The MIME type the upload is constrained to.
    #[schema(example = "application/pdf")]
    pub file_type: String,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key to reference in the background-check intake.
    pub resource_key: String,
}

/// --- Profile Schemas (Output) ---

/// UserProfile
///
/// Output schema for GET /me.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    /// The caller's provider id, when they have onboarded as a professional.
    pub provider_id: Option<Uuid>,
}
