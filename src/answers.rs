//! Service-intake answer submission.
//!
//! A provider submits a batch of answers; each (form, service) pair may be
//! answered at most once per provider. The batch is all-or-nothing.

use futures::future::try_join_all;
use uuid::Uuid;

use crate::{
    models::{AnswerEntry, NewAnswerRecord, SubmitAnswersResponse},
    repository::{Repository, RepositoryError},
};

/// Upper bound on entries per submission. Each row binds four parameters and
/// Postgres caps a statement at 65535.
pub const MAX_BATCH_ENTRIES: usize = 500;

/// SubmissionError
///
/// The `Display` text of each variant is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("You must be logged in to submit answers.")]
    Unauthenticated,
    #[error("No provider profile was found for your account.")]
    ProviderNotFound,
    #[error("No answers were provided.")]
    EmptyBatch,
    #[error("Too many answers in one submission (at most {}).", MAX_BATCH_ENTRIES)]
    BatchTooLarge,
    #[error("The submitted answers could not be read.")]
    InvalidPayload,
    #[error("You have already submitted answers for this service.")]
    DuplicateSubmission,
    #[error("Failed to save your answers. Please try again.")]
    WriteFailed,
    #[error("An unexpected error occurred.")]
    Unexpected,
}

impl From<SubmissionError> for SubmitAnswersResponse {
    fn from(err: SubmissionError) -> Self {
        SubmitAnswersResponse {
            success: false,
            error: Some(err.to_string()),
        }
    }
}

impl SubmitAnswersResponse {
    pub fn ok() -> Self {
        SubmitAnswersResponse {
            success: true,
            error: None,
        }
    }
}

/// submit_answers
///
/// Stores a batch of answers for the provider bound to `user_id`.
///
/// Duplicate checks for all entries run concurrently before any write. If any
/// entry already has a record the whole batch is rejected. The insert itself is
/// a single statement guarded by the store's uniqueness constraint, so a race
/// that slips past the pre-check still comes back as `DuplicateSubmission`.
pub async fn submit_answers(
    repo: &dyn Repository,
    user_id: Uuid,
    entries: Vec<AnswerEntry>,
) -> Result<u64, SubmissionError> {
    if entries.is_empty() {
        return Err(SubmissionError::EmptyBatch);
    }
    if entries.len() > MAX_BATCH_ENTRIES {
        return Err(SubmissionError::BatchTooLarge);
    }

    let provider_id = match repo.get_provider_id_for_user(user_id).await {
        Ok(Some(id)) => id,
        Ok(None) => return Err(SubmissionError::ProviderNotFound),
        Err(e) => {
            tracing::error!(%user_id, error = %e, "provider lookup failed");
            return Err(SubmissionError::Unexpected);
        }
    };

    let checks = entries
        .iter()
        .map(|entry| repo.answer_exists(entry.form_id, entry.service_id, provider_id));
    let existing = try_join_all(checks).await.map_err(|e| {
        tracing::error!(%provider_id, error = %e, "duplicate check failed");
        SubmissionError::Unexpected
    })?;

    if existing.into_iter().any(|exists| exists) {
        tracing::info!(%provider_id, "rejected duplicate answer submission");
        return Err(SubmissionError::DuplicateSubmission);
    }

    let records = entries
        .into_iter()
        .map(|entry| {
            Ok(NewAnswerRecord {
                form_id: entry.form_id,
                service_id: entry.service_id,
                provider_id,
                answer: entry.answer.to_stored()?,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()
        .map_err(|e| {
            tracing::error!(error = %e, "failed to encode answer list");
            SubmissionError::Unexpected
        })?;

    match repo.insert_answers(records).await {
        Ok(rows) => {
            tracing::info!(%provider_id, rows, "stored service answers");
            Ok(rows)
        }
        Err(RepositoryError::UniqueViolation(constraint)) => {
            tracing::info!(%provider_id, %constraint, "answer insert hit uniqueness constraint");
            Err(SubmissionError::DuplicateSubmission)
        }
        Err(e) => {
            tracing::error!(%provider_id, error = %e, "answer insert failed");
            Err(SubmissionError::WriteFailed)
        }
    }
}
