use crate::models::{
    BackgroundCheck, CreateBackgroundCheckRequest, CreateProviderRequest, CreateReviewRequest,
    Message, NewAnswerRecord, Profile, Provider, Review, SendMessageRequest,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Postgres SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Unique-constraint violations are
/// split out because callers treat them as a business outcome (duplicate), not
/// as an infrastructure failure.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return RepositoryError::UniqueViolation(constraint);
            }
        }
        RepositoryError::Database(err)
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers and guards
/// only ever see `Arc<dyn Repository>`, so tests swap in hand-written mocks.
///
/// Lookups the guards depend on return `RepoResult` so a store failure can be
/// told apart from "no row". Listing endpoints log and degrade to empty results.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity / Roles ---
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>>;
    async fn create_profile(&self, profile: Profile) -> RepoResult<Profile>;

    // --- Providers ---
    // `maybeSingle` semantics: Ok(None) when the identity has not onboarded.
    async fn get_provider_id_for_user(&self, user_id: Uuid) -> RepoResult<Option<Uuid>>;
    async fn create_provider(&self, user_id: Uuid, req: CreateProviderRequest)
    -> RepoResult<Provider>;
    async fn get_provider(&self, id: Uuid) -> Option<Provider>;
    async fn list_providers(&self, category: Option<String>, location: Option<String>)
    -> Vec<Provider>;

    // --- Service intake answers ---
    async fn answer_exists(&self, form_id: i64, service_id: i64, provider_id: Uuid)
    -> RepoResult<bool>;
    // Single statement: either every record is written or none is.
    async fn insert_answers(&self, records: Vec<NewAnswerRecord>) -> RepoResult<u64>;

    // --- Reviews ---
    async fn add_review(
        &self,
        provider_id: Uuid,
        customer_id: Uuid,
        req: CreateReviewRequest,
    ) -> RepoResult<Review>;
    async fn get_reviews(&self, provider_id: Uuid) -> Vec<Review>;

    // --- Messaging ---
    async fn send_message(&self, sender_id: Uuid, req: SendMessageRequest) -> RepoResult<Message>;
    async fn get_inbox(&self, user_id: Uuid) -> Vec<Message>;
    // Recipient-only: returns false when the message is missing or not addressed to `user_id`.
    async fn mark_message_read(&self, id: Uuid, user_id: Uuid) -> bool;

    // --- Background checks ---
    async fn create_background_check(
        &self,
        provider_id: Uuid,
        req: CreateBackgroundCheckRequest,
    ) -> RepoResult<BackgroundCheck>;
    async fn get_latest_background_check(&self, provider_id: Uuid) -> Option<BackgroundCheck>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT id, email, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// create_profile
    ///
    /// Creates the mirroring profile record in `public.profiles` after external sign-up.
    async fn create_profile(&self, profile: Profile) -> RepoResult<Profile> {
        let created = sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (id, email, role) VALUES ($1, $2, $3) RETURNING id, email, role",
        )
        .bind(profile.id)
        .bind(profile.email)
        .bind(profile.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_provider_id_for_user(&self, user_id: Uuid) -> RepoResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM providers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// create_provider
    ///
    /// Onboards the identity as a provider. The `user_id` unique constraint makes a
    /// second onboarding attempt surface as `UniqueViolation`.
    async fn create_provider(
        &self,
        user_id: Uuid,
        req: CreateProviderRequest,
    ) -> RepoResult<Provider> {
        let provider = sqlx::query_as::<_, Provider>(
            r#"
            INSERT INTO providers (id, user_id, business_name, category, location, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, user_id, business_name, category, location, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(req.business_name)
        .bind(req.category)
        .bind(req.location)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(provider)
    }

    async fn get_provider(&self, id: Uuid) -> Option<Provider> {
        sqlx::query_as::<_, Provider>(
            r#"SELECT id, user_id, business_name, category, location, description, created_at
               FROM providers WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_provider error: {:?}", e);
            None
        })
    }

    /// list_providers
    ///
    /// Discovery listing. Category matches exactly (case-insensitive), location is a
    /// substring match. Both filters are bound parameters.
    async fn list_providers(
        &self,
        category: Option<String>,
        location: Option<String>,
    ) -> Vec<Provider> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT id, user_id, business_name, category, location, description, created_at
            FROM providers
            WHERE 1 = 1
            "#,
        );

        if let Some(c) = category {
            builder.push(" AND LOWER(category) = LOWER(");
            builder.push_bind(c);
            builder.push(")");
        }

        if let Some(l) = location {
            // Literal substring match: `%` and `_` in the filter carry no meaning.
            builder.push(" AND POSITION(LOWER(");
            builder.push_bind(l);
            builder.push(") IN LOWER(location)) > 0");
        }

        builder.push(" ORDER BY business_name ASC");

        match builder.build_query_as::<Provider>().fetch_all(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("list_providers error: {:?}", e);
                vec![]
            }
        }
    }

    async fn answer_exists(
        &self,
        form_id: i64,
        service_id: i64,
        provider_id: Uuid,
    ) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                   SELECT 1 FROM service_answers
                   WHERE form_id = $1 AND service_id = $2 AND provider_id = $3
               )"#,
        )
        .bind(form_id)
        .bind(service_id)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// insert_answers
    ///
    /// Writes the whole batch as one multi-row INSERT. The
    /// `uq_service_answers_triple` constraint rejects the statement if any row
    /// duplicates an existing (form, service, provider) triple.
    async fn insert_answers(&self, records: Vec<NewAnswerRecord>) -> RepoResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO service_answers (form_id, service_id, provider_id, answer) ",
        );
        builder.push_values(records, |mut row, record| {
            row.push_bind(record.form_id)
                .push_bind(record.service_id)
                .push_bind(record.provider_id)
                .push_bind(record.answer);
        });

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn add_review(
        &self,
        provider_id: Uuid,
        customer_id: Uuid,
        req: CreateReviewRequest,
    ) -> RepoResult<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (provider_id, customer_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, provider_id, customer_id, rating, comment, created_at
            "#,
        )
        .bind(provider_id)
        .bind(customer_id)
        .bind(req.rating)
        .bind(req.comment)
        .fetch_one(&self.pool)
        .await?;
        Ok(review)
    }

    async fn get_reviews(&self, provider_id: Uuid) -> Vec<Review> {
        sqlx::query_as::<_, Review>(
            r#"SELECT id, provider_id, customer_id, rating, comment, created_at
               FROM reviews WHERE provider_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_reviews error: {:?}", e);
            vec![]
        })
    }

    async fn send_message(&self, sender_id: Uuid, req: SendMessageRequest) -> RepoResult<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, body, is_read, created_at)
            VALUES ($1, $2, $3, $4, false, NOW())
            RETURNING id, sender_id, recipient_id, body, is_read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sender_id)
        .bind(req.recipient_id)
        .bind(req.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn get_inbox(&self, user_id: Uuid) -> Vec<Message> {
        sqlx::query_as::<_, Message>(
            r#"SELECT id, sender_id, recipient_id, body, is_read, created_at
               FROM messages WHERE recipient_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_inbox error: {:?}", e);
            vec![]
        })
    }

    async fn mark_message_read(&self, id: Uuid, user_id: Uuid) -> bool {
        let result = sqlx::query("UPDATE messages SET is_read = true WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(r) => r.rows_affected() > 0,
            Err(e) => {
                tracing::error!("mark_message_read error: {:?}", e);
                false
            }
        }
    }

    async fn create_background_check(
        &self,
        provider_id: Uuid,
        req: CreateBackgroundCheckRequest,
    ) -> RepoResult<BackgroundCheck> {
        let check = sqlx::query_as::<_, BackgroundCheck>(
            r#"
            INSERT INTO background_checks (id, provider_id, full_legal_name, date_of_birth, document_key, status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', NOW())
            RETURNING id, provider_id, full_legal_name, date_of_birth, document_key, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(provider_id)
        .bind(req.full_legal_name)
        .bind(req.date_of_birth)
        .bind(req.document_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(check)
    }

    async fn get_latest_background_check(&self, provider_id: Uuid) -> Option<BackgroundCheck> {
        sqlx::query_as::<_, BackgroundCheck>(
            r#"SELECT id, provider_id, full_legal_name, date_of_birth, document_key, status, created_at
               FROM background_checks WHERE provider_id = $1
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_latest_background_check error: {:?}", e);
            None
        })
    }
}
