#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, header};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use marketplace_portal::{
    AppState,
    auth::Claims,
    config::{AppConfig, Env},
    models::{
        BackgroundCheck, CreateBackgroundCheckRequest, CreateProviderRequest, CreateReviewRequest,
        Message, NewAnswerRecord, Profile, Provider, Review, SendMessageRequest,
    },
    presence::{ONLINE_CHANNEL, PresenceHub},
    repository::{RepoResult, Repository, RepositoryError},
    storage::MockStorageService,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::SystemTime,
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

/// Failure the mock's `insert_answers` should report instead of writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertFailure {
    UniqueViolation,
    Database,
}

/// MockRepo
///
/// In-memory repository that behaves like the Postgres schema for the parts the
/// guards care about (including the answer uniqueness constraint) and records
/// every call the tests assert on.
#[derive(Default)]
pub struct MockRepo {
    pub profiles: Mutex<HashMap<Uuid, Profile>>,
    pub providers: Mutex<Vec<Provider>>,
    pub answers: Mutex<Vec<NewAnswerRecord>>,
    pub reviews: Mutex<Vec<Review>>,
    pub messages: Mutex<Vec<Message>>,
    pub background_checks: Mutex<Vec<BackgroundCheck>>,

    pub insert_calls: Mutex<Vec<Vec<NewAnswerRecord>>>,
    pub exists_queries: Mutex<Vec<(i64, i64, Uuid)>>,

    pub fail_profile_lookup: bool,
    pub fail_provider_lookup: bool,
    pub fail_exists_check: bool,
    pub insert_failure: Option<InsertFailure>,
    // Simulates a concurrent writer: the pre-check never sees existing rows.
    pub hide_existing_answers: bool,
}

fn db_error() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, id: Uuid, role: Option<&str>) -> Self {
        self.profiles.lock().unwrap().insert(
            id,
            Profile {
                id,
                email: format!("{}@example.com", id.simple()),
                role: role.map(str::to_string),
            },
        );
        self
    }

    pub fn with_provider(self, user_id: Uuid, provider_id: Uuid) -> Self {
        self.providers.lock().unwrap().push(Provider {
            id: provider_id,
            user_id,
            business_name: "Acme Plumbing".to_string(),
            category: "Plumbing".to_string(),
            location: "Dublin".to_string(),
            description: None,
            created_at: Utc::now(),
        });
        self
    }

    pub fn with_answer(self, form_id: i64, service_id: i64, provider_id: Uuid) -> Self {
        self.answers.lock().unwrap().push(NewAnswerRecord {
            form_id,
            service_id,
            provider_id,
            answer: "existing".to_string(),
        });
        self
    }

    pub fn insert_call_count(&self) -> usize {
        self.insert_calls.lock().unwrap().len()
    }

    pub fn stored_answers(&self) -> Vec<NewAnswerRecord> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        if self.fail_profile_lookup {
            return Err(db_error());
        }
        Ok(self.profiles.lock().unwrap().get(&id).cloned())
    }

    async fn create_profile(&self, profile: Profile) -> RepoResult<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.contains_key(&profile.id) {
            return Err(RepositoryError::UniqueViolation("profiles_pkey".to_string()));
        }
        profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_provider_id_for_user(&self, user_id: Uuid) -> RepoResult<Option<Uuid>> {
        if self.fail_provider_lookup {
            return Err(db_error());
        }
        Ok(self
            .providers
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.id))
    }

    async fn create_provider(
        &self,
        user_id: Uuid,
        req: CreateProviderRequest,
    ) -> RepoResult<Provider> {
        let mut providers = self.providers.lock().unwrap();
        if providers.iter().any(|p| p.user_id == user_id) {
            return Err(RepositoryError::UniqueViolation("providers_user_id_key".to_string()));
        }
        let provider = Provider {
            id: Uuid::new_v4(),
            user_id,
            business_name: req.business_name,
            category: req.category,
            location: req.location,
            description: req.description,
            created_at: Utc::now(),
        };
        providers.push(provider.clone());
        Ok(provider)
    }

    async fn get_provider(&self, id: Uuid) -> Option<Provider> {
        self.providers.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }

    async fn list_providers(
        &self,
        category: Option<String>,
        location: Option<String>,
    ) -> Vec<Provider> {
        self.providers
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                category
                    .as_ref()
                    .is_none_or(|c| p.category.eq_ignore_ascii_case(c))
            })
            .filter(|p| {
                location
                    .as_ref()
                    .is_none_or(|l| p.location.to_lowercase().contains(&l.to_lowercase()))
            })
            .cloned()
            .collect()
    }

    async fn answer_exists(
        &self,
        form_id: i64,
        service_id: i64,
        provider_id: Uuid,
    ) -> RepoResult<bool> {
        self.exists_queries
            .lock()
            .unwrap()
            .push((form_id, service_id, provider_id));
        if self.fail_exists_check {
            return Err(db_error());
        }
        if self.hide_existing_answers {
            return Ok(false);
        }
        Ok(self.answers.lock().unwrap().iter().any(|a| {
            a.form_id == form_id && a.service_id == service_id && a.provider_id == provider_id
        }))
    }

    async fn insert_answers(&self, records: Vec<NewAnswerRecord>) -> RepoResult<u64> {
        self.insert_calls.lock().unwrap().push(records.clone());

        match self.insert_failure {
            Some(InsertFailure::Database) => return Err(db_error()),
            Some(InsertFailure::UniqueViolation) => {
                return Err(RepositoryError::UniqueViolation(
                    "uq_service_answers_triple".to_string(),
                ));
            }
            None => {}
        }

        // Same all-or-nothing behaviour as the composite unique constraint.
        let mut answers = self.answers.lock().unwrap();
        let mut seen: Vec<(i64, i64, Uuid)> = answers
            .iter()
            .map(|a| (a.form_id, a.service_id, a.provider_id))
            .collect();
        for record in &records {
            let key = (record.form_id, record.service_id, record.provider_id);
            if seen.contains(&key) {
                return Err(RepositoryError::UniqueViolation(
                    "uq_service_answers_triple".to_string(),
                ));
            }
            seen.push(key);
        }

        let count = records.len() as u64;
        answers.extend(records);
        Ok(count)
    }

    async fn add_review(
        &self,
        provider_id: Uuid,
        customer_id: Uuid,
        req: CreateReviewRequest,
    ) -> RepoResult<Review> {
        let mut reviews = self.reviews.lock().unwrap();
        let review = Review {
            id: reviews.len() as i64 + 1,
            provider_id,
            customer_id,
            rating: req.rating,
            comment: req.comment,
            created_at: Utc::now(),
        };
        reviews.push(review.clone());
        Ok(review)
    }

    async fn get_reviews(&self, provider_id: Uuid) -> Vec<Review> {
        self.reviews
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.provider_id == provider_id)
            .cloned()
            .collect()
    }

    async fn send_message(&self, sender_id: Uuid, req: SendMessageRequest) -> RepoResult<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            sender_id,
            recipient_id: req.recipient_id,
            body: req.body,
            is_read: false,
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn get_inbox(&self, user_id: Uuid) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.recipient_id == user_id)
            .cloned()
            .collect()
    }

    async fn mark_message_read(&self, id: Uuid, user_id: Uuid) -> bool {
        let mut messages = self.messages.lock().unwrap();
        match messages
            .iter_mut()
            .find(|m| m.id == id && m.recipient_id == user_id)
        {
            Some(message) => {
                message.is_read = true;
                true
            }
            None => false,
        }
    }

    async fn create_background_check(
        &self,
        provider_id: Uuid,
        req: CreateBackgroundCheckRequest,
    ) -> RepoResult<BackgroundCheck> {
        let check = BackgroundCheck {
            id: Uuid::new_v4(),
            provider_id,
            full_legal_name: req.full_legal_name,
            date_of_birth: req.date_of_birth,
            document_key: req.document_key,
            status: "pending".to_string(),
            created_at: Utc::now(),
        };
        self.background_checks.lock().unwrap().push(check.clone());
        Ok(check)
    }

    async fn get_latest_background_check(&self, provider_id: Uuid) -> Option<BackgroundCheck> {
        self.background_checks
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.provider_id == provider_id)
            .cloned()
    }
}

// --- State & Request Helpers ---

pub fn test_config(env: Env) -> AppConfig {
    AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn app_state(repo: Arc<MockRepo>, env: Env) -> AppState {
    let presence = PresenceHub::new()
        .open(ONLINE_CHANNEL)
        .expect("fresh hub has no open channels");
    AppState {
        repo,
        storage: Arc::new(MockStorageService::new()),
        presence: Arc::new(presence),
        config: test_config(env),
    }
}

/// Signs a token for `user_id` that expires `exp_offset` seconds from now
/// (negative offsets produce an already-expired token).
pub fn create_token(user_id: Uuid, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
        email: None,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

pub fn bearer_request(method: &str, uri: &str, user_id: Uuid, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", create_token(user_id, 3600)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}
