use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Presigned upload URLs expire after ten minutes.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// Object key prefix for background-check identity documents.
pub const BACKGROUND_CHECK_PREFIX: &str = "background-checks";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid presigning configuration: {0}")]
    Config(String),
    #[error("failed to presign upload: {0}")]
    Presign(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Object storage used by background-check intake. The S3 client and the
/// in-memory mock both implement it so handlers never see the SDK.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if missing. Used for the local MinIO setup.
    async fn ensure_bucket_exists(&self);

    /// Returns a time-limited URL the client can PUT `key` to directly.
    /// The upload is constrained to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

// 2. The Real Implementation (S3/MinIO/Supabase)
/// S3StorageClient
///
/// AWS SDK client pointed at MinIO locally and at Supabase Storage in production.
/// Both need path-style addressing.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // CRITICAL: path-style addressing (http://endpoint/bucket/key). MinIO and
            // the Supabase Storage gateway reject virtual-hosted style.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            // Already-exists errors land here too.
            tracing::debug!(bucket = %self.bucket_name, error = ?e, "create_bucket returned an error");
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        // Expiry is fixed at 10 minutes.
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            // CRITICAL SECURITY: the client's PUT must carry this exact Content-Type.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

// 3. Object Keys
/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a user-supplied name cannot escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// document_key
///
/// Builds a unique object key for a provider's background-check document,
/// keeping only the extension of the original filename.
pub fn document_key(provider_id: Uuid, filename: &str) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!(
        "{}/{}/{}.{}",
        BACKGROUND_CHECK_PREFIX,
        provider_id,
        Uuid::new_v4(),
        extension.to_ascii_lowercase()
    )
}

// 4. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory stand-in used by tests; returns deterministic URLs.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every presign call fails.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Presign("mock storage failure".to_string()));
        }

        // Deterministic, local-style URL for assertions.
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
