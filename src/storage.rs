use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Role, UploadPurpose},
};

/// StorageService
///
/// The contract for object storage. Handlers only ever ask for presigned upload URLs; the
/// file bytes go straight from the browser to the bucket.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if it is missing. Only called in `Env::Local` (MinIO).
    async fn ensure_bucket_exists(&self);

    /// get_presigned_upload_url
    ///
    /// Signs a PUT for `key`, pinned to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;
}

// Signed URLs stay valid for 10 minutes.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// S3StorageClient
///
/// `aws-sdk-s3` client pointed at MinIO locally or any S3-compatible endpoint in production.
/// Path-style addressing is forced because MinIO does not serve virtual-host buckets.
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
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL).map_err(|e| e.to_string())?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }
}

// --- Upload policy ---

impl UploadPurpose {
    /// Key prefix for objects uploaded for this purpose.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnails",
            Self::Avatar => "avatars",
            Self::ModuleContent => "modules",
            Self::Submission => "submissions",
        }
    }

    /// Course thumbnails and module material are catalog content.
    pub fn requires_admin(self) -> bool {
        matches!(self, Self::Thumbnail | Self::ModuleContent)
    }

    pub fn accepts(self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_ascii_lowercase();
        match self {
            Self::Thumbnail | Self::Avatar => content_type.starts_with("image/"),
            Self::ModuleContent => {
                content_type.starts_with("video/") || content_type == "application/pdf"
            }
            Self::Submission => !content_type.is_empty(),
        }
    }
}

/// authorize_upload
///
/// Checks the caller may upload for `purpose` and that the declared MIME type fits it.
pub fn authorize_upload(role: Role, purpose: UploadPurpose, content_type: &str) -> AppResult<()> {
    if purpose.requires_admin() && role != Role::Admin {
        return Err(AppError::Forbidden(
            "Only admins can upload course content".into(),
        ));
    }
    if !purpose.accepts(content_type) {
        return Err(AppError::BadRequest(format!(
            "File type {content_type} is not allowed for this upload"
        )));
    }
    Ok(())
}

/// upload_key
///
/// `<prefix>/<user>/<uuid>.<ext>`. Only the extension of the client's filename survives, and
/// only if it is plain alphanumeric.
pub fn upload_key(purpose: UploadPurpose, user_id: Uuid, filename: &str) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());

    format!(
        "{}/{}/{}.{}",
        purpose.prefix(),
        user_id,
        Uuid::new_v4(),
        extension
    )
}

/// Drops empty, `.` and `..` segments from a key.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-memory stand-in for tests. Returns deterministic URLs, or fails on demand.
#[derive(Clone, Default)]
pub struct MockStorageService {
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
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

/// StorageState
///
/// The shared storage handle carried in `AppState`.
pub type StorageState = Arc<dyn StorageService>;
