//! AWS S3 backend.

use crate::services::object_store::{ObjectStore, SigningError, StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use std::{path::Path, time::Duration};

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    default_bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, default_bucket: impl Into<String>) -> Self {
        Self {
            client,
            default_bucket: default_bucket.into(),
        }
    }

    /// Build a client from the default AWS credential chain.
    ///
    /// With a custom `endpoint` (MinIO and other S3-compatible stores),
    /// path-style addressing is forced.
    pub async fn connect(region: &str, endpoint: Option<&str>, bucket: &str) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()));
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = S3ConfigBuilder::from(&sdk_config)
            .force_path_style(endpoint.is_some())
            .build();

        tracing::info!(region, endpoint = ?endpoint, bucket, "S3 client configured");
        Self::new(Client::from_conf(s3_config), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: format!("reading {}: {}", path.display(), e),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket,
                    key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::Upload {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message: e.to_string(),
                }
            })?;

        tracing::info!(
            bucket,
            key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, SigningError> {
        let presigning_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|e| SigningError::Config(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| SigningError::Backend(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn check(&self) -> Result<(), String> {
        self.client
            .head_bucket()
            .bucket(&self.default_bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
