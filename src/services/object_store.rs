//! The object store capability the upload pipeline writes to and the access
//! generator signs URLs against.

use async_trait::async_trait;
use std::{io, path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("upload of `{key}` to bucket `{bucket}` failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid presign configuration: {0}")]
    Config(String),
    #[error("object store could not sign request: {0}")]
    Backend(String),
    #[error("signature does not match")]
    BadSignature,
    #[error("signed URL has expired")]
    Expired,
}

/// Durable storage for processed videos.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the contents of the local file `path` under `(bucket, key)`.
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// A URL granting direct GET access to `(bucket, key)` for `expires_in`.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, SigningError>;

    /// Cheap connectivity check for readiness probes.
    async fn check(&self) -> Result<(), String> {
        Ok(())
    }
}
