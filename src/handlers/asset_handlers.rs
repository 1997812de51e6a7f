//! Serves objects held by the local backend through signed, expiring URLs.
//! Streams payloads to avoid buffering in memory.

use crate::{
    errors::AppError,
    models::object::StoredObject,
    services::object_store::{SigningError, StorageError},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// `GET /assets/{bucket}/{*key}?expires=&signature=`
pub async fn get_asset(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, AppError> {
    let store = state
        .local_store
        .as_ref()
        .ok_or_else(|| AppError::not_found("assets are not served by this backend"))?;

    store
        .verify_signature(&bucket, &key, q.expires, &q.signature)
        .map_err(|err| match err {
            SigningError::Expired => AppError::new(StatusCode::FORBIDDEN, "URL has expired"),
            SigningError::BadSignature => {
                AppError::new(StatusCode::FORBIDDEN, "signature does not match")
            }
            other => AppError::internal(other.to_string()),
        })?;

    let (meta, file) = store
        .get_object_reader(&bucket, &key)
        .await
        .map_err(|err| match err {
            StorageError::ObjectNotFound { .. } => AppError::not_found(err.to_string()),
            StorageError::InvalidObjectKey | StorageError::InvalidBucketName { .. } => {
                AppError::bad_request(err.to_string())
            }
            other => {
                tracing::error!(error = %other, %bucket, %key, "failed to open stored object");
                AppError::internal("couldn't read object")
            }
        })?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);

    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0) as u64),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
