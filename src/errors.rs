use crate::{
    auth::AuthError,
    services::{
        media_probe::ProbeError,
        object_key::InvalidReferenceError,
        object_store::{SigningError, StorageError},
        remux::RemuxError,
    },
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use uuid::Uuid;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Every way a video request can fail, from credential checks through the
/// processing pipeline to the final metadata write.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("you don't own video {0}")]
    NotOwner(Uuid),
    #[error("video {0} not found")]
    VideoNotFound(Uuid),
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("malformed multipart body: {0}")]
    Multipart(String),
    #[error("missing form field `{0}`")]
    MissingField(&'static str),
    #[error("could not parse media type `{0}`")]
    InvalidContentType(String),
    #[error("unsupported media type `{found}`, expected `{expected}`")]
    UnsupportedMediaType { found: String, expected: String },
    #[error("could not stage upload: {0}")]
    Staging(#[source] io::Error),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Remux(#[from] RemuxError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    InvalidReference(#[from] InvalidReferenceError),
    #[error("metadata store error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotOwner(_) => StatusCode::FORBIDDEN,
            Self::VideoNotFound(_) => StatusCode::NOT_FOUND,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Multipart(_) | Self::MissingField(_) | Self::InvalidContentType(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Staging(_)
            | Self::Probe(_)
            | Self::Remux(_)
            | Self::Storage(_)
            | Self::Signing(_)
            | Self::InvalidReference(_)
            | Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short caller-facing message. Server-side failures do not leak
    /// paths or backend detail; those go to the log instead.
    fn public_message(&self) -> String {
        match self {
            Self::Staging(_) => "Couldn't stage uploaded video".into(),
            Self::Probe(_) => "Couldn't get video aspect ratio".into(),
            Self::Remux(_) => "Couldn't process video".into(),
            Self::Storage(_) => "Couldn't upload video to object store".into(),
            Self::Signing(_) => "Couldn't generate video access URL".into(),
            Self::InvalidReference(_) => "Stored video reference is malformed".into(),
            Self::Persistence(_) => "Couldn't access video metadata".into(),
            other => other.to_string(),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = ?err, "{}", err);
        } else {
            tracing::debug!(status = status.as_u16(), "request rejected: {}", err);
        }
        AppError::new(status, err.public_message())
    }
}
