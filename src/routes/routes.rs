//! Defines the HTTP surface.
//!
//! ## Structure
//! - **Health**
//!   - `GET  /healthz`, `GET /readyz`
//!
//! - **Videos** (bearer token required)
//!   - `GET  /api/videos`: the caller's videos
//!   - `POST /api/videos`: create an empty video record
//!   - `GET  /api/videos/{video_id}`: one video with a fresh access URL
//!   - `POST /api/videos/{video_id}/upload`: multipart upload of the `video` field
//!
//! - **Assets** (local backend only)
//!   - `GET  /assets/{bucket}/{*key}`: signed, expiring download
//!
//! The wildcard `*key` allows nested keys like `landscape/abc.mp4`.

use crate::{
    handlers::{
        asset_handlers::get_asset,
        health_handlers::{healthz, readyz},
        video_handlers::{create_video, get_video, list_videos, upload_body_limit, upload_video},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. Only the upload route accepts bodies larger than
/// axum's default limit, up to `max_upload_bytes` of video.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // video records
        .route("/api/videos", get(list_videos).post(create_video))
        .route("/api/videos/{video_id}", get(get_video))
        .route(
            "/api/videos/{video_id}/upload",
            post(upload_video).layer(DefaultBodyLimit::max(upload_body_limit(max_upload_bytes))),
        )
        // signed downloads from the local backend
        .route("/assets/{bucket}/{*key}", get(get_asset))
}
