//! HTTP handlers for video records and uploads.

use crate::{
    auth,
    errors::{AppError, PipelineError},
    models::video::{CreateVideoParams, Video},
    services::upload_pipeline::{UploadStage, VIDEO_FIELD},
    state::AppState,
};
use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Request, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
};
use futures::{StreamExt, future};
use uuid::Uuid;

fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid ID"))
}

fn multipart_error(err: MultipartError, limit: usize) -> PipelineError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::TooLarge { limit }
    } else {
        PipelineError::Multipart(err.body_text())
    }
}

/// Room for multipart boundaries and part headers on top of the payload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Whole-body limit for an upload request whose video may be `max_upload_bytes` long.
pub fn upload_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)
}

/// Reject a declared body length that cannot fit before reading any of it.
fn check_declared_length(headers: &HeaderMap, limit: usize) -> Result<(), PipelineError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match declared {
        Some(len) if len > upload_body_limit(limit) as u64 => {
            Err(PipelineError::TooLarge { limit })
        }
        _ => Ok(()),
    }
}

/// `POST /api/videos/{video_id}/upload`: multipart field `video`, `video/mp4` only.
///
/// Responds with the updated record, its reference swapped for a presigned URL.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    tracing::debug!(%video_id, stage = %UploadStage::Received, "upload request received");

    let video = state.pipeline.authorize(&headers, video_id).await?;

    let limit = state.pipeline.settings().max_upload_bytes;
    check_declared_length(&headers, limit)?;

    let mut multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|rejection| PipelineError::Multipart(rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let declared_type = field.content_type().map(str::to_owned);
        let payload = field.map(move |chunk| chunk.map_err(|e| multipart_error(e, limit)));

        let updated = state
            .pipeline
            .process(video, declared_type.as_deref(), payload)
            .await?;
        let signed = state.signer.sign_video(updated).await?;
        return Ok(Json(signed));
    }

    Err(PipelineError::MissingField(VIDEO_FIELD).into())
}

/// `POST /api/videos`: create an empty record owned by the caller.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<CreateVideoParams>,
) -> Result<(StatusCode, Json<Video>), AppError> {
    let user_id = auth::authenticate(&headers, state.jwt_secret()).map_err(PipelineError::from)?;

    let title = params.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let video = state
        .videos
        .create(user_id, title, params.description.as_deref())
        .await
        .map_err(PipelineError::from)?;

    tracing::info!(video_id = %video.id, %user_id, "created video record");
    Ok((StatusCode::CREATED, Json(video)))
}

/// `GET /api/videos/{video_id}`: the caller's record with a fresh access URL.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = auth::authenticate(&headers, state.jwt_secret()).map_err(PipelineError::from)?;

    let video = state.videos.get_owned(video_id, user_id).await?;
    Ok(Json(state.signer.sign_video(video).await?))
}

/// `GET /api/videos`: all of the caller's records, each with a fresh access URL.
pub async fn list_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Video>>, AppError> {
    let user_id = auth::authenticate(&headers, state.jwt_secret()).map_err(PipelineError::from)?;

    let videos = state
        .videos
        .list_by_owner(user_id)
        .await
        .map_err(PipelineError::from)?;

    let signed = future::try_join_all(videos.into_iter().map(|v| state.signer.sign_video(v))).await?;
    Ok(Json(signed))
}
