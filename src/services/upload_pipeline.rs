//! The upload pipeline: authorize, stage, probe, remux, store, record.
//!
//! Each request moves through [`UploadStage`]s strictly in order and exactly
//! once; any error ends the request. Local scratch files are owned by guards
//! inside [`UploadPipeline::process`], so they are gone by the time it
//! returns, on success and failure alike.

use crate::{
    auth,
    errors::PipelineError,
    models::video::Video,
    services::{
        media_probe::MediaProber,
        object_key::{AssetReference, derive_key},
        object_store::ObjectStore,
        remux::{Remuxer, processed_path},
        staging::{ScratchFile, StageError, stage_stream},
        video_repository::VideoRepository,
    },
};
use axum::http::HeaderMap;
use bytes::Bytes;
use futures::Stream;
use std::{fmt, path::PathBuf, sync::Arc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Multipart field that carries the video.
pub const VIDEO_FIELD: &str = "video";
/// The only container type accepted for upload.
pub const ACCEPTED_CONTENT_TYPE: &str = "video/mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Received,
    Authorized,
    Staged,
    Probed,
    Remuxed,
    Stored,
    Recorded,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Authorized => "authorized",
            Self::Staged => "staged",
            Self::Probed => "probed",
            Self::Remuxed => "remuxed",
            Self::Stored => "stored",
            Self::Recorded => "recorded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bucket every processed video is written to.
    pub bucket: String,
    /// Where per-request scratch files live.
    pub staging_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub jwt_secret: String,
}

#[derive(Clone)]
pub struct UploadPipeline {
    repo: VideoRepository,
    prober: Arc<dyn MediaProber>,
    remuxer: Arc<dyn Remuxer>,
    store: Arc<dyn ObjectStore>,
    settings: PipelineSettings,
}

impl UploadPipeline {
    pub fn new(
        repo: VideoRepository,
        prober: Arc<dyn MediaProber>,
        remuxer: Arc<dyn Remuxer>,
        store: Arc<dyn ObjectStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            repo,
            prober,
            remuxer,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Received -> Authorized. Resolves the caller from the bearer token and
    /// loads the target record, which the caller must own.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        video_id: Uuid,
    ) -> Result<Video, PipelineError> {
        let user_id = auth::authenticate(headers, &self.settings.jwt_secret)?;
        let video = self.repo.get_owned(video_id, user_id).await?;
        debug!(%video_id, %user_id, stage = %UploadStage::Authorized, "upload authorized");
        Ok(video)
    }

    /// Run Authorized -> Recorded for an already-authorized record and
    /// return the record with its new asset reference.
    ///
    /// `declared_type` is the content type the client gave the uploaded
    /// part; `payload` yields its bytes.
    pub async fn process<S>(
        &self,
        video: Video,
        declared_type: Option<&str>,
        payload: S,
    ) -> Result<Video, PipelineError>
    where
        S: Stream<Item = Result<Bytes, PipelineError>>,
    {
        let video_id = video.id;
        let mut reached = UploadStage::Authorized;

        let result = self
            .run_stages(video, declared_type, payload, &mut reached)
            .await;

        match &result {
            Ok(updated) => info!(
                %video_id,
                reference = updated.video_url.as_deref().unwrap_or_default(),
                "upload complete"
            ),
            Err(err) => warn!(
                %video_id,
                last_stage = %reached,
                error = %err,
                "upload failed"
            ),
        }
        result
    }

    async fn run_stages<S>(
        &self,
        mut video: Video,
        declared_type: Option<&str>,
        payload: S,
        reached: &mut UploadStage,
    ) -> Result<Video, PipelineError>
    where
        S: Stream<Item = Result<Bytes, PipelineError>>,
    {
        let video_id = video.id;
        let mut advance = |stage: UploadStage| {
            *reached = stage;
            debug!(%video_id, %stage, "upload stage reached");
        };

        // Authorized -> Staged
        let content_type = accept_content_type(declared_type)?;
        let staged = ScratchFile::reserve(&self.settings.staging_dir, "upload", "mp4");
        let (_staged_handle, staged_bytes) =
            stage_stream(&staged, payload, self.settings.max_upload_bytes)
                .await
                .map_err(|err| match err {
                    StageError::Source(err) => err,
                    StageError::TooLarge { limit } => PipelineError::TooLarge { limit },
                    StageError::Io(err) => PipelineError::Staging(err),
                })?;
        debug!(%video_id, staged_bytes, path = %staged.path().display(), "payload staged");
        advance(UploadStage::Staged);

        // Staged -> Probed
        let geometry = self.prober.probe(staged.path()).await?;
        let orientation = geometry.orientation();
        debug!(
            %video_id,
            width = geometry.width,
            height = geometry.height,
            %orientation,
            "probed stream geometry"
        );
        advance(UploadStage::Probed);

        // Probed -> Remuxed. The guard is taken before the remux runs so a
        // partially written output is removed too.
        let processed = ScratchFile::adopt(processed_path(staged.path()));
        let output = self.remuxer.remux(staged.path()).await?;
        let processed = if output == processed.path() {
            processed
        } else {
            ScratchFile::adopt(output)
        };
        advance(UploadStage::Remuxed);

        // Remuxed -> Stored
        let key = derive_key(orientation);
        let bucket = &self.settings.bucket;
        self.store
            .put_file(bucket, &key, processed.path(), &content_type)
            .await?;
        advance(UploadStage::Stored);

        // Stored -> Recorded. The metadata write is last, so a reference only
        // ever points at an object that was fully uploaded.
        let reference = AssetReference::new(bucket.as_str(), key)?;
        video.video_url = Some(reference.to_string());
        let updated = self.repo.update_reference(&video).await?;
        advance(UploadStage::Recorded);

        Ok(updated)
    }
}

/// Parse the declared content type and accept only [`ACCEPTED_CONTENT_TYPE`].
/// Parameters such as `; codecs=...` are ignored. Returns the bare media type.
pub fn accept_content_type(declared: Option<&str>) -> Result<String, PipelineError> {
    let raw = declared.unwrap_or_default();
    let parsed: mime::Mime = raw
        .parse()
        .map_err(|_| PipelineError::InvalidContentType(raw.to_string()))?;

    let essence = parsed.essence_str();
    if essence != ACCEPTED_CONTENT_TYPE {
        return Err(PipelineError::UnsupportedMediaType {
            found: essence.to_string(),
            expected: ACCEPTED_CONTENT_TYPE.to_string(),
        });
    }
    Ok(essence.to_string())
}
