//! Shared handler state.

use crate::services::{
    local_store::LocalObjectStore,
    media_probe::MediaProber,
    object_store::ObjectStore,
    presign::AccessSigner,
    remux::Remuxer,
    upload_pipeline::{PipelineSettings, UploadPipeline},
    video_repository::VideoRepository,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub videos: VideoRepository,
    pub pipeline: UploadPipeline,
    pub signer: AccessSigner,
    pub store: Arc<dyn ObjectStore>,
    /// Present only with the local backend, which serves its own objects.
    pub local_store: Option<Arc<LocalObjectStore>>,
}

impl AppState {
    /// Wire the pipeline and signer around one object store.
    pub fn new(
        db: Arc<SqlitePool>,
        store: Arc<dyn ObjectStore>,
        prober: Arc<dyn MediaProber>,
        remuxer: Arc<dyn Remuxer>,
        settings: PipelineSettings,
        presign_ttl: Duration,
    ) -> Self {
        let videos = VideoRepository::new(db.clone());
        let pipeline = UploadPipeline::new(videos.clone(), prober, remuxer, store.clone(), settings);
        let signer = AccessSigner::new(store.clone(), presign_ttl);
        Self {
            db,
            videos,
            pipeline,
            signer,
            store,
            local_store: None,
        }
    }

    /// Serve `/assets` from this store.
    pub fn with_local_store(mut self, local: Arc<LocalObjectStore>) -> Self {
        self.local_store = Some(local);
        self
    }

    pub fn jwt_secret(&self) -> &str {
        &self.pipeline.settings().jwt_secret
    }
}
