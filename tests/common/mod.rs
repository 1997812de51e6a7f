//! Shared fixtures: an app wired to in-memory SQLite, fake media tools and
//! a recording object store.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use sqlx::SqlitePool;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tempfile::TempDir;
use uuid::Uuid;
use video_store::{
    auth, db,
    models::video::Video,
    services::{
        media_probe::{Geometry, MediaProber, ProbeError},
        object_store::{ObjectStore, SigningError, StorageError, StorageResult},
        remux::{RemuxError, Remuxer, processed_path},
        tool::ToolError,
        upload_pipeline::PipelineSettings,
    },
    state::AppState,
};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const BUCKET: &str = "videos";
pub const BOUNDARY: &str = "video-store-test-boundary";

/// Reports fixed dimensions, or fails.
pub struct FakeProber {
    pub geometry: Option<Geometry>,
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> Result<Geometry, ProbeError> {
        assert!(path.exists(), "probe ran before staging finished");
        self.geometry.ok_or(ProbeError::NoStreams)
    }
}

/// Copies the input to its processed path, or writes a partial output and fails.
pub struct FakeRemuxer {
    pub fail: bool,
}

#[async_trait]
impl Remuxer for FakeRemuxer {
    async fn remux(&self, input: &Path) -> Result<PathBuf, RemuxError> {
        let output = processed_path(input);
        if self.fail {
            tokio::fs::write(&output, b"partial").await.unwrap();
            return Err(ToolError::Timeout {
                tool: "ffmpeg".into(),
                timeout: Duration::from_secs(1),
            }
            .into());
        }
        tokio::fs::copy(input, &output).await.unwrap();
        Ok(output)
    }
}

#[derive(Debug, Clone)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What the fake store does when asked to store an object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PutBehavior {
    #[default]
    Store,
    /// Reject the upload.
    Fail,
    /// Store the object, then delete every video row so the final metadata
    /// write finds nothing to update.
    StoreAndDropRecords,
}

/// Keeps uploaded objects in memory and signs with a fake query string.
pub struct MemoryObjectStore {
    pub puts: Mutex<Vec<PutRecord>>,
    behavior: PutBehavior,
    db: Arc<SqlitePool>,
}

impl MemoryObjectStore {
    pub fn new(db: Arc<SqlitePool>, behavior: PutBehavior) -> Self {
        Self {
            puts: Mutex::new(Vec::new()),
            behavior,
            db,
        }
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        assert!(path.exists(), "upload ran without a processed file");
        if self.behavior == PutBehavior::Fail {
            return Err(StorageError::Upload {
                bucket: bucket.into(),
                key: key.into(),
                message: "connection reset".into(),
            });
        }

        let bytes = tokio::fs::read(path).await?;
        self.puts.lock().unwrap().push(PutRecord {
            bucket: bucket.into(),
            key: key.into(),
            content_type: content_type.into(),
            bytes,
        });

        if self.behavior == PutBehavior::StoreAndDropRecords {
            sqlx::query("DELETE FROM videos").execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, SigningError> {
        Ok(format!(
            "https://objects.test/{}/{}?X-Amz-Expires={}&nonce={}",
            bucket,
            key,
            expires_in.as_secs(),
            Uuid::new_v4()
        ))
    }
}

pub struct Harness {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryObjectStore>,
    pub staging: TempDir,
}

#[derive(Clone, Copy)]
pub struct HarnessOptions {
    pub geometry: Option<Geometry>,
    pub remux_fails: bool,
    pub put_behavior: PutBehavior,
    pub max_upload_bytes: usize,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            geometry: Some(Geometry {
                width: 1920,
                height: 1080,
            }),
            remux_fails: false,
            put_behavior: PutBehavior::Store,
            max_upload_bytes: 1024 * 1024,
        }
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(HarnessOptions::default()).await
    }

    pub async fn with(opts: HarnessOptions) -> Self {
        let pool = Arc::new(db::connect_in_memory().await.unwrap());
        let staging = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new(pool.clone(), opts.put_behavior));

        let settings = PipelineSettings {
            bucket: BUCKET.into(),
            staging_dir: staging.path().to_path_buf(),
            max_upload_bytes: opts.max_upload_bytes,
            jwt_secret: JWT_SECRET.into(),
        };
        let state = AppState::new(
            pool,
            store.clone(),
            Arc::new(FakeProber {
                geometry: opts.geometry,
            }),
            Arc::new(FakeRemuxer {
                fail: opts.remux_fails,
            }),
            settings,
            Duration::from_secs(600),
        );

        Self {
            app: video_store::app(state.clone()),
            state,
            store,
            staging,
        }
    }

    /// A video record owned by `user_id`, created straight through the repository.
    pub async fn seed_video(&self, user_id: Uuid) -> Video {
        self.state
            .videos
            .create(user_id, "boat trip", Some("first upload"))
            .await
            .unwrap()
    }

    pub async fn stored_video(&self, id: Uuid) -> Video {
        self.state.videos.get_by_id(id).await.unwrap().unwrap()
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging.path()).unwrap().next().is_none()
    }
}

pub fn token_for(user_id: Uuid) -> String {
    auth::issue_token(user_id, JWT_SECRET, Duration::from_secs(300)).unwrap()
}

/// A multipart body with one file part.
pub fn multipart_body(field: &str, content_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"clip.mp4\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(video_id: Uuid, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/videos/{}/upload", video_id))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
