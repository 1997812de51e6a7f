//! Turns stored asset references into short-lived access URLs on read.

use crate::{
    errors::PipelineError,
    models::video::Video,
    services::{object_key::AssetReference, object_store::ObjectStore},
};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AccessSigner {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
}

impl AccessSigner {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn url_for(&self, reference: &AssetReference) -> Result<String, PipelineError> {
        let url = self
            .store
            .presign_get(reference.bucket(), reference.key(), self.ttl)
            .await?;
        Ok(url)
    }

    /// Replace the record's stored reference with a presigned URL. Records
    /// without a reference yet are returned unchanged.
    pub async fn sign_video(&self, mut video: Video) -> Result<Video, PipelineError> {
        let Some(stored) = video.video_url.as_deref() else {
            return Ok(video);
        };

        let reference: AssetReference = stored.parse()?;
        video.video_url = Some(self.url_for(&reference).await?);
        Ok(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::{SigningError, StorageResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::{
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use uuid::Uuid;

    /// Hands out a distinct URL per call.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn put_file(&self, _: &str, _: &str, _: &Path, _: &str) -> StorageResult<()> {
            Ok(())
        }

        async fn presign_get(
            &self,
            bucket: &str,
            key: &str,
            expires_in: Duration,
        ) -> Result<String, SigningError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                "https://{}.example/{}?ttl={}&n={}",
                bucket,
                key,
                expires_in.as_secs(),
                n
            ))
        }
    }

    fn video(reference: Option<&str>) -> Video {
        let now = Utc::now();
        Video {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "clip".into(),
            description: None,
            thumbnail_url: None,
            video_url: reference.map(str::to_owned),
            created_at: now,
            updated_at: now,
        }
    }

    fn signer() -> AccessSigner {
        AccessSigner::new(Arc::new(CountingStore::default()), Duration::from_secs(900))
    }

    #[tokio::test]
    async fn record_without_reference_is_unchanged() {
        let original = video(None);
        let signed = signer().sign_video(original.clone()).await.unwrap();
        assert_eq!(signed, original);
    }

    #[tokio::test]
    async fn reference_becomes_url() {
        let signed = signer()
            .sign_video(video(Some("videos,portrait/abc.mp4")))
            .await
            .unwrap();
        assert_eq!(
            signed.video_url.as_deref(),
            Some("https://videos.example/portrait/abc.mp4?ttl=900&n=0")
        );
    }

    #[tokio::test]
    async fn every_read_signs_afresh() {
        let signer = signer();
        let record = video(Some("videos,landscape/abc.mp4"));
        let first = signer.sign_video(record.clone()).await.unwrap();
        let second = signer.sign_video(record).await.unwrap();
        assert_ne!(first.video_url, second.video_url);
    }

    #[tokio::test]
    async fn malformed_reference_is_an_error() {
        let err = signer()
            .sign_video(video(Some("no-delimiter")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidReference(_)));
    }
}
