//! Video metadata records in SQLite.

use crate::{errors::PipelineError, models::video::Video};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const VIDEO_COLUMNS: &str =
    "id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at";

#[derive(Clone)]
pub struct VideoRepository {
    db: Arc<SqlitePool>,
}

impl VideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Video>, sqlx::Error> {
        sqlx::query_as::<_, Video>(&format!("SELECT {} FROM videos WHERE id = ?", VIDEO_COLUMNS))
            .bind(id)
            .fetch_optional(&*self.db)
            .await
    }

    /// Fetch a record on behalf of `user_id`, failing if it is missing or
    /// belongs to someone else.
    pub async fn get_owned(&self, id: Uuid, user_id: Uuid) -> Result<Video, PipelineError> {
        let video = self
            .get_by_id(id)
            .await?
            .ok_or(PipelineError::VideoNotFound(id))?;
        if video.user_id != user_id {
            return Err(PipelineError::NotOwner(id));
        }
        Ok(video)
    }

    pub async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Video>, sqlx::Error> {
        sqlx::query_as::<_, Video>(&format!(
            "SELECT {} FROM videos WHERE user_id = ? ORDER BY created_at DESC",
            VIDEO_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&*self.db)
        .await
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<Video, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos ({cols}) VALUES (?, ?, ?, ?, NULL, NULL, ?, ?) RETURNING {cols}",
            cols = VIDEO_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await
    }

    /// Persist `video.video_url` and bump `updated_at`. No other column is
    /// written.
    pub async fn update_reference(&self, video: &Video) -> Result<Video, sqlx::Error> {
        sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET video_url = ?, updated_at = ? WHERE id = ? RETURNING {}",
            VIDEO_COLUMNS
        ))
        .bind(&video.video_url)
        .bind(Utc::now())
        .bind(video.id)
        .fetch_one(&*self.db)
        .await
    }
}
