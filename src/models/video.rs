//! The video metadata record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's video as tracked in the metadata store.
///
/// `video_url` holds the persisted asset reference (`bucket,key`) once an
/// upload has completed. Responses replace it with a short-lived access URL;
/// the reference itself is never handed out.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Video {
    pub id: Uuid,

    /// Owner of the video; only this user may upload to or read it.
    pub user_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub thumbnail_url: Option<String>,

    pub video_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /api/videos`.
#[derive(Deserialize, Debug)]
pub struct CreateVideoParams {
    pub title: String,
    pub description: Option<String>,
}
