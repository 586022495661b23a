/// Data models for post-service
///
/// This module defines structures for:
/// - Post: Social media posts with engagement counters
/// - Attachment / AttachmentGroup: Binary media owned by the image service
/// - Page: Offset-addressed result slices with totals
/// - ActivityEvent: Asynchronous like/comment count updates
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Post database entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub text: String,
    pub author: String,
    pub like_count: i32,
    pub comment_count: i32,
    /// Timestamp of the newest applied activity event, if any.
    pub activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Attachment category understood by the image service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageType {
    PostAttachment,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostAttachment => "POST_ATTACHMENT",
        }
    }
}

/// A single binary attachment. The payload travels base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// All attachments the image service holds for one parent entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentGroup {
    pub image_type: ImageType,
    pub parent_id: Uuid,
    pub files: Vec<Attachment>,
}

/// Enriched post view returned to callers: post fields plus the attachment
/// payloads fetched (or just submitted) for that post. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub text: String,
    pub author: String,
    pub like_count: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
    pub files: Vec<Attachment>,
}

impl PostResponse {
    pub fn from_post(post: Post, files: Vec<Attachment>) -> Self {
        Self {
            id: post.id,
            text: post.text,
            author: post.author,
            like_count: post.like_count,
            comment_count: post.comment_count,
            created_at: post.created_at,
            files,
        }
    }
}

/// A bounded, zero-based slice of a larger ordered result set.
///
/// Invariants: `items.len() <= size` and
/// `total_pages == ceil(total_elements / size)`. An out-of-range page carries
/// an empty item list with unchanged totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub total_elements: i64,
    pub total_pages: i64,
    pub page_number: i64,
    pub size: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total_elements: i64, page_number: i64, size: i64, items: Vec<T>) -> Self {
        let total_pages = if size > 0 {
            (total_elements + size - 1) / size
        } else {
            0
        };
        Self {
            total_elements,
            total_pages,
            page_number,
            size,
            items,
        }
    }

    /// Transform every item while keeping the page geometry intact.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            page_number: self.page_number,
            size: self.size,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Like/comment count update delivered over Kafka.
///
/// Counts overwrite the stored values (last write wins); `occurred_at` orders
/// events so a late-arriving older event cannot regress the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub post_id: Uuid,
    pub like_count: i32,
    pub comment_count: i32,
    pub occurred_at: DateTime<Utc>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw.as_bytes()).map_err(serde::de::Error::custom)
    }
}
