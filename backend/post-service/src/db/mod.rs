/// Database access layer
///
/// This module provides the `PostStore` contract for post persistence and its
/// PostgreSQL implementation.
pub mod post_repo;

use crate::error::Result;
use crate::models::{Page, Post};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persistence contract for posts.
///
/// The aggregation layer talks to this trait only, so tests can swap the
/// PostgreSQL implementation for a mock or an in-memory double.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a new post row; the id and created_at are assigned here.
    async fn create(&self, text: String, author: String) -> Result<Post>;

    /// Point lookup by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>>;

    /// Overwrite text and author in place; counters and attachments untouched.
    async fn update(&self, id: Uuid, text: String, author: String) -> Result<Option<Post>>;

    /// Delete a post row, returning whether a row existed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;

    /// Full scan, newest first, as a page with totals.
    async fn find_all(&self, page_number: i64, size: i64) -> Result<Page<Post>>;

    /// Filtered scan by author, newest first, as a page with totals.
    async fn find_by_author(&self, author: String, page_number: i64, size: i64)
        -> Result<Page<Post>>;

    /// Overwrite like/comment counts if the event is not older than the
    /// currently stored activity timestamp. Returns false when the update was
    /// ignored as stale or the row is gone.
    async fn apply_activity(
        &self,
        id: Uuid,
        like_count: i32,
        comment_count: i32,
        occurred_at: DateTime<Utc>,
    ) -> Result<bool>;
}

pub use post_repo::PgPostStore;
