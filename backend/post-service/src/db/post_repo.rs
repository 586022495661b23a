use crate::db::PostStore;
use crate::error::Result;
use crate::models::{Page, Post};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const POST_COLUMNS: &str = "id, text, author, like_count, comment_count, activity_at, created_at";

/// PostgreSQL-backed post store.
///
/// Mutations run in a SERIALIZABLE transaction to prevent lost updates on
/// concurrent edits to the same post id; reads go straight to the pool.
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create(&self, text: String, author: String) -> Result<Post> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (text, author)
            VALUES ($1, $2)
            RETURNING {POST_COLUMNS}
            "#,
        ))
        .bind(&text)
        .bind(&author)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn update(&self, id: Uuid, text: String, author: String) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET text = $2, author = $3
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(&text)
        .bind(&author)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(post)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_all(&self, page_number: i64, size: i64) -> Result<Page<Post>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        ))
        .bind(size)
        .bind(page_number * size)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(total, page_number, size, items))
    }

    async fn find_by_author(
        &self,
        author: String,
        page_number: i64,
        size: i64,
    ) -> Result<Page<Post>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE author = $1")
            .bind(&author)
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE author = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(&author)
        .bind(size)
        .bind(page_number * size)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(total, page_number, size, items))
    }

    async fn apply_activity(
        &self,
        id: Uuid,
        like_count: i32,
        comment_count: i32,
        occurred_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // The activity_at guard keeps a late-arriving older event from
        // regressing the counters.
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET like_count = $2, comment_count = $3, activity_at = $4
            WHERE id = $1 AND (activity_at IS NULL OR activity_at <= $4)
            "#,
        )
        .bind(id)
        .bind(like_count)
        .bind(comment_count)
        .bind(occurred_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
