/// Post service - the aggregation workflow over the post store and the image
/// service.
///
/// Every enriched view produced here merges two independent sources: post rows
/// from PostgreSQL and attachment groups from the image service. The merge is
/// a left-outer join on the post id; a post with no attachment group gets an
/// empty file list.
use crate::clients::ImageClient;
use crate::db::PostStore;
use crate::error::{AppError, Result};
use crate::models::{
    ActivityEvent, Attachment, AttachmentGroup, ImageType, Page, Post, PostResponse,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const POST_NOT_FOUND_MESSAGE: &str = "post not found";
pub const NO_FILES_UPLOADED_MESSAGE: &str = "Must contain at least one valid file";

pub struct PostService {
    store: Arc<dyn PostStore>,
    images: Arc<dyn ImageClient>,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>, images: Arc<dyn ImageClient>) -> Self {
        Self { store, images }
    }

    /// Create a post and hand its files to the image service.
    ///
    /// The post row is committed first so an id exists for the upload. The
    /// returned view is built from the submitted bytes rather than re-fetched.
    /// An upload failure after the commit leaves the post without attachments;
    /// that window is accepted and surfaced as an upstream error.
    pub async fn create(
        &self,
        text: String,
        author: String,
        files: Vec<Attachment>,
    ) -> Result<PostResponse> {
        if !has_valid_file(&files) {
            return Err(AppError::Validation(NO_FILES_UPLOADED_MESSAGE.to_string()));
        }

        let post = self.store.create(text, author).await?;

        if let Err(err) = self
            .images
            .upload(ImageType::PostAttachment, post.id, files.clone())
            .await
        {
            warn!(post_id = %post.id, "attachment upload failed after post commit: {}", err);
            return Err(err);
        }

        Ok(PostResponse::from_post(post, files))
    }

    /// Get a single post enriched with its attachments.
    pub async fn get_by_id(&self, id: Uuid) -> Result<PostResponse> {
        let post = self.require_exists(id).await?;

        let files = self
            .images
            .get_by_parent(id)
            .await?
            .map(|group| group.files)
            .unwrap_or_default();

        Ok(PostResponse::from_post(post, files))
    }

    /// Paginated feed of all posts, newest first, with attachments.
    pub async fn get_feed(&self, page_number: i64, size: i64) -> Result<Page<PostResponse>> {
        let posts = self.store.find_all(page_number, size).await?;
        self.fill_with_attachments(posts).await
    }

    /// Paginated posts of one author, newest first, with attachments.
    pub async fn get_by_author(
        &self,
        author: String,
        page_number: i64,
        size: i64,
    ) -> Result<Page<PostResponse>> {
        let posts = self.store.find_by_author(author, page_number, size).await?;
        self.fill_with_attachments(posts).await
    }

    /// Overwrite text and author. Attachments are deliberately untouched and
    /// not re-fetched, so the returned view carries an empty file list.
    pub async fn update(&self, id: Uuid, text: String, author: String) -> Result<PostResponse> {
        self.require_exists(id).await?;

        let post = self
            .store
            .update(id, text, author)
            .await?
            .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND_MESSAGE.to_string()))?;

        Ok(PostResponse::from_post(post, Vec::new()))
    }

    /// Delete a post, then best-effort delete its attachments.
    ///
    /// The two deletes are independent; a failed attachment delete leaves
    /// orphaned blobs in the image service and is only logged.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.require_exists(id).await?;
        self.store.delete_by_id(id).await?;

        if let Err(err) = self.images.delete_by_parent(id).await {
            warn!(post_id = %id, "attachment cleanup failed after post delete: {}", err);
        }

        Ok(())
    }

    /// Apply a like/comment count update. Counts overwrite the stored values;
    /// events older than the stored activity timestamp are ignored. Returns
    /// whether the event was applied.
    pub async fn apply_activity(&self, event: ActivityEvent) -> Result<bool> {
        self.require_exists(event.post_id).await?;

        let applied = self
            .store
            .apply_activity(
                event.post_id,
                event.like_count,
                event.comment_count,
                event.occurred_at,
            )
            .await?;

        if !applied {
            tracing::debug!(post_id = %event.post_id, "stale activity event ignored");
        }

        Ok(applied)
    }

    /// Validation gate: point lookup that fails with a fixed not-found
    /// message. Pure read, no side effects.
    async fn require_exists(&self, id: Uuid) -> Result<Post> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND_MESSAGE.to_string()))
    }

    /// Batch-fetch the attachment groups for the ids in one post page and
    /// merge them in. The batch is keyed by the id set, never by the page
    /// parameters.
    async fn fill_with_attachments(&self, posts: Page<Post>) -> Result<Page<PostResponse>> {
        let ids: Vec<Uuid> = posts.items.iter().map(|post| post.id).collect();

        let groups = if ids.is_empty() {
            Vec::new()
        } else {
            self.images.get_by_parents(ids).await?
        };

        Ok(merge_attachments(posts, groups))
    }
}

/// Left-outer join of post rows with attachment groups on the parent id.
fn merge_attachments(posts: Page<Post>, groups: Vec<AttachmentGroup>) -> Page<PostResponse> {
    posts.map(|post| {
        let files = groups
            .iter()
            .find(|group| group.parent_id == post.id)
            .map(|group| group.files.clone())
            .unwrap_or_default();
        PostResponse::from_post(post, files)
    })
}

/// A file set is valid when it holds at least one named, non-empty file.
fn has_valid_file(files: &[Attachment]) -> bool {
    files
        .iter()
        .any(|file| !file.data.is_empty() && !file.name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::image::MockImageClient;
    use crate::db::MockPostStore;
    use chrono::{Duration, Utc};

    fn post_with_id(id: Uuid) -> Post {
        Post {
            id,
            text: "hello".to_string(),
            author: "a1".to_string(),
            like_count: 0,
            comment_count: 0,
            activity_at: None,
            created_at: Utc::now(),
        }
    }

    fn attachment(name: &str, data: &[u8]) -> Attachment {
        Attachment {
            name: name.to_string(),
            data: data.to_vec(),
        }
    }

    fn group_for(parent_id: Uuid, files: Vec<Attachment>) -> AttachmentGroup {
        AttachmentGroup {
            image_type: ImageType::PostAttachment,
            parent_id,
            files,
        }
    }

    fn service(store: MockPostStore, images: MockImageClient) -> PostService {
        PostService::new(Arc::new(store), Arc::new(images))
    }

    #[tokio::test]
    async fn create_returns_view_with_persisted_id_and_submitted_bytes() {
        let id = Uuid::new_v4();
        let files = vec![attachment("f1.png", b"PNGDATA")];

        let mut store = MockPostStore::new();
        let persisted = post_with_id(id);
        store
            .expect_create()
            .withf(|text, author| text == "hello" && author == "a1")
            .times(1)
            .returning(move |_, _| Ok(persisted.clone()));

        let mut images = MockImageClient::new();
        images
            .expect_upload()
            .withf(move |image_type, parent_id, _| {
                *image_type == ImageType::PostAttachment && *parent_id == id
            })
            .times(1)
            .returning(|image_type, parent_id, files| {
                Ok(AttachmentGroup {
                    image_type,
                    parent_id,
                    files,
                })
            });

        let view = service(store, images)
            .create("hello".to_string(), "a1".to_string(), files.clone())
            .await
            .expect("create");

        assert_eq!(view.id, id);
        assert_eq!(view.text, "hello");
        assert_eq!(view.author, "a1");
        assert_eq!(view.files, files);
    }

    #[tokio::test]
    async fn create_rejects_empty_file_set_before_any_store_call() {
        let store = MockPostStore::new();
        let images = MockImageClient::new();

        let err = service(store, images)
            .create("hello".to_string(), "a1".to_string(), Vec::new())
            .await
            .expect_err("must fail validation");

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_rejects_files_with_empty_payloads() {
        let store = MockPostStore::new();
        let images = MockImageClient::new();

        let files = vec![attachment("empty.png", b""), attachment("", b"data")];
        let err = service(store, images)
            .create("hello".to_string(), "a1".to_string(), files)
            .await
            .expect_err("must fail validation");

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_store_failure_aborts_before_any_remote_call() {
        let mut store = MockPostStore::new();
        store
            .expect_create()
            .times(1)
            .returning(|_, _| Err(AppError::Database("insert failed".to_string())));

        // No upload expectation: any image client call would panic the mock.
        let images = MockImageClient::new();

        let err = service(store, images)
            .create(
                "hello".to_string(),
                "a1".to_string(),
                vec![attachment("f1.png", b"PNGDATA")],
            )
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn create_surfaces_upstream_error_after_post_commit() {
        let id = Uuid::new_v4();
        let mut store = MockPostStore::new();
        let persisted = post_with_id(id);
        store
            .expect_create()
            .times(1)
            .returning(move |_, _| Ok(persisted.clone()));

        let mut images = MockImageClient::new();
        images
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Err(AppError::Upstream("unreachable".to_string())));

        let err = service(store, images)
            .create(
                "hello".to_string(),
                "a1".to_string(),
                vec![attachment("f1.png", b"PNGDATA")],
            )
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn get_by_id_merges_attachment_group() {
        let id = Uuid::new_v4();
        let files = vec![attachment("f1.png", b"PNGDATA")];

        let mut store = MockPostStore::new();
        let found = post_with_id(id);
        store
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));

        let mut images = MockImageClient::new();
        let group = group_for(id, files.clone());
        images
            .expect_get_by_parent()
            .withf(move |parent_id| *parent_id == id)
            .times(1)
            .returning(move |_| Ok(Some(group.clone())));

        let view = service(store, images).get_by_id(id).await.expect("get");
        assert_eq!(view.files, files);
    }

    #[tokio::test]
    async fn get_by_id_with_no_attachment_group_yields_empty_files() {
        let id = Uuid::new_v4();

        let mut store = MockPostStore::new();
        let found = post_with_id(id);
        store
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));

        let mut images = MockImageClient::new();
        images
            .expect_get_by_parent()
            .times(1)
            .returning(|_| Ok(None));

        let view = service(store, images).get_by_id(id).await.expect("get");
        assert!(view.files.is_empty());
    }

    #[tokio::test]
    async fn get_by_id_on_missing_post_never_calls_image_service() {
        let mut store = MockPostStore::new();
        store.expect_find_by_id().times(1).returning(|_| Ok(None));

        // No expectations: the mock panics on any image client call.
        let images = MockImageClient::new();

        let err = service(store, images)
            .get_by_id(Uuid::new_v4())
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn feed_issues_one_batch_fetch_for_exactly_the_page_ids() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut store = MockPostStore::new();
        let rows = vec![post_with_id(first), post_with_id(second)];
        store
            .expect_find_all()
            .withf(|page_number, size| *page_number == 0 && *size == 10)
            .times(1)
            .returning(move |page_number, size| {
                Ok(Page::new(2, page_number, size, rows.clone()))
            });

        let mut images = MockImageClient::new();
        let files = vec![attachment("f1.png", b"PNGDATA")];
        let group = group_for(first, files.clone());
        images
            .expect_get_by_parents()
            .withf(move |ids| ids == &[first, second])
            .times(1)
            .returning(move |_| Ok(vec![group.clone()]));

        let page = service(store, images).get_feed(0, 10).await.expect("feed");

        assert_eq!(page.total_elements, 2);
        assert_eq!(page.items.len(), 2);
        // Left-outer join: the first post gets its files, the second an
        // empty list instead of an error.
        assert_eq!(page.items[0].files, files);
        assert!(page.items[1].files.is_empty());
    }

    #[tokio::test]
    async fn empty_feed_page_skips_the_image_service() {
        let mut store = MockPostStore::new();
        store
            .expect_find_all()
            .times(1)
            .returning(|page_number, size| Ok(Page::new(25, page_number, size, Vec::new())));

        let images = MockImageClient::new();

        let page = service(store, images).get_feed(9, 10).await.expect("feed");

        assert_eq!(page.total_elements, 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn author_listing_filters_by_author() {
        let id = Uuid::new_v4();

        let mut store = MockPostStore::new();
        let rows = vec![post_with_id(id)];
        store
            .expect_find_by_author()
            .withf(|author, page_number, size| {
                author == "a1" && *page_number == 0 && *size == 5
            })
            .times(1)
            .returning(move |_, page_number, size| {
                Ok(Page::new(1, page_number, size, rows.clone()))
            });

        let mut images = MockImageClient::new();
        images
            .expect_get_by_parents()
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let page = service(store, images)
            .get_by_author("a1".to_string(), 0, 5)
            .await
            .expect("author page");

        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].files.is_empty());
    }

    #[tokio::test]
    async fn update_leaves_attachments_untouched() {
        let id = Uuid::new_v4();

        let mut store = MockPostStore::new();
        let found = post_with_id(id);
        store
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        store
            .expect_update()
            .withf(move |post_id, text, author| {
                *post_id == id && text == "edited" && author == "a2"
            })
            .times(1)
            .returning(|post_id, text, author| {
                let mut post = Post {
                    id: post_id,
                    text,
                    author,
                    like_count: 0,
                    comment_count: 0,
                    activity_at: None,
                    created_at: Utc::now(),
                };
                post.like_count = 3;
                Ok(Some(post))
            });

        // No image client expectations: update must not touch the service.
        let images = MockImageClient::new();

        let view = service(store, images)
            .update(id, "edited".to_string(), "a2".to_string())
            .await
            .expect("update");

        assert_eq!(view.text, "edited");
        assert_eq!(view.author, "a2");
        assert!(view.files.is_empty());
    }

    #[tokio::test]
    async fn update_missing_post_fails_not_found() {
        let mut store = MockPostStore::new();
        store.expect_find_by_id().times(1).returning(|_| Ok(None));

        let images = MockImageClient::new();

        let err = service(store, images)
            .update(Uuid::new_v4(), "edited".to_string(), "a2".to_string())
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_row_and_requests_attachment_delete() {
        let id = Uuid::new_v4();

        let mut store = MockPostStore::new();
        let found = post_with_id(id);
        store
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        store
            .expect_delete_by_id()
            .withf(move |post_id| *post_id == id)
            .times(1)
            .returning(|_| Ok(true));

        let mut images = MockImageClient::new();
        images
            .expect_delete_by_parent()
            .withf(move |parent_id| *parent_id == id)
            .times(1)
            .returning(|_| Ok(()));

        service(store, images).delete(id).await.expect("delete");
    }

    #[tokio::test]
    async fn delete_swallows_image_service_failure() {
        let id = Uuid::new_v4();

        let mut store = MockPostStore::new();
        let found = post_with_id(id);
        store
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        store
            .expect_delete_by_id()
            .times(1)
            .returning(|_| Ok(true));

        let mut images = MockImageClient::new();
        images
            .expect_delete_by_parent()
            .times(1)
            .returning(|_| Err(AppError::Upstream("unreachable".to_string())));

        // The post is gone; the orphaned blobs are someone else's cleanup.
        service(store, images).delete(id).await.expect("delete");
    }

    #[tokio::test]
    async fn activity_event_overwrites_counts() {
        let id = Uuid::new_v4();
        let occurred_at = Utc::now();

        let mut store = MockPostStore::new();
        let found = post_with_id(id);
        store
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        store
            .expect_apply_activity()
            .withf(move |post_id, like_count, comment_count, _| {
                *post_id == id && *like_count == 5 && *comment_count == 2
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let images = MockImageClient::new();

        let applied = service(store, images)
            .apply_activity(ActivityEvent {
                post_id: id,
                like_count: 5,
                comment_count: 2,
                occurred_at,
            })
            .await
            .expect("apply");

        assert!(applied);
    }

    #[tokio::test]
    async fn stale_activity_event_is_ignored() {
        let id = Uuid::new_v4();

        let mut store = MockPostStore::new();
        let mut found = post_with_id(id);
        found.activity_at = Some(Utc::now());
        store
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        store
            .expect_apply_activity()
            .times(1)
            .returning(|_, _, _, _| Ok(false));

        let images = MockImageClient::new();

        let applied = service(store, images)
            .apply_activity(ActivityEvent {
                post_id: id,
                like_count: 1,
                comment_count: 1,
                occurred_at: Utc::now() - Duration::hours(1),
            })
            .await
            .expect("apply");

        assert!(!applied);
    }

    #[tokio::test]
    async fn activity_event_for_unknown_post_fails_not_found() {
        let mut store = MockPostStore::new();
        store.expect_find_by_id().times(1).returning(|_| Ok(None));

        let images = MockImageClient::new();

        let err = service(store, images)
            .apply_activity(ActivityEvent {
                post_id: Uuid::new_v4(),
                like_count: 5,
                comment_count: 2,
                occurred_at: Utc::now(),
            })
            .await
            .expect_err("must fail");

        assert!(matches!(err, AppError::NotFound(_)));
    }
}
