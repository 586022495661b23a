/// Business logic layer for post-service
///
/// This module provides the post aggregation workflow: repository pages and
/// image service responses are merged here into enriched post views.
pub mod posts;

pub use posts::PostService;
