use async_trait::async_trait;

use super::error::StoreError;
use super::models::{Feed, NewPost, Post};
use super::{queries, Database};

/// The slice of the store the scraper depends on.
///
/// The store is the only shared mutable resource between feed workers and is
/// the sole arbiter of post URL uniqueness.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Up to `limit` distinct feeds, never-fetched first, then oldest fetch first.
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, StoreError>;

    /// Set `last_fetched_at` to now.
    async fn mark_feed_fetched(&self, feed_id: i64) -> Result<Feed, StoreError>;

    /// Persist a post; a duplicate URL yields [`StoreError::UniqueViolation`].
    async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        queries::next_feeds_to_fetch(self.pool(), limit).await
    }

    async fn mark_feed_fetched(&self, feed_id: i64) -> Result<Feed, StoreError> {
        queries::mark_feed_fetched(self.pool(), feed_id).await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        queries::insert_post(self.pool(), post).await
    }
}
