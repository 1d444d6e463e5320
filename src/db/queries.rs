use chrono::Utc;
use sqlx::SqlitePool;

use super::error::{StoreError, StoreResultExt};
use super::models::{Feed, FeedFollow, NewFeed, NewPost, Post, User};

// ========== Users ==========

/// Insert a new user with a pre-generated API key.
pub async fn create_user(pool: &SqlitePool, name: &str, api_key: &str) -> Result<User, StoreError> {
    let now = Utc::now();
    sqlx::query_as(
        r"
        INSERT INTO users (name, api_key, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        ",
    )
    .bind(name)
    .bind(api_key)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .during("create user")
}

/// Look up the user owning an API key.
pub async fn get_user_by_api_key(
    pool: &SqlitePool,
    api_key: &str,
) -> Result<Option<User>, StoreError> {
    sqlx::query_as("SELECT * FROM users WHERE api_key = ?")
        .bind(api_key)
        .fetch_optional(pool)
        .await
        .during("fetch user by api key")
}

// ========== Feeds ==========

/// Register a feed and make its creator follow it, atomically.
pub async fn create_feed_with_follow(
    pool: &SqlitePool,
    feed: &NewFeed,
) -> Result<(Feed, FeedFollow), StoreError> {
    let now = Utc::now();
    let mut tx = pool.begin().await.during("begin feed transaction")?;

    let created: Feed = sqlx::query_as(
        r"
        INSERT INTO feeds (user_id, name, url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        ",
    )
    .bind(feed.user_id)
    .bind(&feed.name)
    .bind(&feed.url)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .during("create feed")?;

    let follow: FeedFollow = sqlx::query_as(
        r"
        INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        ",
    )
    .bind(feed.user_id)
    .bind(created.id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .during("follow created feed")?;

    tx.commit().await.during("commit feed transaction")?;

    Ok((created, follow))
}

/// Get all registered feeds, oldest registration first.
pub async fn list_feeds(pool: &SqlitePool) -> Result<Vec<Feed>, StoreError> {
    sqlx::query_as("SELECT * FROM feeds ORDER BY created_at ASC, id ASC")
        .fetch_all(pool)
        .await
        .during("list feeds")
}

/// Get a feed by ID.
pub async fn get_feed(pool: &SqlitePool, id: i64) -> Result<Option<Feed>, StoreError> {
    sqlx::query_as("SELECT * FROM feeds WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .during("fetch feed")
}

/// Get the `limit` feeds most overdue for a refresh.
///
/// Never-fetched feeds come first, then ascending `last_fetched_at`.
pub async fn next_feeds_to_fetch(pool: &SqlitePool, limit: i64) -> Result<Vec<Feed>, StoreError> {
    sqlx::query_as(
        r"
        SELECT * FROM feeds
        ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
        LIMIT ?
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .during("fetch next feeds to scrape")
}

/// Stamp a feed as fetched now, returning the updated row.
pub async fn mark_feed_fetched(pool: &SqlitePool, id: i64) -> Result<Feed, StoreError> {
    let now = Utc::now();
    sqlx::query_as(
        r"
        UPDATE feeds
        SET last_fetched_at = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        ",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .fetch_one(pool)
    .await
    .during("mark feed fetched")
}

// ========== Feed Follows ==========

/// Make a user follow a feed.
pub async fn create_feed_follow(
    pool: &SqlitePool,
    user_id: i64,
    feed_id: i64,
) -> Result<FeedFollow, StoreError> {
    let now = Utc::now();
    sqlx::query_as(
        r"
        INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        ",
    )
    .bind(user_id)
    .bind(feed_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .during("create feed follow")
}

/// Get all follows belonging to a user.
pub async fn list_feed_follows_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<FeedFollow>, StoreError> {
    sqlx::query_as("SELECT * FROM feed_follows WHERE user_id = ? ORDER BY created_at ASC, id ASC")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .during("list feed follows")
}

/// Delete a follow, but only if it belongs to `user_id`.
pub async fn delete_feed_follow(
    pool: &SqlitePool,
    id: i64,
    user_id: i64,
) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM feed_follows WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .during("delete feed follow")?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound {
            action: "delete feed follow",
        });
    }

    Ok(())
}

// ========== Posts ==========

/// Insert a new post.
///
/// Returns [`StoreError::UniqueViolation`] when a post with the same URL
/// already exists.
pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> Result<Post, StoreError> {
    let now = Utc::now();
    sqlx::query_as(
        r"
        INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        ",
    )
    .bind(post.feed_id)
    .bind(&post.title)
    .bind(&post.url)
    .bind(&post.description)
    .bind(post.published_at)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .during("insert post")
}

/// Get the newest posts from the feeds a user follows.
pub async fn get_posts_for_user(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Post>, StoreError> {
    sqlx::query_as(
        r"
        SELECT p.* FROM posts p
        JOIN feed_follows ff ON ff.feed_id = p.feed_id
        WHERE ff.user_id = ?
        ORDER BY p.published_at DESC, p.id DESC
        LIMIT ?
        ",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .during("fetch posts for user")
}

/// Get all posts of one feed, in insertion order.
pub async fn get_posts_for_feed(pool: &SqlitePool, feed_id: i64) -> Result<Vec<Post>, StoreError> {
    sqlx::query_as("SELECT * FROM posts WHERE feed_id = ? ORDER BY id ASC")
        .bind(feed_id)
        .fetch_all(pool)
        .await
        .during("fetch posts for feed")
}

/// Count all stored posts.
pub async fn count_posts(pool: &SqlitePool) -> Result<i64, StoreError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await
        .during("count posts")?;
    Ok(row.0)
}
