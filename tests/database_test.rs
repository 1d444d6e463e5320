//! Integration tests for database operations.

use chrono::{TimeZone, Utc};
use feed_aggregator::db::{
    count_posts, create_feed_follow, create_feed_with_follow, create_user, delete_feed_follow,
    get_feed, get_posts_for_feed, get_posts_for_user, get_user_by_api_key, insert_post,
    list_feed_follows_for_user, list_feeds, mark_feed_fetched, next_feeds_to_fetch, Database,
    Feed, FeedStore, NewFeed, NewPost, StoreError, User,
};
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn create_test_user(db: &Database, name: &str) -> User {
    create_user(db.pool(), name, &format!("key-{name}"))
        .await
        .expect("Failed to create user")
}

async fn create_test_feed(db: &Database, user: &User, url: &str) -> Feed {
    let new_feed = NewFeed {
        user_id: user.id,
        name: format!("Feed {url}"),
        url: url.to_string(),
    };
    create_feed_with_follow(db.pool(), &new_feed)
        .await
        .expect("Failed to create feed")
        .0
}

fn new_post(feed_id: i64, url: &str, day: u32) -> NewPost {
    NewPost {
        feed_id,
        title: format!("Post {url}"),
        url: url.to_string(),
        description: None,
        published_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_database_reopens_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.sqlite");

    let db = Database::new(&db_path).await.unwrap();
    create_test_user(&db, "alice").await;
    db.pool().close().await;

    // Migrations must be idempotent and data preserved
    let db = Database::new(&db_path).await.unwrap();
    let user = get_user_by_api_key(db.pool(), "key-alice").await.unwrap();
    assert!(user.is_some());
}

#[tokio::test]
async fn test_create_and_lookup_user() {
    let (db, _temp_dir) = setup_db().await;

    let user = create_test_user(&db, "alice").await;
    assert!(user.id > 0);
    assert_eq!(user.name, "alice");

    let found = get_user_by_api_key(db.pool(), "key-alice")
        .await
        .unwrap()
        .expect("User not found");
    assert_eq!(found.id, user.id);

    assert!(get_user_by_api_key(db.pool(), "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_api_key_is_unique_violation() {
    let (db, _temp_dir) = setup_db().await;

    create_user(db.pool(), "a", "same-key").await.unwrap();
    let err = create_user(db.pool(), "b", "same-key").await.unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_create_feed_follows_it() {
    let (db, _temp_dir) = setup_db().await;
    let user = create_test_user(&db, "alice").await;

    let new_feed = NewFeed {
        user_id: user.id,
        name: "Example".to_string(),
        url: "https://example.com/rss".to_string(),
    };
    let (feed, follow) = create_feed_with_follow(db.pool(), &new_feed).await.unwrap();

    assert_eq!(feed.user_id, user.id);
    assert!(feed.last_fetched_at.is_none());
    assert_eq!(follow.feed_id, feed.id);
    assert_eq!(follow.user_id, user.id);

    let follows = list_feed_follows_for_user(db.pool(), user.id).await.unwrap();
    assert_eq!(follows.len(), 1);

    let fetched = get_feed(db.pool(), feed.id).await.unwrap().unwrap();
    assert_eq!(fetched, feed);
}

#[tokio::test]
async fn test_duplicate_feed_url_rolls_back() {
    let (db, _temp_dir) = setup_db().await;
    let user = create_test_user(&db, "alice").await;
    create_test_feed(&db, &user, "https://example.com/rss").await;

    let new_feed = NewFeed {
        user_id: user.id,
        name: "Again".to_string(),
        url: "https://example.com/rss".to_string(),
    };
    let err = create_feed_with_follow(db.pool(), &new_feed)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    assert_eq!(list_feeds(db.pool()).await.unwrap().len(), 1);
    assert_eq!(
        list_feed_follows_for_user(db.pool(), user.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_follow_and_unfollow() {
    let (db, _temp_dir) = setup_db().await;
    let alice = create_test_user(&db, "alice").await;
    let bob = create_test_user(&db, "bob").await;
    let feed = create_test_feed(&db, &alice, "https://example.com/rss").await;

    let follow = create_feed_follow(db.pool(), bob.id, feed.id).await.unwrap();

    // Following twice is rejected
    let err = create_feed_follow(db.pool(), bob.id, feed.id)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    // Only the owner may delete a follow
    let err = delete_feed_follow(db.pool(), follow.id, alice.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    delete_feed_follow(db.pool(), follow.id, bob.id)
        .await
        .unwrap();
    assert!(list_feed_follows_for_user(db.pool(), bob.id)
        .await
        .unwrap()
        .is_empty());

    let err = delete_feed_follow(db.pool(), follow.id, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_next_feeds_orders_never_fetched_first() {
    let (db, _temp_dir) = setup_db().await;
    let user = create_test_user(&db, "alice").await;

    let a = create_test_feed(&db, &user, "https://a.example.com/rss").await;
    let b = create_test_feed(&db, &user, "https://b.example.com/rss").await;
    let c = create_test_feed(&db, &user, "https://c.example.com/rss").await;
    let d = create_test_feed(&db, &user, "https://d.example.com/rss").await;

    // Fetch b, then a; c and d stay never-fetched
    mark_feed_fetched(db.pool(), b.id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    mark_feed_fetched(db.pool(), a.id).await.unwrap();

    let batch = next_feeds_to_fetch(db.pool(), 10).await.unwrap();
    let ids: Vec<i64> = batch.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![c.id, d.id, b.id, a.id]);

    // Nulls first, then ascending
    let stamps: Vec<_> = batch.iter().map(|f| f.last_fetched_at).collect();
    assert!(stamps[0].is_none() && stamps[1].is_none());
    assert!(stamps[2].unwrap() < stamps[3].unwrap());

    // Limit is respected
    let batch = next_feeds_to_fetch(db.pool(), 3).await.unwrap();
    assert_eq!(batch.len(), 3);

    // The trait goes through the same query
    let batch = FeedStore::next_feeds_to_fetch(&db, 2).await.unwrap();
    assert_eq!(
        batch.iter().map(|f| f.id).collect::<Vec<_>>(),
        vec![c.id, d.id]
    );
}

#[tokio::test]
async fn test_mark_feed_fetched() {
    let (db, _temp_dir) = setup_db().await;
    let user = create_test_user(&db, "alice").await;
    let feed = create_test_feed(&db, &user, "https://example.com/rss").await;

    let before = Utc::now();
    let marked = mark_feed_fetched(db.pool(), feed.id).await.unwrap();

    let fetched_at = marked.last_fetched_at.expect("last_fetched_at not set");
    assert!(fetched_at >= before);
    assert_eq!(marked.updated_at, fetched_at);

    let err = mark_feed_fetched(db.pool(), 9999).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_insert_post_duplicate_url_is_unique_violation() {
    let (db, _temp_dir) = setup_db().await;
    let user = create_test_user(&db, "alice").await;
    let feed = create_test_feed(&db, &user, "https://example.com/rss").await;

    let post = insert_post(db.pool(), &new_post(feed.id, "https://example.com/1", 1))
        .await
        .unwrap();
    assert_eq!(post.url, "https://example.com/1");
    assert_eq!(
        post.published_at,
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    );

    let err = insert_post(db.pool(), &new_post(feed.id, "https://example.com/1", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));

    assert_eq!(count_posts(db.pool()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_description_none_round_trips() {
    let (db, _temp_dir) = setup_db().await;
    let user = create_test_user(&db, "alice").await;
    let feed = create_test_feed(&db, &user, "https://example.com/rss").await;

    let mut with_description = new_post(feed.id, "https://example.com/2", 2);
    with_description.description = Some("Body".to_string());
    insert_post(db.pool(), &new_post(feed.id, "https://example.com/1", 1))
        .await
        .unwrap();
    insert_post(db.pool(), &with_description).await.unwrap();

    let posts = get_posts_for_feed(db.pool(), feed.id).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].description, None);
    assert_eq!(posts[1].description.as_deref(), Some("Body"));
}

#[tokio::test]
async fn test_posts_for_user_only_followed_newest_first() {
    let (db, _temp_dir) = setup_db().await;
    let alice = create_test_user(&db, "alice").await;
    let bob = create_test_user(&db, "bob").await;

    let followed = create_test_feed(&db, &alice, "https://a.example.com/rss").await;
    let other = create_test_feed(&db, &bob, "https://b.example.com/rss").await;

    insert_post(db.pool(), &new_post(followed.id, "https://a.example.com/1", 1))
        .await
        .unwrap();
    insert_post(db.pool(), &new_post(followed.id, "https://a.example.com/3", 3))
        .await
        .unwrap();
    insert_post(db.pool(), &new_post(followed.id, "https://a.example.com/2", 2))
        .await
        .unwrap();
    insert_post(db.pool(), &new_post(other.id, "https://b.example.com/1", 4))
        .await
        .unwrap();

    let posts = get_posts_for_user(db.pool(), alice.id, 10).await.unwrap();
    let urls: Vec<&str> = posts.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://a.example.com/3",
            "https://a.example.com/2",
            "https://a.example.com/1"
        ]
    );

    let posts = get_posts_for_user(db.pool(), alice.id, 2).await.unwrap();
    assert_eq!(posts.len(), 2);
}
