use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::auth::{generate_api_key, ApiUser};
use super::error::ApiError;
use super::AppState;
use crate::db::{self as queries, Feed, FeedFollow, NewFeed, Post, StoreError, User};

const DEFAULT_POSTS_LIMIT: i64 = 10;
const MAX_POSTS_LIMIT: i64 = 100;

/// Create the router with all API routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/healthz", get(health))
        .route("/v1/err", get(always_error))
        .route("/v1/users", post(create_user).get(current_user))
        .route("/v1/feeds", post(create_feed).get(list_feeds))
        .route("/v1/feed_follows", post(create_follow).get(list_follows))
        .route("/v1/feed_follows/:id", delete(delete_follow))
        .route("/v1/posts", get(posts_for_user))
}

type ApiResult<T> = Result<T, ApiError>;

// ========== Health ==========

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn always_error() -> ApiError {
    ApiError::Internal("Internal Server Error")
}

// ========== Users ==========

#[derive(Debug, Deserialize)]
struct CreateUserParams {
    name: String,
}

async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserParams>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(params) = payload?;
    let name = params.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }

    let user = queries::create_user(state.db.pool(), name, &generate_api_key())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create user: {e}");
            ApiError::Internal("Could not create user")
        })?;

    tracing::info!(user_id = user.id, "Created user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn current_user(ApiUser(user): ApiUser) -> Json<User> {
    Json(user)
}

// ========== Feeds ==========

#[derive(Debug, Deserialize)]
struct CreateFeedParams {
    name: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct CreatedFeed {
    feed: Feed,
    feed_follow: FeedFollow,
}

async fn create_feed(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    payload: Result<Json<CreateFeedParams>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedFeed>)> {
    let Json(params) = payload?;

    let name = params.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }
    let url = validate_feed_url(&params.url)?;

    let new_feed = NewFeed {
        user_id: user.id,
        name: name.to_string(),
        url,
    };

    let (feed, feed_follow) = queries::create_feed_with_follow(state.db.pool(), &new_feed)
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation { .. } => ApiError::Conflict("Feed already registered"),
            e => {
                tracing::error!("Failed to create feed: {e}");
                ApiError::Internal("Could not create feed")
            }
        })?;

    tracing::info!(feed_id = feed.id, url = %feed.url, user_id = user.id, "Registered feed");
    Ok((StatusCode::CREATED, Json(CreatedFeed { feed, feed_follow })))
}

async fn list_feeds(State(state): State<AppState>) -> ApiResult<Json<Vec<Feed>>> {
    let feeds = queries::list_feeds(state.db.pool()).await.map_err(|e| {
        tracing::error!("Failed to list feeds: {e}");
        ApiError::Internal("Could not fetch feeds")
    })?;
    Ok(Json(feeds))
}

/// Accept only absolute http(s) URLs.
fn validate_feed_url(raw: &str) -> ApiResult<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid feed URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest("Feed URL must use http or https".to_string()));
    }

    Ok(parsed.to_string())
}

// ========== Feed Follows ==========

#[derive(Debug, Deserialize)]
struct CreateFollowParams {
    feed_id: i64,
}

async fn create_follow(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    payload: Result<Json<CreateFollowParams>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<FeedFollow>)> {
    let Json(params) = payload?;

    let feed = match queries::get_feed(state.db.pool(), params.feed_id).await {
        Ok(Some(feed)) => feed,
        Ok(None) => return Err(ApiError::NotFound("Could not find feed")),
        Err(e) => {
            tracing::error!("Failed to fetch feed: {e}");
            return Err(ApiError::Internal("Could not fetch feed"));
        }
    };

    let follow = queries::create_feed_follow(state.db.pool(), user.id, feed.id)
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation { .. } => ApiError::Conflict("Feed already followed"),
            e => {
                tracing::error!("Failed to create feed follow: {e}");
                ApiError::Internal("Could not create feed follow")
            }
        })?;

    Ok((StatusCode::CREATED, Json(follow)))
}

async fn list_follows(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
) -> ApiResult<Json<Vec<FeedFollow>>> {
    let follows = queries::list_feed_follows_for_user(state.db.pool(), user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list feed follows: {e}");
            ApiError::Internal("Could not get feed follows")
        })?;
    Ok(Json(follows))
}

async fn delete_follow(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;

    queries::delete_feed_follow(state.db.pool(), id, user.id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => ApiError::NotFound("Could not find feed follow"),
            e => {
                tracing::error!("Failed to delete feed follow: {e}");
                ApiError::Internal("Could not delete feed follow")
            }
        })?;

    Ok(Json(json!({})))
}

// ========== Posts ==========

#[derive(Debug, Deserialize)]
struct PostsParams {
    limit: Option<i64>,
}

async fn posts_for_user(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    params: Result<Query<PostsParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Post>>> {
    let Query(params) = params?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_POSTS_LIMIT)
        .clamp(1, MAX_POSTS_LIMIT);

    let posts = queries::get_posts_for_user(state.db.pool(), user.id, limit)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch posts: {e}");
            ApiError::Internal("Could not get posts")
        })?;
    Ok(Json(posts))
}
