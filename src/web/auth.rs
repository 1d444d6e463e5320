use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

use super::error::ApiError;
use crate::db::{self as queries, Database, User};

const API_KEY_SCHEME: &str = "ApiKey";

/// Generate a new API key: 64 hex characters of SHA-256 over random bytes.
pub fn generate_api_key() -> String {
    let mut seed = [0u8; 32];
    thread_rng().fill(&mut seed);
    hex::encode(Sha256::digest(seed))
}

/// Read the key from an `Authorization: ApiKey <key>` header.
///
/// # Errors
///
/// Returns `Unauthorized` if the header is missing or uses another scheme.
pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized("Missing API key"))?;

    match value.split_once(' ') {
        Some((scheme, key)) if scheme == API_KEY_SCHEME && !key.trim().is_empty() => {
            Ok(key.trim())
        }
        _ => Err(ApiError::Unauthorized("Malformed authorization header")),
    }
}

/// The user owning the request's API key.
/// Rejects with 401 Unauthorized if the key is missing or unknown.
#[derive(Debug, Clone)]
pub struct ApiUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for ApiUser
where
    S: Send + Sync,
    Database: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Database::from_ref(state);
        let api_key = extract_api_key(&parts.headers)?;

        match queries::get_user_by_api_key(db.pool(), api_key).await {
            Ok(Some(user)) => Ok(ApiUser(user)),
            Ok(None) => Err(ApiError::Unauthorized("Unknown API key")),
            Err(e) => {
                tracing::error!("Failed to look up API key: {e}");
                Err(ApiError::Internal("Could not authenticate"))
            }
        }
    }
}
