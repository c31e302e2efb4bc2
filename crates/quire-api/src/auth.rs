//! HTTP Basic-auth extractor and password hashing.
//!
//! A request without an `Authorization` header is anonymous. A request that
//! sends one must present valid credentials; a bad header is a 401, never a
//! silent downgrade to anonymous.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderValue, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use quire_core::{store::ContentStore, subject::Caller};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// The resolved caller for a request.
pub struct CurrentCaller(pub Caller);

impl<S> FromRequestParts<AppState<S>> for CurrentCaller
where
  S: ContentStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
      return Ok(Self(Caller::Anonymous));
    };
    let (username, password) = parse_basic(value)?;

    let Some(creds) = state
      .store
      .find_credentials(&username)
      .await
      .map_err(ApiError::store)?
    else {
      tracing::debug!(%username, "unknown username");
      return Err(ApiError::Unauthorized);
    };

    if !verify_password(password, creds.password_hash).await? {
      tracing::debug!(%username, "wrong password");
      return Err(ApiError::Unauthorized);
    }
    Ok(Self(Caller::Subject(creds.subject)))
  }
}

/// Split a `Basic` header value into username and password.
fn parse_basic(value: &HeaderValue) -> Result<(String, String), ApiError> {
  let value = value.to_str().map_err(|_| ApiError::Unauthorized)?;
  let encoded = value
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;
  let decoded = B64
    .decode(encoded.trim())
    .map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Check `password` against a stored PHC string off the async runtime.
/// An unparseable stored hash counts as a mismatch.
async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
  tokio::task::spawn_blocking(move || {
    PasswordHash::new(&hash).is_ok_and(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
  })
  .await
  .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Hash `password` with argon2id and a fresh random salt, returning the PHC
/// string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
  tokio::task::spawn_blocking(move || hash_password(&password))
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
}
