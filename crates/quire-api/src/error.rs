//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use quire_core::{gate::DenyReason, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The gate refused the request.
  #[error("{0}")]
  Denied(#[from] DenyReason),

  /// An `Authorization` header was sent but did not check out.
  #[error("invalid credentials")]
  Unauthorized,

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Validation(#[from] quire_core::Error),

  #[error("{0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend failure.
  pub fn store<E: StoreError>(err: E) -> Self {
    if err.is_conflict() {
      Self::Conflict(err.to_string())
    } else if err.is_not_found() {
      Self::NotFound(err.to_string())
    } else {
      Self::Store(Box::new(err))
    }
  }

  pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
    Self::NotFound(format!("{what} {id} not found"))
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::Denied(DenyReason::NotAuthenticated) | Self::Unauthorized => {
        StatusCode::UNAUTHORIZED
      }
      Self::Denied(_) => StatusCode::FORBIDDEN,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
      Self::Conflict(_) => StatusCode::CONFLICT,
      Self::Internal(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::Denied(reason) => {
        json!({ "error": reason.to_string(), "reason": reason.code() })
      }
      ApiError::Internal(_) | ApiError::Store(_) => {
        tracing::error!(error = %self, "request failed");
        json!({ "error": "internal server error" })
      }
      other => json!({ "error": other.to_string() }),
    };

    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"quire\""),
      );
    }
    res
  }
}
