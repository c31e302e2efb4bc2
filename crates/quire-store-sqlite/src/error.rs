//! Error type for `quire-store-sqlite`.

use quire_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quire_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A unique column (username, email) already holds this value.
  #[error("conflict: {0}")]
  Conflict(String),

  /// Attempted to comment on a post that does not exist.
  #[error("post not found: {0}")]
  PostNotFound(uuid::Uuid),
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }

  fn is_not_found(&self) -> bool { matches!(self, Self::PostNotFound(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
