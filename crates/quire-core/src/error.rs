//! Error types for `quire-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// User-supplied input failed a field check.
  #[error("invalid input: {0}")]
  Validation(String),

  #[error("unknown group: {0:?}")]
  UnknownGroup(String),

  #[error("group {0:?} is defined more than once")]
  DuplicateGroup(String),

  #[error("unknown ordering field: {0:?}")]
  UnknownOrdering(String),
}

impl Error {
  pub(crate) fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
