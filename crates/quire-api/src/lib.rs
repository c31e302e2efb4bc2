//! JSON REST API for Quire.
//!
//! Exposes an axum [`Router`] backed by any [`quire_core::store::ContentStore`].
//! Every handler resolves the [`Caller`](quire_core::subject::Caller) from the
//! request, asks the [`Gate`] before touching the store, and maps a refusal to
//! 401 or 403. TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", quire_api::api_router(state))
//! ```

pub mod auth;
pub mod books;
pub mod comments;
pub mod error;
pub mod extract;
pub mod guard;
pub mod posts;
pub mod subjects;
pub mod tags;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use quire_core::{gate::Gate, store::ContentStore};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:         Arc<S>,
  pub gate:          Arc<Gate>,
  /// Group given to subjects created through `POST /register`.
  pub default_group: Arc<str>,
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>, gate: Gate, default_group: &str) -> Self {
    Self {
      store,
      gate: Arc::new(gate),
      default_group: Arc::from(default_group),
    }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:         Arc::clone(&self.store),
      gate:          Arc::clone(&self.gate),
      default_group: Arc::clone(&self.default_group),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: ContentStore + 'static,
{
  Router::new()
    // Subjects
    .route("/register", post(subjects::register::<S>))
    .route("/me", get(subjects::me::<S>).patch(subjects::update_me::<S>))
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S>).delete(subjects::delete_one::<S>),
    )
    // Posts
    .route("/posts", get(posts::list::<S>).post(posts::create::<S>))
    .route(
      "/posts/{id}",
      get(posts::get_one::<S>)
        .patch(posts::update::<S>)
        .delete(posts::delete_one::<S>),
    )
    .route(
      "/posts/{id}/comments",
      get(posts::list_comments::<S>).post(posts::create_comment::<S>),
    )
    // Comments
    .route(
      "/comments/{id}",
      get(comments::get_one::<S>)
        .patch(comments::update::<S>)
        .delete(comments::delete_one::<S>),
    )
    // Tags
    .route("/tags", get(tags::list::<S>))
    .route("/tags/{name}/posts", get(tags::posts::<S>))
    // Books
    .route("/books", get(books::list::<S>).post(books::create::<S>))
    .route(
      "/books/{id}",
      get(books::get_one::<S>)
        .patch(books::update::<S>)
        .delete(books::delete_one::<S>),
    )
    .with_state(state)
}

/// Trim an optional query parameter, treating blank values as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests;
