//! The `ContentStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `quire-store-sqlite`).
//! The API and server crates depend on this abstraction, not on any concrete
//! backend. The store performs no authorization of its own: callers consult
//! the [`Gate`](crate::gate::Gate) first.

use std::{future::Future, str::FromStr};

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error,
  gate::Visibility,
  page::{Page, Paginated},
  resource::{
    Book, BookPatch, Comment, CommentPatch, NewBook, NewComment, NewPost, Post,
    PostPatch,
  },
  subject::{Credentials, NewSubject, ProfilePatch, Subject},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`ContentStore::list_posts`].
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
  /// Case-insensitive substring over title, content, and tag names.
  pub text:       Option<String>,
  /// Restrict to posts carrying this tag.
  pub tag:        Option<String>,
  /// Restrict to posts owned by this subject.
  pub author:     Option<Uuid>,
  pub visibility: Visibility,
  pub page:       Page,
}

/// Sortable book columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookOrderField {
  #[default]
  Title,
  Author,
  PublicationYear,
  CreatedAt,
}

/// Book ordering, written as a field name with an optional `-` prefix for
/// descending order, e.g. `-publication_year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookOrdering {
  pub field:      BookOrderField,
  pub descending: bool,
}

impl FromStr for BookOrdering {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let (descending, name) = match s.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, s),
    };
    let field = match name {
      "title" => BookOrderField::Title,
      "author" => BookOrderField::Author,
      "publication_year" => BookOrderField::PublicationYear,
      "created_at" => BookOrderField::CreatedAt,
      other => return Err(Error::UnknownOrdering(other.to_owned())),
    };
    Ok(Self { field, descending })
  }
}

/// Parameters for [`ContentStore::list_books`].
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
  /// Case-insensitive substring over title and author.
  pub text:     Option<String>,
  pub author:   Option<String>,
  pub title:    Option<String>,
  pub ordering: BookOrdering,
  pub page:     Page,
}

// ─── Result types ────────────────────────────────────────────────────────────

/// What [`ContentStore::delete_subject`] removed along with the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
  pub subject_id: Uuid,
  pub posts:      u64,
  /// The subject's own comments plus every comment on the subject's posts.
  pub comments:   u64,
  pub books:      u64,
}

/// A tag with the number of published posts carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
  pub name:  String,
  pub posts: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Backend errors the API layer distinguishes from plain failures.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// A uniqueness constraint was violated (e.g. a taken username).
  fn is_conflict(&self) -> bool { false }

  /// A referenced parent row vanished (e.g. commenting on a deleted post).
  fn is_not_found(&self) -> bool { false }
}

/// Abstraction over a Quire content store backend.
///
/// The store assigns ids and timestamps. No update method writes an
/// `owner_id`; ownership is fixed at creation.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ContentStore: Send + Sync {
  type Error: StoreError;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Persist a new subject. Fails with a conflict if the username or email
  /// is taken.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Look up a subject and its password hash by exact username.
  fn find_credentials<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + 'a;

  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Apply a profile change. Returns `None` if the subject does not exist;
  /// fails with a conflict if the new email is taken.
  fn update_subject(
    &self,
    id: Uuid,
    patch: ProfilePatch,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Delete a subject and everything it owns, atomically. Returns `None` if
  /// the subject does not exist.
  fn delete_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CascadeReport>, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  fn create_post(
    &self,
    owner_id: Uuid,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  fn get_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_posts<'a>(
    &'a self,
    query: &'a PostQuery,
  ) -> impl Future<Output = Result<Paginated<Post>, Self::Error>> + Send + 'a;

  /// Returns `None` if the post does not exist.
  fn update_post(
    &self,
    id: Uuid,
    patch: PostPatch,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Delete a post with its comments and tag links. Returns `false` if the
  /// post did not exist.
  fn delete_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  fn create_comment(
    &self,
    owner_id: Uuid,
    post_id: Uuid,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Oldest first.
  fn list_comments(
    &self,
    post_id: Uuid,
    page: Page,
  ) -> impl Future<Output = Result<Paginated<Comment>, Self::Error>> + Send + '_;

  fn update_comment(
    &self,
    id: Uuid,
    patch: CommentPatch,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  fn delete_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Books ─────────────────────────────────────────────────────────────

  fn create_book(
    &self,
    owner_id: Uuid,
    input: NewBook,
  ) -> impl Future<Output = Result<Book, Self::Error>> + Send + '_;

  fn get_book(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Book>, Self::Error>> + Send + '_;

  fn list_books<'a>(
    &'a self,
    query: &'a BookQuery,
  ) -> impl Future<Output = Result<Paginated<Book>, Self::Error>> + Send + 'a;

  fn update_book(
    &self,
    id: Uuid,
    patch: BookPatch,
  ) -> impl Future<Output = Result<Option<Book>, Self::Error>> + Send + '_;

  fn delete_book(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Tags ──────────────────────────────────────────────────────────────

  /// Every tag attached to at least one published post, alphabetically.
  fn list_tags(
    &self,
  ) -> impl Future<Output = Result<Vec<TagCount>, Self::Error>> + Send + '_;
}
