//! Owned content: posts, comments, and books.
//!
//! Every resource has exactly one owner, fixed when the store inserts it.
//! None of the patch types carry an owner field, so there is no path by which
//! ownership can change.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, subject::Subject};

pub const TITLE_MAX_LEN: usize = 200;
pub const BOOK_AUTHOR_MAX_LEN: usize = 100;
pub const TAG_MAX_LEN: usize = 50;

// ─── Ownership ───────────────────────────────────────────────────────────────

/// The kinds of resource the gate reasons about.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
  Post,
  Comment,
  Book,
  /// A subject's own account record, owned by the subject itself.
  Account,
}

/// What the authorization gate needs to know about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceMeta {
  pub kind:        ResourceKind,
  pub resource_id: Uuid,
  pub owner_id:    Uuid,
  /// Unpublished resources are only visible to their owner and admins.
  pub published:   bool,
}

/// Implemented by every stored type that has an owner.
pub trait Owned {
  fn meta(&self) -> ResourceMeta;
}

impl Owned for Subject {
  fn meta(&self) -> ResourceMeta {
    ResourceMeta {
      kind:        ResourceKind::Account,
      resource_id: self.subject_id,
      owner_id:    self.subject_id,
      published:   true,
    }
  }
}

// ─── Posts ───────────────────────────────────────────────────────────────────

/// A blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub post_id:    Uuid,
  pub owner_id:   Uuid,
  pub title:      String,
  pub content:    String,
  pub published:  bool,
  /// Normalised tag names, sorted.
  pub tags:       Vec<String>,
  pub created_at: DateTime<Utc>,
  /// Bumped by the store on every update.
  pub updated_at: DateTime<Utc>,
}

impl Owned for Post {
  fn meta(&self) -> ResourceMeta {
    ResourceMeta {
      kind:        ResourceKind::Post,
      resource_id: self.post_id,
      owner_id:    self.owner_id,
      published:   self.published,
    }
  }
}

fn default_published() -> bool { true }

/// Input to [`crate::store::ContentStore::create_post`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
  pub title:     String,
  pub content:   String,
  #[serde(default = "default_published")]
  pub published: bool,
  #[serde(default)]
  pub tags:      Vec<String>,
}

impl NewPost {
  pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
    Self {
      title:     title.into(),
      content:   content.into(),
      published: true,
      tags:      Vec::new(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    validate_text("title", &self.title, TITLE_MAX_LEN)?;
    validate_body("content", &self.content)?;
    normalize_tags(&self.tags)?;
    Ok(())
  }
}

/// Partial update of a post. `None` fields are left untouched; a present
/// `tags` list replaces the post's tags wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostPatch {
  pub title:     Option<String>,
  pub content:   Option<String>,
  pub published: Option<bool>,
  pub tags:      Option<Vec<String>>,
}

impl PostPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(title) = &self.title {
      validate_text("title", title, TITLE_MAX_LEN)?;
    }
    if let Some(content) = &self.content {
      validate_body("content", content)?;
    }
    if let Some(tags) = &self.tags {
      normalize_tags(tags)?;
    }
    Ok(())
  }
}

// ─── Comments ────────────────────────────────────────────────────────────────

/// A comment on a post. Comments have no draft state of their own; the API
/// hides them whenever their post is hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id: Uuid,
  pub post_id:    Uuid,
  pub owner_id:   Uuid,
  pub content:    String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Owned for Comment {
  fn meta(&self) -> ResourceMeta {
    ResourceMeta {
      kind:        ResourceKind::Comment,
      resource_id: self.comment_id,
      owner_id:    self.owner_id,
      published:   true,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
  pub content: String,
}

impl NewComment {
  pub fn new(content: impl Into<String>) -> Self {
    Self { content: content.into() }
  }

  pub fn validate(&self) -> Result<()> { validate_body("content", &self.content) }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentPatch {
  pub content: Option<String>,
}

impl CommentPatch {
  pub fn validate(&self) -> Result<()> {
    match &self.content {
      Some(content) => validate_body("content", content),
      None => Ok(()),
    }
  }
}

// ─── Books ───────────────────────────────────────────────────────────────────

/// A catalogue entry. Books are always published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
  pub book_id:          Uuid,
  pub owner_id:         Uuid,
  pub title:            String,
  pub author:           String,
  pub publication_year: Option<i32>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl Owned for Book {
  fn meta(&self) -> ResourceMeta {
    ResourceMeta {
      kind:        ResourceKind::Book,
      resource_id: self.book_id,
      owner_id:    self.owner_id,
      published:   true,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
  pub title:            String,
  pub author:           String,
  pub publication_year: Option<i32>,
}

impl NewBook {
  pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
    Self {
      title:            title.into(),
      author:           author.into(),
      publication_year: None,
    }
  }

  pub fn validate(&self) -> Result<()> { self.validate_at(Utc::now().year()) }

  /// As [`Self::validate`], against an explicit current year.
  pub fn validate_at(&self, current_year: i32) -> Result<()> {
    validate_text("title", &self.title, TITLE_MAX_LEN)?;
    validate_text("author", &self.author, BOOK_AUTHOR_MAX_LEN)?;
    validate_year(self.publication_year, current_year)
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookPatch {
  pub title:            Option<String>,
  pub author:           Option<String>,
  pub publication_year: Option<i32>,
}

impl BookPatch {
  pub fn validate(&self) -> Result<()> { self.validate_at(Utc::now().year()) }

  pub fn validate_at(&self, current_year: i32) -> Result<()> {
    if let Some(title) = &self.title {
      validate_text("title", title, TITLE_MAX_LEN)?;
    }
    if let Some(author) = &self.author {
      validate_text("author", author, BOOK_AUTHOR_MAX_LEN)?;
    }
    validate_year(self.publication_year, current_year)
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn validate_text(field: &str, value: &str, max: usize) -> Result<()> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::validation(format!("{field} must not be empty")));
  }
  if trimmed.chars().count() > max {
    return Err(Error::validation(format!(
      "{field} must be at most {max} characters"
    )));
  }
  Ok(())
}

fn validate_body(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(format!("{field} must not be empty")));
  }
  Ok(())
}

fn validate_year(year: Option<i32>, current_year: i32) -> Result<()> {
  match year {
    Some(y) if y > current_year => Err(Error::validation(
      "publication year cannot be in the future",
    )),
    _ => Ok(()),
  }
}

/// Trim and lowercase tag names, dropping duplicates. The result is sorted.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
  let mut out: Vec<String> = Vec::with_capacity(tags.len());
  for tag in tags {
    let tag = normalize_tag(tag);
    if tag.is_empty() {
      return Err(Error::validation("tags must not be empty"));
    }
    if tag.chars().count() > TAG_MAX_LEN {
      return Err(Error::validation(format!(
        "tags must be at most {TAG_MAX_LEN} characters"
      )));
    }
    out.push(tag);
  }
  out.sort();
  out.dedup();
  Ok(out)
}

pub fn normalize_tag(tag: &str) -> String { tag.trim().to_lowercase() }
