//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order matches chronological order. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use quire_core::{
  resource::{Book, Comment, Post},
  subject::{Credentials, Subject},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// The current time at the precision [`encode_dt`] keeps, so a freshly built
/// record compares equal to the same record read back.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── LIKE patterns ────────────────────────────────────────────────────────────

/// Wrap `text` in `%…%` for a substring match, lowercased and with LIKE
/// wildcards escaped by `\`. Use together with `ESCAPE '\'` against a
/// `fold(..)` column.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.to_lowercase().chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from a `subjects` row plus its `subject_groups`.
pub struct RawSubject {
  pub subject_id:    String,
  pub username:      String,
  pub email:         String,
  pub display_name:  String,
  pub password_hash: String,
  pub created_at:    String,
  pub groups:        Vec<String>,
}

impl RawSubject {
  pub fn into_credentials(self) -> Result<Credentials> {
    let subject = Subject {
      subject_id:   decode_uuid(&self.subject_id)?,
      username:     self.username,
      email:        self.email,
      display_name: self.display_name,
      groups:       self.groups.into_iter().collect(),
      created_at:   decode_dt(&self.created_at)?,
    };
    Ok(Credentials { subject, password_hash: self.password_hash })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(self.into_credentials()?.subject)
  }
}

/// Raw values read from a `posts` row plus its tags.
pub struct RawPost {
  pub post_id:    String,
  pub owner_id:   String,
  pub title:      String,
  pub content:    String,
  pub published:  bool,
  pub created_at: String,
  pub updated_at: String,
  pub tags:       Vec<String>,
}

impl RawPost {
  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:    decode_uuid(&self.post_id)?,
      owner_id:   decode_uuid(&self.owner_id)?,
      title:      self.title,
      content:    self.content,
      published:  self.published,
      tags:       self.tags,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `comments` row.
pub struct RawComment {
  pub comment_id: String,
  pub post_id:    String,
  pub owner_id:   String,
  pub content:    String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawComment {
  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id: decode_uuid(&self.comment_id)?,
      post_id:    decode_uuid(&self.post_id)?,
      owner_id:   decode_uuid(&self.owner_id)?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `books` row.
pub struct RawBook {
  pub book_id:          String,
  pub owner_id:         String,
  pub title:            String,
  pub author:           String,
  pub publication_year: Option<i32>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawBook {
  pub fn into_book(self) -> Result<Book> {
    Ok(Book {
      book_id:          decode_uuid(&self.book_id)?,
      owner_id:         decode_uuid(&self.owner_id)?,
      title:            self.title,
      author:           self.author,
      publication_year: self.publication_year,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
    assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    assert_eq!(like_pattern("Über"), "%über%");
  }

  #[test]
  fn timestamps_are_fixed_width() {
    let a = decode_dt("2024-03-01T10:00:00Z").unwrap();
    let b = decode_dt("2024-03-01T10:00:00.5Z").unwrap();
    assert_eq!(encode_dt(a).len(), encode_dt(b).len());
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn now_matches_stored_precision() {
    let at = now();
    assert_eq!(decode_dt(&encode_dt(at)).unwrap(), at);
  }
}
