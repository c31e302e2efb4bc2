//! [`SqliteStore`], the SQLite implementation of [`ContentStore`].

use std::path::Path;

use rusqlite::{
  Connection, OptionalExtension as _, Row, functions::FunctionFlags, params,
  params_from_iter, types::Value,
};
use uuid::Uuid;

use quire_core::{
  gate::Visibility,
  page::{Page, Paginated},
  resource::{
    Book, BookPatch, Comment, CommentPatch, NewBook, NewComment, NewPost, Post,
    PostPatch, normalize_tag, normalize_tags,
  },
  store::{
    BookOrderField, BookOrdering, BookQuery, CascadeReport, ContentStore,
    PostQuery, TagCount,
  },
  subject::{Credentials, NewSubject, ProfilePatch, Subject},
};

use crate::{
  Error, Result,
  encode::{
    RawBook, RawComment, RawPost, RawSubject, encode_dt, encode_uuid,
    like_pattern, now,
  },
  schema::SCHEMA,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// These run inside `Connection::call` closures, on the database thread.

const SUBJECT_COLUMNS: &str =
  "subject_id, username, email, display_name, password_hash, created_at";

const POST_COLUMNS: &str =
  "p.post_id, p.owner_id, p.title, p.content, p.published, p.created_at, p.updated_at";

const COMMENT_COLUMNS: &str =
  "comment_id, post_id, owner_id, content, created_at, updated_at";

const BOOK_COLUMNS: &str =
  "b.book_id, b.owner_id, b.title, b.author, b.publication_year, b.created_at, b.updated_at";

fn raw_subject(row: &Row<'_>) -> rusqlite::Result<RawSubject> {
  Ok(RawSubject {
    subject_id:    row.get(0)?,
    username:      row.get(1)?,
    email:         row.get(2)?,
    display_name:  row.get(3)?,
    password_hash: row.get(4)?,
    created_at:    row.get(5)?,
    groups:        Vec::new(),
  })
}

fn raw_post(row: &Row<'_>) -> rusqlite::Result<RawPost> {
  Ok(RawPost {
    post_id:    row.get(0)?,
    owner_id:   row.get(1)?,
    title:      row.get(2)?,
    content:    row.get(3)?,
    published:  row.get(4)?,
    created_at: row.get(5)?,
    updated_at: row.get(6)?,
    tags:       Vec::new(),
  })
}

fn raw_comment(row: &Row<'_>) -> rusqlite::Result<RawComment> {
  Ok(RawComment {
    comment_id: row.get(0)?,
    post_id:    row.get(1)?,
    owner_id:   row.get(2)?,
    content:    row.get(3)?,
    created_at: row.get(4)?,
    updated_at: row.get(5)?,
  })
}

fn raw_book(row: &Row<'_>) -> rusqlite::Result<RawBook> {
  Ok(RawBook {
    book_id:          row.get(0)?,
    owner_id:         row.get(1)?,
    title:            row.get(2)?,
    author:           row.get(3)?,
    publication_year: row.get(4)?,
    created_at:       row.get(5)?,
    updated_at:       row.get(6)?,
  })
}

fn read_groups(conn: &Connection, subject_id: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT group_name FROM subject_groups WHERE subject_id = ?1 ORDER BY group_name",
  )?;
  stmt.query_map(params![subject_id], |r| r.get(0))?.collect()
}

/// `filter` is a column name chosen by this module, never user input.
fn read_subject(
  conn: &Connection,
  filter: &'static str,
  value: &str,
) -> rusqlite::Result<Option<RawSubject>> {
  let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE {filter} = ?1");
  let Some(mut raw) = conn.query_row(&sql, params![value], raw_subject).optional()?
  else {
    return Ok(None);
  };
  raw.groups = read_groups(conn, &raw.subject_id)?;
  Ok(Some(raw))
}

fn read_tags(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn
    .prepare_cached("SELECT tag FROM post_tags WHERE post_id = ?1 ORDER BY tag")?;
  stmt.query_map(params![post_id], |r| r.get(0))?.collect()
}

fn insert_tags(conn: &Connection, post_id: &str, tags: &[String]) -> rusqlite::Result<()> {
  let mut stmt =
    conn.prepare_cached("INSERT INTO post_tags (post_id, tag) VALUES (?1, ?2)")?;
  for tag in tags {
    stmt.execute(params![post_id, tag])?;
  }
  Ok(())
}

fn read_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Option<RawPost>> {
  let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.post_id = ?1");
  let Some(mut raw) = conn.query_row(&sql, params![post_id], raw_post).optional()?
  else {
    return Ok(None);
  };
  raw.tags = read_tags(conn, &raw.post_id)?;
  Ok(Some(raw))
}

fn read_comment(conn: &Connection, comment_id: &str) -> rusqlite::Result<Option<RawComment>> {
  let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1");
  conn.query_row(&sql, params![comment_id], raw_comment).optional()
}

fn read_book(conn: &Connection, book_id: &str) -> rusqlite::Result<Option<RawBook>> {
  let sql = format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.book_id = ?1");
  conn.query_row(&sql, params![book_id], raw_book).optional()
}

fn book_order_clause(ordering: BookOrdering) -> String {
  let column = match ordering.field {
    BookOrderField::Title => "b.title COLLATE NOCASE",
    BookOrderField::Author => "b.author COLLATE NOCASE",
    BookOrderField::PublicationYear => "b.publication_year",
    BookOrderField::CreatedAt => "b.created_at",
  };
  let dir = if ordering.descending { "DESC" } else { "ASC" };
  format!("{column} {dir}, b.rowid {dir}")
}

fn where_clause(conds: &[&str]) -> String {
  if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  }
}

fn page_values(page: Page) -> [Value; 2] {
  [
    Value::Integer(i64::from(page.limit())),
    Value::Integer(page.offset() as i64),
  ]
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quire content store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        register_fold(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Register `fold(text)`, a Unicode lowercase. SQLite's own `lower()` and
/// `LIKE` only fold ASCII, so searches compare `fold(column)` against a
/// pattern lowercased in Rust.
fn register_fold(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    "fold",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )
}

/// Map a UNIQUE constraint failure to [`Error::Conflict`]; anything else stays
/// a database error.
fn unique_violation(err: tokio_rusqlite::Error, what: &str) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)) = &err
    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  {
    return Error::Conflict(format!("{what} already exists"));
  }
  Error::Database(err)
}

// ─── ContentStore impl ───────────────────────────────────────────────────────

impl ContentStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let subject = Subject {
      subject_id:   Uuid::new_v4(),
      display_name: input.display_name().to_owned(),
      username:     input.username,
      email:        input.email,
      groups:       input.groups,
      created_at:   now(),
    };

    let id_str   = encode_uuid(subject.subject_id);
    let at_str   = encode_dt(subject.created_at);
    let username = subject.username.clone();
    let email    = subject.email.clone();
    let display  = subject.display_name.clone();
    let groups   = subject.groups.clone();
    let hash     = input.password_hash;

    let taken: Option<&'static str> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if tx
          .query_row("SELECT 1 FROM subjects WHERE username = ?1", params![username], |_| Ok(()))
          .optional()?
          .is_some()
        {
          return Ok(Some("username"));
        }
        if tx
          .query_row("SELECT 1 FROM subjects WHERE email = ?1", params![email], |_| Ok(()))
          .optional()?
          .is_some()
        {
          return Ok(Some("email"));
        }

        tx.execute(
          "INSERT INTO subjects
             (subject_id, username, email, display_name, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![id_str, username, email, display, hash, at_str],
        )?;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO subject_groups (subject_id, group_name) VALUES (?1, ?2)",
          )?;
          for group in &groups {
            stmt.execute(params![id_str, group])?;
          }
        }
        tx.commit()?;
        Ok(None)
      })
      .await
      .map_err(|e| unique_violation(e, "subject"))?;

    match taken {
      Some(field) => Err(Error::Conflict(format!("{field} is already taken"))),
      None => Ok(subject),
    }
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_subject(conn, "subject_id", &id_str)?))
      .await?;
    raw.map(RawSubject::into_subject).transpose()
  }

  async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>> {
    let username = username.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(read_subject(conn, "username", &username)?))
      .await?;
    raw.map(RawSubject::into_credentials).transpose()
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(|conn| {
        let mut raws = {
          let sql = format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY created_at, rowid"
          );
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map([], raw_subject)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        for raw in &mut raws {
          raw.groups = read_groups(conn, &raw.subject_id)?;
        }
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn update_subject(&self, id: Uuid, patch: ProfilePatch) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);
    let patch = patch.normalized();

    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE subjects
             SET email = COALESCE(?2, email), display_name = COALESCE(?3, display_name)
           WHERE subject_id = ?1",
          params![id_str, patch.email, patch.display_name],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(read_subject(conn, "subject_id", &id_str)?)
      })
      .await
      .map_err(|e| unique_violation(e, "email"))?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn delete_subject(&self, id: Uuid) -> Result<Option<CascadeReport>> {
    let id_str = encode_uuid(id);

    let counts: Option<(usize, usize, usize)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if read_subject(&tx, "subject_id", &id_str)?.is_none() {
          return Ok(None);
        }

        let owned_posts = "SELECT post_id FROM posts WHERE owner_id = ?1";
        let on_posts = tx.execute(
          &format!("DELETE FROM comments WHERE post_id IN ({owned_posts})"),
          params![id_str],
        )?;
        let own_comments =
          tx.execute("DELETE FROM comments WHERE owner_id = ?1", params![id_str])?;
        tx.execute(
          &format!("DELETE FROM post_tags WHERE post_id IN ({owned_posts})"),
          params![id_str],
        )?;
        let posts = tx.execute("DELETE FROM posts WHERE owner_id = ?1", params![id_str])?;
        let books = tx.execute("DELETE FROM books WHERE owner_id = ?1", params![id_str])?;
        tx.execute("DELETE FROM subject_groups WHERE subject_id = ?1", params![id_str])?;
        tx.execute("DELETE FROM subjects WHERE subject_id = ?1", params![id_str])?;
        tx.commit()?;

        Ok(Some((posts, on_posts + own_comments, books)))
      })
      .await?;

    Ok(counts.map(|(posts, comments, books)| CascadeReport {
      subject_id: id,
      posts:      posts as u64,
      comments:   comments as u64,
      books:      books as u64,
    }))
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, owner_id: Uuid, input: NewPost) -> Result<Post> {
    let at = now();
    let post = Post {
      post_id:    Uuid::new_v4(),
      owner_id,
      title:      input.title.trim().to_owned(),
      content:    input.content,
      published:  input.published,
      tags:       normalize_tags(&input.tags)?,
      created_at: at,
      updated_at: at,
    };

    let id_str    = encode_uuid(post.post_id);
    let owner_str = encode_uuid(owner_id);
    let at_str    = encode_dt(at);
    let title     = post.title.clone();
    let content   = post.content.clone();
    let published = post.published;
    let tags      = post.tags.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO posts
             (post_id, owner_id, title, content, published, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          params![id_str, owner_str, title, content, published, at_str],
        )?;
        insert_tags(&tx, &id_str, &tags)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(post)
  }

  async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_post(conn, &id_str)?))
      .await?;
    raw.map(RawPost::into_post).transpose()
  }

  async fn list_posts(&self, query: &PostQuery) -> Result<Paginated<Post>> {
    let mut conds: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    match query.visibility {
      Visibility::Published => conds.push("p.published = 1"),
      Visibility::PublishedOrOwnedBy(id) => {
        conds.push("(p.published = 1 OR p.owner_id = ?)");
        values.push(Value::Text(encode_uuid(id)));
      }
      Visibility::All => {}
    }
    if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
      conds.push(
        "(fold(p.title) LIKE ? ESCAPE '\\' OR fold(p.content) LIKE ? ESCAPE '\\'
          OR EXISTS (SELECT 1 FROM post_tags t
                     WHERE t.post_id = p.post_id AND t.tag LIKE ? ESCAPE '\\'))",
      );
      let pattern = like_pattern(text.trim());
      values.extend(std::iter::repeat_n(Value::Text(pattern), 3));
    }
    if let Some(tag) = &query.tag {
      conds.push(
        "EXISTS (SELECT 1 FROM post_tags t WHERE t.post_id = p.post_id AND t.tag = ?)",
      );
      values.push(Value::Text(normalize_tag(tag)));
    }
    if let Some(author) = query.author {
      conds.push("p.owner_id = ?");
      values.push(Value::Text(encode_uuid(author)));
    }

    let filter = where_clause(&conds);
    let page   = query.page;

    let (count, raws): (i64, Vec<RawPost>) = self
      .conn
      .call(move |conn| {
        let count: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM posts p {filter}"),
          params_from_iter(values.iter()),
          |r| r.get(0),
        )?;

        values.extend(page_values(page));
        let mut raws = {
          let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p {filter}
             ORDER BY p.created_at DESC, p.rowid DESC
             LIMIT ? OFFSET ?"
          );
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(params_from_iter(values.iter()), raw_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        for raw in &mut raws {
          raw.tags = read_tags(conn, &raw.post_id)?;
        }
        Ok((count, raws))
      })
      .await?;

    let posts = raws
      .into_iter()
      .map(RawPost::into_post)
      .collect::<Result<Vec<_>>>()?;
    Ok(Paginated::new(page, count as u64, posts))
  }

  async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<Option<Post>> {
    let tags      = patch.tags.as_deref().map(normalize_tags).transpose()?;
    let title     = patch.title.map(|t| t.trim().to_owned());
    let content   = patch.content;
    let published = patch.published;
    let id_str    = encode_uuid(id);
    let at_str    = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE posts SET
             title      = COALESCE(?2, title),
             content    = COALESCE(?3, content),
             published  = COALESCE(?4, published),
             updated_at = ?5
           WHERE post_id = ?1",
          params![id_str, title, content, published, at_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        if let Some(tags) = tags {
          tx.execute("DELETE FROM post_tags WHERE post_id = ?1", params![id_str])?;
          insert_tags(&tx, &id_str, &tags)?;
        }
        let raw = read_post(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn delete_post(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id_str])?;
        tx.execute("DELETE FROM post_tags WHERE post_id = ?1", params![id_str])?;
        let n = tx.execute("DELETE FROM posts WHERE post_id = ?1", params![id_str])?;
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;
    Ok(deleted)
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn create_comment(
    &self,
    owner_id: Uuid,
    post_id: Uuid,
    input: NewComment,
  ) -> Result<Comment> {
    let at = now();
    let comment = Comment {
      comment_id: Uuid::new_v4(),
      post_id,
      owner_id,
      content: input.content,
      created_at: at,
      updated_at: at,
    };

    let id_str    = encode_uuid(comment.comment_id);
    let post_str  = encode_uuid(post_id);
    let owner_str = encode_uuid(owner_id);
    let at_str    = encode_dt(at);
    let content   = comment.content.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row("SELECT 1 FROM posts WHERE post_id = ?1", params![post_str], |_| Ok(()))
          .optional()?
          .is_some();
        if !exists {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO comments
             (comment_id, post_id, owner_id, content, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          params![id_str, post_str, owner_str, content, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if inserted {
      Ok(comment)
    } else {
      Err(Error::PostNotFound(post_id))
    }
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_comment(conn, &id_str)?))
      .await?;
    raw.map(RawComment::into_comment).transpose()
  }

  async fn list_comments(&self, post_id: Uuid, page: Page) -> Result<Paginated<Comment>> {
    let post_str = encode_uuid(post_id);
    let [limit, offset] = page_values(page);

    let (count, raws): (i64, Vec<RawComment>) = self
      .conn
      .call(move |conn| {
        let count: i64 = conn.query_row(
          "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
          params![post_str],
          |r| r.get(0),
        )?;
        let sql = format!(
          "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1
           ORDER BY created_at ASC, rowid ASC
           LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params![post_str, limit, offset], raw_comment)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((count, raws))
      })
      .await?;

    let comments = raws
      .into_iter()
      .map(RawComment::into_comment)
      .collect::<Result<Vec<_>>>()?;
    Ok(Paginated::new(page, count as u64, comments))
  }

  async fn update_comment(&self, id: Uuid, patch: CommentPatch) -> Result<Option<Comment>> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now());

    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE comments SET content = COALESCE(?2, content), updated_at = ?3
           WHERE comment_id = ?1",
          params![id_str, patch.content, at_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(read_comment(conn, &id_str)?)
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn delete_comment(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM comments WHERE comment_id = ?1", params![id_str])? > 0)
      })
      .await?;
    Ok(deleted)
  }

  // ── Books ─────────────────────────────────────────────────────────────────

  async fn create_book(&self, owner_id: Uuid, input: NewBook) -> Result<Book> {
    let at = now();
    let book = Book {
      book_id:          Uuid::new_v4(),
      owner_id,
      title:            input.title.trim().to_owned(),
      author:           input.author.trim().to_owned(),
      publication_year: input.publication_year,
      created_at:       at,
      updated_at:       at,
    };

    let id_str    = encode_uuid(book.book_id);
    let owner_str = encode_uuid(owner_id);
    let at_str    = encode_dt(at);
    let title     = book.title.clone();
    let author    = book.author.clone();
    let year      = book.publication_year;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO books
             (book_id, owner_id, title, author, publication_year, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          params![id_str, owner_str, title, author, year, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(book)
  }

  async fn get_book(&self, id: Uuid) -> Result<Option<Book>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(read_book(conn, &id_str)?))
      .await?;
    raw.map(RawBook::into_book).transpose()
  }

  async fn list_books(&self, query: &BookQuery) -> Result<Paginated<Book>> {
    let mut conds: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
      conds.push(
        "(fold(b.title) LIKE ? ESCAPE '\\' OR fold(b.author) LIKE ? ESCAPE '\\')",
      );
      let pattern = like_pattern(text.trim());
      values.extend(std::iter::repeat_n(Value::Text(pattern), 2));
    }
    if let Some(author) = query.author.as_deref().filter(|t| !t.trim().is_empty()) {
      conds.push("fold(b.author) LIKE ? ESCAPE '\\'");
      values.push(Value::Text(like_pattern(author.trim())));
    }
    if let Some(title) = query.title.as_deref().filter(|t| !t.trim().is_empty()) {
      conds.push("fold(b.title) LIKE ? ESCAPE '\\'");
      values.push(Value::Text(like_pattern(title.trim())));
    }

    let filter = where_clause(&conds);
    let order  = book_order_clause(query.ordering);
    let page   = query.page;

    let (count, raws): (i64, Vec<RawBook>) = self
      .conn
      .call(move |conn| {
        let count: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM books b {filter}"),
          params_from_iter(values.iter()),
          |r| r.get(0),
        )?;

        values.extend(page_values(page));
        let sql = format!(
          "SELECT {BOOK_COLUMNS} FROM books b {filter} ORDER BY {order} LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params_from_iter(values.iter()), raw_book)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((count, raws))
      })
      .await?;

    let books = raws
      .into_iter()
      .map(RawBook::into_book)
      .collect::<Result<Vec<_>>>()?;
    Ok(Paginated::new(page, count as u64, books))
  }

  async fn update_book(&self, id: Uuid, patch: BookPatch) -> Result<Option<Book>> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now());
    let title  = patch.title.map(|t| t.trim().to_owned());
    let author = patch.author.map(|a| a.trim().to_owned());
    let year   = patch.publication_year;

    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE books SET
             title            = COALESCE(?2, title),
             author           = COALESCE(?3, author),
             publication_year = COALESCE(?4, publication_year),
             updated_at       = ?5
           WHERE book_id = ?1",
          params![id_str, title, author, year, at_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(read_book(conn, &id_str)?)
      })
      .await?;

    raw.map(RawBook::into_book).transpose()
  }

  async fn delete_book(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM books WHERE book_id = ?1", params![id_str])? > 0)
      })
      .await?;
    Ok(deleted)
  }

  // ── Tags ──────────────────────────────────────────────────────────────────

  async fn list_tags(&self) -> Result<Vec<TagCount>> {
    let rows: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT t.tag, COUNT(*)
           FROM post_tags t
           JOIN posts p ON p.post_id = t.post_id
           WHERE p.published = 1
           GROUP BY t.tag
           ORDER BY t.tag",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(name, posts)| TagCount { name, posts: posts as u64 })
        .collect(),
    )
  }
}
