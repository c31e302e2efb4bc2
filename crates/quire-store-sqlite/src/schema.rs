//! SQL schema for the Quire SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Foreign keys carry no `ON DELETE CASCADE`: removing a subject's content is
/// done explicitly by `delete_subject`, and a stray delete of a referenced row
/// fails instead of silently taking dependants with it.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id    TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,   -- lowercase
    display_name  TEXT NOT NULL,
    password_hash TEXT NOT NULL,          -- argon2 PHC string
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subject_groups (
    subject_id TEXT NOT NULL REFERENCES subjects(subject_id),
    group_name TEXT NOT NULL,             -- lowercase
    PRIMARY KEY (subject_id, group_name)
);

-- owner_id is written once, on INSERT.
CREATE TABLE IF NOT EXISTS posts (
    post_id    TEXT PRIMARY KEY,
    owner_id   TEXT NOT NULL REFERENCES subjects(subject_id),
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,
    published  INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS post_tags (
    post_id TEXT NOT NULL REFERENCES posts(post_id),
    tag     TEXT NOT NULL,                -- normalised: trimmed, lowercase
    PRIMARY KEY (post_id, tag)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id TEXT PRIMARY KEY,
    post_id    TEXT NOT NULL REFERENCES posts(post_id),
    owner_id   TEXT NOT NULL REFERENCES subjects(subject_id),
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS books (
    book_id          TEXT PRIMARY KEY,
    owner_id         TEXT NOT NULL REFERENCES subjects(subject_id),
    title            TEXT NOT NULL,
    author           TEXT NOT NULL,
    publication_year INTEGER,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS posts_owner_idx    ON posts(owner_id);
CREATE INDEX IF NOT EXISTS posts_created_idx  ON posts(created_at);
CREATE INDEX IF NOT EXISTS post_tags_tag_idx  ON post_tags(tag);
CREATE INDEX IF NOT EXISTS comments_post_idx  ON comments(post_id);
CREATE INDEX IF NOT EXISTS comments_owner_idx ON comments(owner_id);
CREATE INDEX IF NOT EXISTS books_owner_idx    ON books(owner_id);

PRAGMA user_version = 1;
";
