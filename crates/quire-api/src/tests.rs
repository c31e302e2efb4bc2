//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use argon2::{
  Algorithm, Argon2, Params, PasswordHasher, Version, password_hash::SaltString,
};
use axum::{
  body::Body,
  http::{HeaderMap, Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use quire_core::{
  gate::Gate,
  permission::{ADMIN, EDITOR, VIEWER},
  store::ContentStore,
  subject::{NewSubject, Subject},
};
use quire_store_sqlite::SqliteStore;
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, api_router};

const PASSWORD: &str = "s3cret-pass";

async fn make_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(Arc::new(store), Gate::default(), VIEWER)
}

/// Minimum-cost argon2 so seeding stays fast; verification reads the
/// parameters back out of the PHC string.
fn cheap_hash(password: &str) -> String {
  let params = Params::new(8, 1, 1, None).unwrap();
  let salt = SaltString::generate(&mut OsRng);
  Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string()
}

async fn seed(state: &AppState<SqliteStore>, username: &str, groups: &[&str]) -> Subject {
  let mut input =
    NewSubject::new(username, format!("{username}@example.com"), cheap_hash(PASSWORD));
  for group in groups {
    input = input.with_group(group);
  }
  state.store.add_subject(input).await.unwrap()
}

struct Reply {
  status:  StatusCode,
  headers: HeaderMap,
  body:    Value,
}

async fn send_as(
  state: &AppState<SqliteStore>,
  method: Method,
  uri: &str,
  auth: Option<(&str, &str)>,
  body: Option<Value>,
) -> Reply {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some((user, pass)) = auth {
    let encoded = B64.encode(format!("{user}:{pass}"));
    builder = builder.header(header::AUTHORIZATION, format!("Basic {encoded}"));
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = api_router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let headers = resp.headers().clone();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  Reply { status, headers, body }
}

/// Send as `user` with the shared test password, or anonymously.
async fn send(
  state: &AppState<SqliteStore>,
  method: Method,
  uri: &str,
  user: Option<&str>,
  body: Option<Value>,
) -> Reply {
  send_as(state, method, uri, user.map(|u| (u, PASSWORD)), body).await
}

async fn create_post(state: &AppState<SqliteStore>, user: &str, body: Value) -> String {
  let reply = send(state, Method::POST, "/posts", Some(user), Some(body)).await;
  assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
  reply.body["post_id"].as_str().unwrap().to_owned()
}

// ─── Scenario ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn blog_scenario_over_http() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  seed(&state, "bob", &[EDITOR]).await;
  seed(&state, "carol", &[VIEWER]).await;

  let post_id = create_post(
    &state,
    "alice",
    json!({ "title": "Post 1", "content": "Hello", "tags": ["Rust"] }),
  )
  .await;
  let uri = format!("/posts/{post_id}");

  let edit = json!({ "title": "Post 1 (edited)" });
  let reply = send(&state, Method::PATCH, &uri, Some("alice"), Some(edit.clone())).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["title"], "Post 1 (edited)");

  let reply = send(&state, Method::PATCH, &uri, Some("bob"), Some(edit)).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert_eq!(reply.body["reason"], "not_owner");

  let reply = send(&state, Method::GET, &uri, None, None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["tags"], json!(["rust"]));

  let reply = send(
    &state,
    Method::POST,
    &format!("{uri}/comments"),
    Some("carol"),
    Some(json!({ "content": "Nice post" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert_eq!(reply.body["reason"], "insufficient_permission");
}

// ─── Authentication ───────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_mutations_are_challenged() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  let post_id = create_post(&state, "alice", json!({ "title": "T", "content": "C" })).await;

  let reply = send(
    &state,
    Method::POST,
    "/posts",
    None,
    Some(json!({ "title": "T", "content": "C" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
  assert_eq!(reply.body["reason"], "not_authenticated");
  assert_eq!(
    reply.headers.get(header::WWW_AUTHENTICATE).unwrap(),
    "Basic realm=\"quire\""
  );

  let reply = send(&state, Method::DELETE, &format!("/posts/{post_id}"), None, None).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

  let reply = send(
    &state,
    Method::POST,
    "/books",
    None,
    Some(json!({ "title": "Dune", "author": "Frank Herbert" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_are_rejected_even_on_reads() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;

  let reply = send_as(&state, Method::GET, "/posts", Some(("alice", "nope")), None).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

  let reply = send_as(&state, Method::GET, "/posts", Some(("ghost", PASSWORD)), None).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

  let reply = send(&state, Method::GET, "/posts", None, None).await;
  assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn register_then_me() {
  let state = make_state().await;
  let body = json!({
    "username": "dave",
    "email": "Dave@Example.com",
    "password": "correct horse",
  });

  let reply = send(&state, Method::POST, "/register", None, Some(body.clone())).await;
  assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
  assert_eq!(reply.body["groups"], json!(["viewer"]));
  assert_eq!(reply.body["email"], "dave@example.com");
  assert!(reply.body.get("password_hash").is_none());
  let location = reply.headers.get(header::LOCATION).unwrap().to_str().unwrap();
  assert!(location.starts_with("/subjects/"));

  let reply =
    send_as(&state, Method::GET, "/me", Some(("dave", "correct horse")), None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["username"], "dave");
  assert_eq!(reply.body["permissions"], json!(["view"]));

  let reply = send(&state, Method::POST, "/register", None, Some(body)).await;
  assert_eq!(reply.status, StatusCode::CONFLICT);

  let reply = send(
    &state,
    Method::POST,
    "/register",
    None,
    Some(json!({ "username": "erin", "email": "erin@example.com", "password": "12345678" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let reply = send(&state, Method::GET, "/me", None, None).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subjects_edit_their_own_profile() {
  let state = make_state().await;
  seed(&state, "carol", &[VIEWER]).await;
  seed(&state, "dave", &[VIEWER]).await;

  let reply = send(
    &state,
    Method::PATCH,
    "/me",
    Some("carol"),
    Some(json!({ "display_name": "Carol B.", "email": "Carol.B@Example.com" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
  assert_eq!(reply.body["display_name"], "Carol B.");
  assert_eq!(reply.body["email"], "carol.b@example.com");
  assert_eq!(reply.body["username"], "carol");

  let reply = send(
    &state,
    Method::PATCH,
    "/me",
    Some("carol"),
    Some(json!({ "email": "dave@example.com" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::CONFLICT);

  let reply = send(
    &state,
    Method::PATCH,
    "/me",
    None,
    Some(json!({ "display_name": "Nobody" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

// ─── Posts ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unpublished_posts_are_hidden() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  seed(&state, "bob", &[EDITOR]).await;
  seed(&state, "root", &[ADMIN]).await;

  let post_id = create_post(
    &state,
    "alice",
    json!({ "title": "Draft", "content": "WIP", "published": false }),
  )
  .await;
  let uri = format!("/posts/{post_id}");

  let count = |user: Option<&'static str>| {
    let state = state.clone();
    async move { send(&state, Method::GET, "/posts", user, None).await.body["count"].clone() }
  };
  assert_eq!(count(None).await, 0);
  assert_eq!(count(Some("bob")).await, 0);
  assert_eq!(count(Some("alice")).await, 1);
  assert_eq!(count(Some("root")).await, 1);

  assert_eq!(send(&state, Method::GET, &uri, None, None).await.status, StatusCode::UNAUTHORIZED);
  let reply = send(&state, Method::GET, &uri, Some("bob"), None).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert_eq!(reply.body["reason"], "not_owner");
  assert_eq!(send(&state, Method::GET, &uri, Some("root"), None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn patch_cannot_change_owner() {
  let state = make_state().await;
  let alice = seed(&state, "alice", &[EDITOR]).await;
  let bob = seed(&state, "bob", &[EDITOR]).await;
  let post_id = create_post(&state, "alice", json!({ "title": "T", "content": "C" })).await;

  let reply = send(
    &state,
    Method::PATCH,
    &format!("/posts/{post_id}"),
    Some("alice"),
    Some(json!({ "owner_id": bob.subject_id, "content": "changed" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["owner_id"], json!(alice.subject_id));
  assert_eq!(reply.body["content"], "changed");
}

#[tokio::test]
async fn invalid_post_is_rejected() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  let reply = send(
    &state,
    Method::POST,
    "/posts",
    Some("alice"),
    Some(json!({ "title": "   ", "content": "C" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_and_tags() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  create_post(&state, "alice", json!({ "title": "Ownership", "content": "x", "tags": ["rust"] }))
    .await;
  create_post(&state, "alice", json!({ "title": "Tomatoes", "content": "y", "tags": ["garden"] }))
    .await;

  let reply = send(&state, Method::GET, "/posts?q=owner", None, None).await;
  assert_eq!(reply.body["count"], 1);
  assert_eq!(reply.body["results"][0]["title"], "Ownership");

  let reply = send(&state, Method::GET, "/tags", None, None).await;
  assert_eq!(
    reply.body,
    json!([{ "name": "garden", "posts": 1 }, { "name": "rust", "posts": 1 }])
  );

  let reply = send(&state, Method::GET, "/tags/garden/posts", None, None).await;
  assert_eq!(reply.body["count"], 1);
  assert_eq!(reply.body["results"][0]["title"], "Tomatoes");
}

// ─── Comments ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comment_lifecycle() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  seed(&state, "bob", &[EDITOR]).await;
  let post_id = create_post(&state, "alice", json!({ "title": "T", "content": "C" })).await;

  let reply = send(
    &state,
    Method::POST,
    &format!("/posts/{post_id}/comments"),
    Some("bob"),
    Some(json!({ "content": "First!" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::CREATED);
  let uri = format!("/comments/{}", reply.body["comment_id"].as_str().unwrap());

  let edit = json!({ "content": "Second?" });
  let reply = send(&state, Method::PATCH, &uri, Some("alice"), Some(edit.clone())).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert_eq!(reply.body["reason"], "not_owner");

  let reply = send(&state, Method::PATCH, &uri, Some("bob"), Some(edit)).await;
  assert_eq!(reply.status, StatusCode::OK);

  let reply = send(&state, Method::GET, &format!("/posts/{post_id}/comments"), None, None).await;
  assert_eq!(reply.body["count"], 1);
  assert_eq!(reply.body["results"][0]["content"], "Second?");
}

#[tokio::test]
async fn comment_on_missing_post_is_404() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  let reply = send(
    &state,
    Method::POST,
    &format!("/posts/{}/comments", Uuid::new_v4()),
    Some("alice"),
    Some(json!({ "content": "hello?" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_follow_their_post_visibility() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  seed(&state, "bob", &[EDITOR]).await;
  seed(&state, "root", &[ADMIN]).await;
  let post_id = create_post(&state, "alice", json!({ "title": "T", "content": "C" })).await;
  let post_uri = format!("/posts/{post_id}");

  let reply = send(
    &state,
    Method::POST,
    &format!("{post_uri}/comments"),
    Some("bob"),
    Some(json!({ "content": "secret reply" })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::CREATED);
  let uri = format!("/comments/{}", reply.body["comment_id"].as_str().unwrap());

  let hide = json!({ "published": false });
  let reply = send(&state, Method::PATCH, &post_uri, Some("alice"), Some(hide)).await;
  assert_eq!(reply.status, StatusCode::OK);

  let reply = send(&state, Method::GET, &uri, None, None).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
  assert!(reply.body.get("content").is_none());

  let reply = send(&state, Method::GET, &uri, Some("bob"), None).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert_eq!(reply.body["reason"], "not_owner");
  let edit = json!({ "content": "edited" });
  let reply = send(&state, Method::PATCH, &uri, Some("bob"), Some(edit)).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);

  assert_eq!(send(&state, Method::GET, &uri, Some("alice"), None).await.status, StatusCode::OK);
  assert_eq!(send(&state, Method::GET, &uri, Some("root"), None).await.status, StatusCode::OK);

  let show = json!({ "published": true });
  send(&state, Method::PATCH, &post_uri, Some("alice"), Some(show)).await;
  let reply = send(&state, Method::GET, &uri, None, None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["content"], "secret reply");
}

#[tokio::test]
async fn commenting_needs_a_viewable_post() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  seed(&state, "bob", &[EDITOR]).await;
  let post_id = create_post(
    &state,
    "alice",
    json!({ "title": "Draft", "content": "WIP", "published": false }),
  )
  .await;
  let uri = format!("/posts/{post_id}/comments");
  let body = json!({ "content": "hi" });

  let reply = send(&state, Method::POST, &uri, None, Some(body.clone())).await;
  assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

  let reply = send(&state, Method::POST, &uri, Some("bob"), Some(body.clone())).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert_eq!(reply.body["reason"], "not_owner");

  let reply = send(&state, Method::POST, &uri, Some("alice"), Some(body)).await;
  assert_eq!(reply.status, StatusCode::CREATED);
}

// ─── Books ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_deletes_any_book() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  seed(&state, "root", &[ADMIN]).await;

  let reply = send(
    &state,
    Method::POST,
    "/books",
    Some("alice"),
    Some(json!({ "title": "Dune", "author": "Frank Herbert", "publication_year": 1965 })),
  )
  .await;
  assert_eq!(reply.status, StatusCode::CREATED);
  let uri = format!("/books/{}", reply.body["book_id"].as_str().unwrap());

  let reply = send(&state, Method::DELETE, &uri, Some("alice"), None).await;
  assert_eq!(reply.status, StatusCode::FORBIDDEN);
  assert_eq!(reply.body["reason"], "insufficient_permission");

  let reply = send(&state, Method::DELETE, &uri, Some("root"), None).await;
  assert_eq!(reply.status, StatusCode::NO_CONTENT);
  assert_eq!(send(&state, Method::GET, &uri, None, None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn books_filter_and_order() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;
  for (title, author, year) in [
    ("Dune", "Frank Herbert", 1965),
    ("Dune Messiah", "Frank Herbert", 1969),
    ("Emma", "Jane Austen", 1815),
  ] {
    let body = json!({ "title": title, "author": author, "publication_year": year });
    let reply = send(&state, Method::POST, "/books", Some("alice"), Some(body)).await;
    assert_eq!(reply.status, StatusCode::CREATED);
  }

  let reply = send(&state, Method::GET, "/books?ordering=-publication_year", None, None).await;
  let titles: Vec<_> = reply.body["results"]
    .as_array()
    .unwrap()
    .iter()
    .map(|b| b["title"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(titles, ["Dune Messiah", "Dune", "Emma"]);

  let reply = send(&state, Method::GET, "/books?author=herbert&page_size=1", None, None).await;
  assert_eq!(reply.body["count"], 2);
  assert_eq!(reply.body["results"].as_array().unwrap().len(), 1);

  let reply = send(&state, Method::GET, "/books?ordering=owner_id", None, None).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);

  let future = json!({ "title": "Later", "author": "Someone", "publication_year": 9999 });
  let reply = send(&state, Method::POST, "/books", Some("alice"), Some(future)).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

// ─── Subjects ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_subject_cascades() {
  let state = make_state().await;
  let alice = seed(&state, "alice", &[EDITOR]).await;
  seed(&state, "bob", &[EDITOR]).await;
  seed(&state, "root", &[ADMIN]).await;

  let post_id = create_post(&state, "alice", json!({ "title": "T", "content": "C" })).await;
  send(
    &state,
    Method::POST,
    &format!("/posts/{post_id}/comments"),
    Some("bob"),
    Some(json!({ "content": "hi" })),
  )
  .await;
  send(
    &state,
    Method::POST,
    "/books",
    Some("alice"),
    Some(json!({ "title": "Dune", "author": "Frank Herbert" })),
  )
  .await;

  let uri = format!("/subjects/{}", alice.subject_id);
  let reply = send(&state, Method::GET, &uri, None, None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert!(reply.body.get("email").is_none());

  for user in ["bob", "alice"] {
    let reply = send(&state, Method::DELETE, &uri, Some(user), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN, "{user}");
  }

  let reply = send(&state, Method::DELETE, &uri, Some("root"), None).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert_eq!(reply.body["posts"], 1);
  assert_eq!(reply.body["comments"], 1);
  assert_eq!(reply.body["books"], 1);

  assert_eq!(send(&state, Method::GET, &uri, None, None).await.status, StatusCode::NOT_FOUND);
  let reply = send(&state, Method::GET, &format!("/posts/{post_id}"), None, None).await;
  assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

// ─── Malformed input ──────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_input_gets_json_errors() {
  let state = make_state().await;
  seed(&state, "alice", &[EDITOR]).await;

  for uri in ["/posts?author=not-a-uuid", "/posts?page=-1", "/posts/not-a-uuid"] {
    let reply = send(&state, Method::GET, uri, None, None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{uri}");
    assert!(reply.body["error"].is_string(), "{uri}: {}", reply.body);
  }

  let encoded = B64.encode(format!("alice:{PASSWORD}"));
  let req = Request::builder()
    .method(Method::POST)
    .uri("/posts")
    .header(header::AUTHORIZATION, format!("Basic {encoded}"))
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let resp = api_router(state.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert!(body["error"].is_string());
}
