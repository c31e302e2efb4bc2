//! Handlers for `/books` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/books` | `?q`, `?author`, `?title`, `?ordering`, `?page`, `?page_size` |
//! | `POST`   | `/books` | Body: [`NewBook`]; returns 201 + stored book |
//! | `GET`    | `/books/:id` | Single book |
//! | `PATCH`  | `/books/:id` | Body: [`BookPatch`] |
//! | `DELETE` | `/books/:id` | 204 |
//!
//! `ordering` takes `title`, `author`, `publication_year`, or `created_at`,
//! with a leading `-` for descending order.

use axum::{
  extract::State,
  http::{StatusCode, header},
  response::IntoResponse,
};
use quire_core::{
  gate::Action,
  page::{Page, Paginated},
  resource::{Book, BookPatch, NewBook, Owned},
  store::{BookOrdering, BookQuery, ContentStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentCaller,
  error::ApiError,
  extract::{Json, Path, Query},
  non_empty,
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:         Option<String>,
  pub author:    Option<String>,
  pub title:     Option<String>,
  pub ordering:  Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /books`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Book>>, ApiError>
where
  S: ContentStore + 'static,
{
  state.require(&caller, Action::View, None)?;

  let ordering = match non_empty(params.ordering) {
    Some(o) => o.parse::<BookOrdering>()?,
    None => BookOrdering::default(),
  };
  let query = BookQuery {
    text: non_empty(params.q),
    author: non_empty(params.author),
    title: non_empty(params.title),
    ordering,
    page: Page::new(params.page, params.page_size),
  };
  let books = state
    .store
    .list_books(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(books))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /books`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Json(body): Json<NewBook>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContentStore + 'static,
{
  let owner_id = state.require_create(&caller)?;
  body.validate()?;

  let book = state
    .store
    .create_book(owner_id, body)
    .await
    .map_err(ApiError::store)?;
  let location = format!("/books/{}", book.book_id);
  Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(book)))
}

// ─── Get / update / delete ────────────────────────────────────────────────────

/// `GET /books/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<Json<Book>, ApiError>
where
  S: ContentStore + 'static,
{
  let book = load(&state, id).await?;
  state.require(&caller, Action::View, Some(&book.meta()))?;
  Ok(Json(book))
}

/// `PATCH /books/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
  Json(patch): Json<BookPatch>,
) -> Result<Json<Book>, ApiError>
where
  S: ContentStore + 'static,
{
  let book = load(&state, id).await?;
  state.require(&caller, Action::Edit, Some(&book.meta()))?;
  patch.validate()?;

  let updated = state
    .store
    .update_book(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("book", id))?;
  Ok(Json(updated))
}

/// `DELETE /books/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ContentStore + 'static,
{
  let book = load(&state, id).await?;
  state.require(&caller, Action::Delete, Some(&book.meta()))?;

  if !state.store.delete_book(id).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("book", id));
  }
  tracing::info!(book_id = %id, by = ?caller.subject_id(), "deleted book");
  Ok(StatusCode::NO_CONTENT)
}

async fn load<S: ContentStore>(state: &AppState<S>, id: Uuid) -> Result<Book, ApiError> {
  state
    .store
    .get_book(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("book", id))
}
