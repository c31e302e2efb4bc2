//! Handlers for `/posts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/posts` | `?q`, `?tag`, `?author`, `?page`, `?page_size`; filtered by visibility |
//! | `POST`   | `/posts` | Body: [`NewPost`]; returns 201 + stored post |
//! | `GET`    | `/posts/:id` | Single post |
//! | `PATCH`  | `/posts/:id` | Body: [`PostPatch`] |
//! | `DELETE` | `/posts/:id` | 204; also removes the post's comments |
//! | `GET`    | `/posts/:id/comments` | Oldest first; `?page`, `?page_size` |
//! | `POST`   | `/posts/:id/comments` | Body: [`NewComment`]; returns 201 |

use axum::{
  extract::State,
  http::{StatusCode, header},
  response::IntoResponse,
};
use quire_core::{
  gate::Action,
  page::{Page, Paginated},
  resource::{Comment, NewComment, NewPost, Owned, Post, PostPatch},
  store::{ContentStore, PostQuery},
  subject::Caller,
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
  /// Substring over title, content, and tag names.
  pub q:         Option<String>,
  pub tag:       Option<String>,
  /// Owner's subject id.
  pub author:    Option<Uuid>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /posts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Post>>, ApiError>
where
  S: ContentStore + 'static,
{
  search(&state, &caller, params).await.map(Json)
}

/// Shared by `/posts` and `/tags/:name/posts`.
pub(crate) async fn search<S: ContentStore>(
  state: &AppState<S>,
  caller: &Caller,
  params: ListParams,
) -> Result<Paginated<Post>, ApiError> {
  state.require(caller, Action::View, None)?;
  let query = PostQuery {
    text:       non_empty(params.q),
    tag:        non_empty(params.tag),
    author:     params.author,
    visibility: state.gate.post_visibility(caller),
    page:       Page::new(params.page, params.page_size),
  };
  state
    .store
    .list_posts(&query)
    .await
    .map_err(ApiError::store)
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /posts`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Json(body): Json<NewPost>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContentStore + 'static,
{
  let owner_id = state.require_create(&caller)?;
  body.validate()?;

  let post = state
    .store
    .create_post(owner_id, body)
    .await
    .map_err(ApiError::store)?;
  let location = format!("/posts/{}", post.post_id);
  Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(post)))
}

// ─── Get / update / delete ────────────────────────────────────────────────────

/// `GET /posts/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<Json<Post>, ApiError>
where
  S: ContentStore + 'static,
{
  let post = load(&state, id).await?;
  state.require(&caller, Action::View, Some(&post.meta()))?;
  Ok(Json(post))
}

/// `PATCH /posts/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
  Json(patch): Json<PostPatch>,
) -> Result<Json<Post>, ApiError>
where
  S: ContentStore + 'static,
{
  let post = load(&state, id).await?;
  state.require(&caller, Action::Edit, Some(&post.meta()))?;
  patch.validate()?;

  let updated = state
    .store
    .update_post(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("post", id))?;
  Ok(Json(updated))
}

/// `DELETE /posts/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ContentStore + 'static,
{
  let post = load(&state, id).await?;
  state.require(&caller, Action::Delete, Some(&post.meta()))?;

  if !state.store.delete_post(id).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("post", id));
  }
  tracing::info!(post_id = %id, by = ?caller.subject_id(), "deleted post");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Comments on a post ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /posts/:id/comments`
pub async fn list_comments<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
  Query(params): Query<PageParams>,
) -> Result<Json<Paginated<Comment>>, ApiError>
where
  S: ContentStore + 'static,
{
  let post = load(&state, id).await?;
  state.require(&caller, Action::View, Some(&post.meta()))?;

  let comments = state
    .store
    .list_comments(id, Page::new(params.page, params.page_size))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(comments))
}

/// `POST /posts/:id/comments`: the post must exist and be visible to the
/// caller.
pub async fn create_comment<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewComment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContentStore + 'static,
{
  let owner_id = state.require_create(&caller)?;
  let post = load(&state, id).await?;
  state.require(&caller, Action::View, Some(&post.meta()))?;
  body.validate()?;

  let comment = state
    .store
    .create_comment(owner_id, id, body)
    .await
    .map_err(ApiError::store)?;
  let location = format!("/comments/{}", comment.comment_id);
  Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(comment)))
}

pub(crate) async fn load<S: ContentStore>(
  state: &AppState<S>,
  id: Uuid,
) -> Result<Post, ApiError> {
  state
    .store
    .get_post(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("post", id))
}
