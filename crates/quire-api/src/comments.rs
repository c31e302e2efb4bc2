//! Handlers for `/comments/:id`. Comments are created under their post; see
//! [`crate::posts::create_comment`].
//!
//! A comment is only reachable by callers who may view its post, so every
//! handler checks `view` on the parent before acting on the comment.

use axum::{extract::State, http::StatusCode};
use quire_core::{
  gate::Action,
  resource::{Comment, CommentPatch, Owned},
  store::ContentStore,
  subject::Caller,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::CurrentCaller,
  error::ApiError,
  extract::{Json, Path},
  posts,
};

/// `GET /comments/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<Json<Comment>, ApiError>
where
  S: ContentStore + 'static,
{
  let comment = load(&state, &caller, id).await?;
  state.require(&caller, Action::View, Some(&comment.meta()))?;
  Ok(Json(comment))
}

/// `PATCH /comments/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
  Json(patch): Json<CommentPatch>,
) -> Result<Json<Comment>, ApiError>
where
  S: ContentStore + 'static,
{
  let comment = load(&state, &caller, id).await?;
  state.require(&caller, Action::Edit, Some(&comment.meta()))?;
  patch.validate()?;

  let updated = state
    .store
    .update_comment(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("comment", id))?;
  Ok(Json(updated))
}

/// `DELETE /comments/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ContentStore + 'static,
{
  let comment = load(&state, &caller, id).await?;
  state.require(&caller, Action::Delete, Some(&comment.meta()))?;

  if !state.store.delete_comment(id).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("comment", id));
  }
  Ok(StatusCode::NO_CONTENT)
}

/// Load a comment whose post `caller` may view.
async fn load<S: ContentStore>(
  state: &AppState<S>,
  caller: &Caller,
  id: Uuid,
) -> Result<Comment, ApiError> {
  let comment = state
    .store
    .get_comment(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("comment", id))?;
  let post = posts::load(state, comment.post_id).await?;
  state.require(caller, Action::View, Some(&post.meta()))?;
  Ok(comment)
}
