//! Handlers for `/tags` endpoints.

use axum::extract::State;
use quire_core::{
  gate::Action,
  page::Paginated,
  resource::Post,
  store::{ContentStore, TagCount},
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::CurrentCaller,
  error::ApiError,
  extract::{Json, Path, Query},
  posts::{self, ListParams},
};

/// `GET /tags`: every tag on a published post, with its post count.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
) -> Result<Json<Vec<TagCount>>, ApiError>
where
  S: ContentStore + 'static,
{
  state.require(&caller, Action::View, None)?;
  let tags = state.store.list_tags().await.map_err(ApiError::store)?;
  Ok(Json(tags))
}

#[derive(Debug, Default, Deserialize)]
pub struct TagPostsParams {
  pub q:         Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /tags/:name/posts`: same as `GET /posts?tag=:name`.
pub async fn posts<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(name): Path<String>,
  Query(params): Query<TagPostsParams>,
) -> Result<Json<Paginated<Post>>, ApiError>
where
  S: ContentStore + 'static,
{
  let params = ListParams {
    q: params.q,
    tag: Some(name),
    author: None,
    page: params.page,
    page_size: params.page_size,
  };
  posts::search(&state, &caller, params).await.map(Json)
}
