//! Handlers for registration and `/subjects` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/register` | Open; body [`RegisterBody`]; 201 + subject |
//! | `GET`    | `/me` | The caller plus effective permissions; 401 if anonymous |
//! | `PATCH`  | `/me` | Body: [`ProfilePatch`]; email and display name only |
//! | `GET`    | `/subjects/:id` | Public profile |
//! | `DELETE` | `/subjects/:id` | Cascade delete; returns the [`CascadeReport`] |

use axum::{
  extract::State,
  http::{StatusCode, header},
  response::IntoResponse,
};
use quire_core::{
  gate::{Action, DenyReason},
  permission::PermissionSet,
  resource::Owned,
  store::{CascadeReport, ContentStore},
  subject::{Caller, NewSubject, Profile, ProfilePatch, Subject, validate_password},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{CurrentCaller, hash_password_blocking},
  error::ApiError,
  extract::{Json, Path},
};

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username:     String,
  pub email:        String,
  pub display_name: Option<String>,
  pub password:     String,
}

/// `POST /register`: the new subject joins the configured default group.
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContentStore + 'static,
{
  validate_password(&body.password)?;

  let mut input = NewSubject::new(body.username, body.email, String::new())
    .with_group(&state.default_group);
  if let Some(name) = body.display_name {
    input = input.with_display_name(name);
  }
  input.validate(state.gate.table())?;
  input.password_hash = hash_password_blocking(body.password).await?;

  let subject = state
    .store
    .add_subject(input)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    subject_id = %subject.subject_id,
    username = %subject.username,
    "registered subject",
  );

  let location = format!("/subjects/{}", subject.subject_id);
  Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(subject)))
}

// ─── Me ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Me {
  #[serde(flatten)]
  pub subject:     Subject,
  pub permissions: PermissionSet,
}

/// `GET /me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
) -> Result<Json<Me>, ApiError>
where
  S: ContentStore + 'static,
{
  let permissions = state.gate.effective_permissions(&caller);
  let Caller::Subject(subject) = caller else {
    return Err(DenyReason::NotAuthenticated.into());
  };
  Ok(Json(Me { subject, permissions }))
}

/// `PATCH /me`: any authenticated subject may edit its own profile, whatever
/// its groups.
pub async fn update_me<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Json(patch): Json<ProfilePatch>,
) -> Result<Json<Me>, ApiError>
where
  S: ContentStore + 'static,
{
  let permissions = state.gate.effective_permissions(&caller);
  let Some(id) = caller.subject_id() else {
    return Err(DenyReason::NotAuthenticated.into());
  };
  let patch = patch.normalized();
  patch.validate()?;

  let subject = state
    .store
    .update_subject(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("subject", id))?;
  Ok(Json(Me { subject, permissions }))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /subjects/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError>
where
  S: ContentStore + 'static,
{
  let subject = load(&state, id).await?;
  state.require(&caller, Action::View, Some(&subject.meta()))?;
  Ok(Json(subject.profile()))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /subjects/:id`: removes the subject and everything it owns.
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  CurrentCaller(caller): CurrentCaller,
  Path(id): Path<Uuid>,
) -> Result<Json<CascadeReport>, ApiError>
where
  S: ContentStore + 'static,
{
  let subject = load(&state, id).await?;
  state.require(&caller, Action::Delete, Some(&subject.meta()))?;

  let report = state
    .store
    .delete_subject(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("subject", id))?;
  tracing::info!(
    subject_id = %id,
    username = %subject.username,
    by = ?caller.subject_id(),
    posts = report.posts,
    comments = report.comments,
    books = report.books,
    "deleted subject and owned content",
  );
  Ok(Json(report))
}

async fn load<S: ContentStore>(state: &AppState<S>, id: Uuid) -> Result<Subject, ApiError> {
  state
    .store
    .get_subject(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("subject", id))
}
