//! Gate calls made at the top of every handler.

use quire_core::{
  gate::{Action, DenyReason},
  resource::ResourceMeta,
  subject::Caller,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

impl<S> AppState<S> {
  /// Ask the gate, turning a refusal into [`ApiError::Denied`].
  pub fn require(
    &self,
    caller: &Caller,
    action: Action,
    resource: Option<&ResourceMeta>,
  ) -> Result<(), ApiError> {
    self
      .gate
      .authorize(caller, action, resource)
      .into_result()
      .map_err(|reason| {
        tracing::debug!(
          caller = ?caller.subject_id(),
          %action,
          kind = ?resource.map(|r| r.kind),
          resource_id = ?resource.map(|r| r.resource_id),
          reason = reason.code(),
          "denied",
        );
        ApiError::Denied(reason)
      })
  }

  /// Authorise `create` and return the id of the subject who will own the new
  /// resource.
  pub fn require_create(&self, caller: &Caller) -> Result<Uuid, ApiError> {
    self.require(caller, Action::Create, None)?;
    caller
      .subject_id()
      .ok_or(ApiError::Denied(DenyReason::NotAuthenticated))
  }
}
