//! The authorization gate.
//!
//! Every handler asks the gate before it reads or mutates a resource. The
//! decision depends only on the caller's effective permissions and the
//! resource's owner and published flag, so [`Gate::authorize`] is a pure
//! function over immutable inputs.
//!
//! | Action   | Anonymous          | Authenticated                                         |
//! |----------|--------------------|-------------------------------------------------------|
//! | `view`   | published only     | published, or owned, or admin-tier                    |
//! | `create` | `NotAuthenticated` | needs `create`                                        |
//! | `edit`   | `NotAuthenticated` | needs `edit`, then owner or admin-tier                |
//! | `delete` | `NotAuthenticated` | needs `delete`, then owner or admin-tier              |
//!
//! "Admin-tier" means the effective permission set contains `delete`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  permission::{Permission, PermissionSet, PermissionTable},
  resource::ResourceMeta,
  subject::Caller,
};

// ─── Action ──────────────────────────────────────────────────────────────────

/// The operation a caller wants to perform.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
  View,
  Create,
  Edit,
  Delete,
}

impl Action {
  /// The permission a caller must hold to attempt this action.
  pub fn required_permission(self) -> Permission {
    match self {
      Self::View => Permission::View,
      Self::Create => Permission::Create,
      Self::Edit => Permission::Edit,
      Self::Delete => Permission::Delete,
    }
  }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
  #[error("authentication required")]
  NotAuthenticated,
  #[error("insufficient permission")]
  InsufficientPermission,
  #[error("not the owner of this resource")]
  NotOwner,
}

impl DenyReason {
  /// Stable machine-readable code, matching the serde representation.
  pub fn code(self) -> &'static str {
    match self {
      Self::NotAuthenticated => "not_authenticated",
      Self::InsufficientPermission => "insufficient_permission",
      Self::NotOwner => "not_owner",
    }
  }
}

/// The outcome of [`Gate::authorize`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Allow,
  Deny(DenyReason),
}

impl Decision {
  pub fn is_allowed(self) -> bool { matches!(self, Self::Allow) }

  pub fn into_result(self) -> Result<(), DenyReason> {
    match self {
      Self::Allow => Ok(()),
      Self::Deny(reason) => Err(reason),
    }
  }
}

/// Which posts a caller may see in a listing; the collection-level
/// counterpart of `authorize(view)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
  #[default]
  Published,
  PublishedOrOwnedBy(Uuid),
  All,
}

impl Visibility {
  /// Whether a resource with this owner and published flag is included.
  pub fn admits(self, meta: &ResourceMeta) -> bool {
    match self {
      Self::Published => meta.published,
      Self::PublishedOrOwnedBy(id) => meta.published || meta.owner_id == id,
      Self::All => true,
    }
  }
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Authorization policy over a fixed [`PermissionTable`].
#[derive(Debug, Clone, Default)]
pub struct Gate {
  table: PermissionTable,
}

impl Gate {
  pub fn new(table: PermissionTable) -> Self { Self { table } }

  pub fn table(&self) -> &PermissionTable { &self.table }

  /// The union of the permissions of every group the caller belongs to.
  /// Anonymous callers hold nothing.
  pub fn effective_permissions(&self, caller: &Caller) -> PermissionSet {
    match caller {
      Caller::Anonymous => PermissionSet::EMPTY,
      Caller::Subject(s) => self.table.effective(s.groups.iter().map(String::as_str)),
    }
  }

  /// Decide whether `caller` may perform `action` on `resource`.
  ///
  /// `resource` is `None` for `create` and for collection-level `view`. An
  /// `edit` or `delete` without a resource is treated as acting on something
  /// the caller does not own.
  pub fn authorize(
    &self,
    caller: &Caller,
    action: Action,
    resource: Option<&ResourceMeta>,
  ) -> Decision {
    if action == Action::View {
      return self.authorize_view(caller, resource);
    }

    let Caller::Subject(subject) = caller else {
      return Decision::Deny(DenyReason::NotAuthenticated);
    };
    let perms = self.effective_permissions(caller);
    if !perms.contains(action.required_permission()) {
      return Decision::Deny(DenyReason::InsufficientPermission);
    }
    if action == Action::Create {
      return Decision::Allow;
    }

    let owns = resource.is_some_and(|r| r.owner_id == subject.subject_id);
    if owns || perms.is_admin_tier() {
      Decision::Allow
    } else {
      Decision::Deny(DenyReason::NotOwner)
    }
  }

  fn authorize_view(
    &self,
    caller: &Caller,
    resource: Option<&ResourceMeta>,
  ) -> Decision {
    let Some(resource) = resource else {
      return Decision::Allow;
    };
    if resource.published {
      return Decision::Allow;
    }
    match caller {
      Caller::Anonymous => Decision::Deny(DenyReason::NotAuthenticated),
      Caller::Subject(s)
        if s.subject_id == resource.owner_id
          || self.effective_permissions(caller).is_admin_tier() =>
      {
        Decision::Allow
      }
      Caller::Subject(_) => Decision::Deny(DenyReason::NotOwner),
    }
  }

  pub fn post_visibility(&self, caller: &Caller) -> Visibility {
    match caller {
      Caller::Anonymous => Visibility::Published,
      Caller::Subject(_) if self.effective_permissions(caller).is_admin_tier() => {
        Visibility::All
      }
      Caller::Subject(s) => Visibility::PublishedOrOwnedBy(s.subject_id),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use chrono::Utc;

  use super::*;
  use crate::{
    permission::{ADMIN, EDITOR, VIEWER},
    resource::ResourceKind,
    subject::Subject,
  };

  fn gate() -> Gate { Gate::default() }

  fn caller(username: &str, groups: &[&str]) -> Caller {
    Caller::Subject(Subject {
      subject_id:   Uuid::new_v4(),
      username:     username.to_owned(),
      email:        format!("{username}@example.com"),
      display_name: username.to_owned(),
      groups:       groups.iter().map(|g| (*g).to_owned()).collect::<BTreeSet<_>>(),
      created_at:   Utc::now(),
    })
  }

  fn post_owned_by(owner: &Caller) -> ResourceMeta {
    ResourceMeta {
      kind:        ResourceKind::Post,
      resource_id: Uuid::new_v4(),
      owner_id:    owner.subject_id().unwrap(),
      published:   true,
    }
  }

  fn all_callers() -> Vec<Caller> {
    vec![
      Caller::Anonymous,
      caller("nobody", &[]),
      caller("viewer", &[VIEWER]),
      caller("editor", &[EDITOR]),
      caller("admin", &[ADMIN]),
    ]
  }

  // ── Properties ──────────────────────────────────────────────────────────────

  #[test]
  fn published_resources_are_viewable_by_everyone() {
    let owner = caller("owner", &[EDITOR]);
    let post = post_owned_by(&owner);
    for c in all_callers() {
      assert_eq!(gate().authorize(&c, Action::View, Some(&post)), Decision::Allow);
    }
  }

  #[test]
  fn anonymous_mutations_need_authentication() {
    let owner = caller("owner", &[EDITOR]);
    let post = post_owned_by(&owner);
    for action in [Action::Create, Action::Edit, Action::Delete] {
      assert_eq!(
        gate().authorize(&Caller::Anonymous, action, Some(&post)),
        Decision::Deny(DenyReason::NotAuthenticated),
        "{action}"
      );
    }
    assert_eq!(
      gate().authorize(&Caller::Anonymous, Action::Create, None),
      Decision::Deny(DenyReason::NotAuthenticated)
    );
  }

  #[test]
  fn viewers_cannot_create() {
    let viewer = caller("viewer", &[VIEWER]);
    assert_eq!(
      gate().authorize(&viewer, Action::Create, None),
      Decision::Deny(DenyReason::InsufficientPermission)
    );
  }

  #[test]
  fn subjects_without_groups_cannot_create() {
    let nobody = caller("nobody", &[]);
    assert_eq!(
      gate().authorize(&nobody, Action::Create, None),
      Decision::Deny(DenyReason::InsufficientPermission)
    );
  }

  #[test]
  fn editor_owner_may_edit_but_not_delete() {
    let editor = caller("editor", &[EDITOR]);
    let post = post_owned_by(&editor);
    assert_eq!(gate().authorize(&editor, Action::Edit, Some(&post)), Decision::Allow);
    assert_eq!(
      gate().authorize(&editor, Action::Delete, Some(&post)),
      Decision::Deny(DenyReason::InsufficientPermission)
    );
  }

  #[test]
  fn editor_who_is_also_admin_may_delete_own() {
    let both = caller("both", &[EDITOR, ADMIN]);
    let post = post_owned_by(&both);
    assert_eq!(gate().authorize(&both, Action::Delete, Some(&post)), Decision::Allow);
  }

  #[test]
  fn editor_may_not_edit_others() {
    let owner = caller("owner", &[EDITOR]);
    let other = caller("other", &[EDITOR]);
    let post = post_owned_by(&owner);
    assert_eq!(
      gate().authorize(&other, Action::Edit, Some(&post)),
      Decision::Deny(DenyReason::NotOwner)
    );
  }

  #[test]
  fn admins_act_on_all_resources() {
    let admin = caller("admin", &[ADMIN]);
    let owner = caller("owner", &[EDITOR]);
    for kind in [ResourceKind::Post, ResourceKind::Comment, ResourceKind::Book] {
      let mut meta = post_owned_by(&owner);
      meta.kind = kind;
      assert_eq!(gate().authorize(&admin, Action::Delete, Some(&meta)), Decision::Allow);
      assert_eq!(gate().authorize(&admin, Action::Edit, Some(&meta)), Decision::Allow);
    }
  }

  #[test]
  fn edit_without_resource_is_not_owned() {
    let editor = caller("editor", &[EDITOR]);
    assert_eq!(
      gate().authorize(&editor, Action::Edit, None),
      Decision::Deny(DenyReason::NotOwner)
    );
    let admin = caller("admin", &[ADMIN]);
    assert_eq!(gate().authorize(&admin, Action::Delete, None), Decision::Allow);
  }

  #[test]
  fn unpublished_resources_are_hidden_from_non_owners() {
    let owner = caller("owner", &[EDITOR]);
    let mut post = post_owned_by(&owner);
    post.published = false;

    assert_eq!(gate().authorize(&owner, Action::View, Some(&post)), Decision::Allow);
    assert_eq!(
      gate().authorize(&caller("admin", &[ADMIN]), Action::View, Some(&post)),
      Decision::Allow
    );
    assert_eq!(
      gate().authorize(&Caller::Anonymous, Action::View, Some(&post)),
      Decision::Deny(DenyReason::NotAuthenticated)
    );
    assert_eq!(
      gate().authorize(&caller("other", &[EDITOR]), Action::View, Some(&post)),
      Decision::Deny(DenyReason::NotOwner)
    );
  }

  #[test]
  fn visibility_agrees_with_view_decisions() {
    let owner = caller("owner", &[EDITOR]);
    let mut posts = vec![post_owned_by(&owner), post_owned_by(&owner)];
    posts[1].published = false;

    let mut callers = all_callers();
    callers.push(owner);
    for c in &callers {
      let visibility = gate().post_visibility(c);
      for post in &posts {
        assert_eq!(
          visibility.admits(post),
          gate().authorize(c, Action::View, Some(post)).is_allowed(),
        );
      }
    }
  }

  #[test]
  fn custom_table_drives_decisions() {
    use crate::permission::Group;
    let table = PermissionTable::from_groups([Group {
      name:        "moderator".into(),
      permissions: vec![Permission::View, Permission::Delete],
    }])
    .unwrap();
    let gate = Gate::new(table);
    let moderator = caller("mod", &["moderator"]);
    let owner = caller("owner", &[]);
    let post = post_owned_by(&owner);

    assert_eq!(gate.authorize(&moderator, Action::Delete, Some(&post)), Decision::Allow);
    assert_eq!(
      gate.authorize(&moderator, Action::Edit, Some(&post)),
      Decision::Deny(DenyReason::InsufficientPermission)
    );
  }

  // ── Scenario ────────────────────────────────────────────────────────────────

  #[test]
  fn blog_scenario() {
    let gate = gate();
    let alice = caller("alice", &[EDITOR]);
    let bob = caller("bob", &[EDITOR]);
    let carol = caller("carol", &[VIEWER]);
    let post_1 = post_owned_by(&alice);

    assert!(gate.authorize(&alice, Action::Edit, Some(&post_1)).is_allowed());
    assert_eq!(
      gate.authorize(&bob, Action::Edit, Some(&post_1)).into_result(),
      Err(DenyReason::NotOwner)
    );
    assert!(gate.authorize(&Caller::Anonymous, Action::View, Some(&post_1)).is_allowed());
    assert_eq!(
      gate.authorize(&carol, Action::Create, None).into_result(),
      Err(DenyReason::InsufficientPermission)
    );
  }

  #[test]
  fn deny_reason_codes_match_serde() {
    for reason in [
      DenyReason::NotAuthenticated,
      DenyReason::InsufficientPermission,
      DenyReason::NotOwner,
    ] {
      let json = serde_json::to_value(reason).unwrap();
      assert_eq!(json, reason.code());
    }
  }
}
