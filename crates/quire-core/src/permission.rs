//! Permissions, groups, and the group → permission table.
//!
//! The table is built once at process start and shared read-only. A
//! subject's effective permission set is the union of the sets of every group
//! it belongs to; group names the table does not know contribute nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{Error, Result};

// ─── Permission ──────────────────────────────────────────────────────────────

/// A single capability a group can grant.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Permission {
  View,
  Create,
  Edit,
  Delete,
}

impl Permission {
  const fn bit(self) -> u8 { 1 << self as u8 }
}

// ─── PermissionSet ───────────────────────────────────────────────────────────

/// A set of [`Permission`]s, stored as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionSet(u8);

impl PermissionSet {
  pub const EMPTY: Self = Self(0);

  pub fn contains(self, permission: Permission) -> bool {
    self.0 & permission.bit() != 0
  }

  pub fn insert(&mut self, permission: Permission) {
    self.0 |= permission.bit();
  }

  #[must_use]
  pub fn union(self, other: Self) -> Self { Self(self.0 | other.0) }

  pub fn is_empty(self) -> bool { self.0 == 0 }

  /// Holders of `delete` act on every resource regardless of ownership.
  pub fn is_admin_tier(self) -> bool { self.contains(Permission::Delete) }

  pub fn iter(self) -> impl Iterator<Item = Permission> {
    Permission::iter().filter(move |p| self.contains(*p))
  }
}

impl FromIterator<Permission> for PermissionSet {
  fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
    let mut set = Self::EMPTY;
    for p in iter {
      set.insert(p);
    }
    set
  }
}

impl Serialize for PermissionSet {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(self.iter())
  }
}

// ─── Group ───────────────────────────────────────────────────────────────────

pub const VIEWER: &str = "viewer";
pub const EDITOR: &str = "editor";
pub const ADMIN: &str = "admin";

/// A named bundle of permissions, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub name:        String,
  pub permissions: Vec<Permission>,
}

/// Group names are matched case-insensitively and stored lowercase.
pub fn normalize_group_name(name: &str) -> String { name.trim().to_lowercase() }

// ─── PermissionTable ─────────────────────────────────────────────────────────

/// Immutable mapping from group name to the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
  groups: BTreeMap<String, PermissionSet>,
}

impl PermissionTable {
  /// The stock table: `viewer {view}`, `editor {view, create, edit}`,
  /// `admin {view, create, edit, delete}`.
  pub fn standard() -> Self {
    use Permission::*;
    let groups = [
      (VIEWER, vec![View]),
      (EDITOR, vec![View, Create, Edit]),
      (ADMIN, vec![View, Create, Edit, Delete]),
    ]
    .into_iter()
    .map(|(name, perms)| (name.to_owned(), perms.into_iter().collect()))
    .collect();
    Self { groups }
  }

  /// Build a table from configured groups. Names are normalised; empty or
  /// repeated names are rejected.
  pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Result<Self> {
    let mut table = BTreeMap::new();
    for group in groups {
      let name = normalize_group_name(&group.name);
      if name.is_empty() {
        return Err(Error::validation("group name must not be empty"));
      }
      let perms = group.permissions.into_iter().collect();
      if table.insert(name.clone(), perms).is_some() {
        return Err(Error::DuplicateGroup(name));
      }
    }
    Ok(Self { groups: table })
  }

  pub fn get(&self, group: &str) -> Option<PermissionSet> {
    self.groups.get(&normalize_group_name(group)).copied()
  }

  pub fn contains_group(&self, group: &str) -> bool {
    self.get(group).is_some()
  }

  pub fn group_names(&self) -> impl Iterator<Item = &str> {
    self.groups.keys().map(String::as_str)
  }

  /// Union of the permissions granted by every group in `groups`.
  pub fn effective<'a>(
    &self,
    groups: impl IntoIterator<Item = &'a str>,
  ) -> PermissionSet {
    groups
      .into_iter()
      .filter_map(|g| self.get(g))
      .fold(PermissionSet::EMPTY, PermissionSet::union)
  }
}

impl Default for PermissionTable {
  fn default() -> Self { Self::standard() }
}
