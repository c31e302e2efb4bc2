//! Subjects: the accounts that own content and issue requests.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  permission::{PermissionTable, normalize_group_name},
};

pub const USERNAME_MAX_LEN: usize = 150;
pub const DISPLAY_NAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

/// A registered account. The password hash is never part of this type; see
/// [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:   Uuid,
  pub username:     String,
  /// Stored lowercase; unique across subjects.
  pub email:        String,
  pub display_name: String,
  /// Lowercase group names.
  pub groups:       BTreeSet<String>,
  pub created_at:   DateTime<Utc>,
}

impl Subject {
  pub fn in_group(&self, group: &str) -> bool {
    self.groups.contains(&normalize_group_name(group))
  }

  pub fn profile(&self) -> Profile {
    Profile {
      subject_id:   self.subject_id,
      username:     self.username.clone(),
      display_name: self.display_name.clone(),
      created_at:   self.created_at,
    }
  }
}

/// The publicly visible part of a [`Subject`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub subject_id:   Uuid,
  pub username:     String,
  pub display_name: String,
  pub created_at:   DateTime<Utc>,
}

/// A subject together with its stored password hash, as returned by the
/// credential lookup.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub subject:       Subject,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

// ─── NewSubject ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContentStore::add_subject`].
/// `subject_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewSubject {
  pub username:      String,
  pub email:         String,
  /// Falls back to the username when absent.
  pub display_name:  Option<String>,
  pub password_hash: String,
  pub groups:        BTreeSet<String>,
}

impl NewSubject {
  /// Trims the username, lowercases the email, and starts with no groups.
  pub fn new(
    username: impl Into<String>,
    email: impl Into<String>,
    password_hash: impl Into<String>,
  ) -> Self {
    Self {
      username:      username.into().trim().to_owned(),
      email:         email.into().trim().to_lowercase(),
      display_name:  None,
      password_hash: password_hash.into(),
      groups:        BTreeSet::new(),
    }
  }

  #[must_use]
  pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
    let name = name.into().trim().to_owned();
    self.display_name = (!name.is_empty()).then_some(name);
    self
  }

  #[must_use]
  pub fn with_group(mut self, group: &str) -> Self {
    self.groups.insert(normalize_group_name(group));
    self
  }

  pub fn display_name(&self) -> &str {
    self.display_name.as_deref().unwrap_or(&self.username)
  }

  /// Check field formats and that every group exists in `table`.
  pub fn validate(&self, table: &PermissionTable) -> Result<()> {
    validate_username(&self.username)?;
    validate_email(&self.email)?;
    if self.display_name().chars().count() > DISPLAY_NAME_MAX_LEN {
      return Err(Error::validation(format!(
        "display name must be at most {DISPLAY_NAME_MAX_LEN} characters"
      )));
    }
    if let Some(unknown) = self.groups.iter().find(|g| !table.contains_group(g)) {
      return Err(Error::UnknownGroup(unknown.clone()));
    }
    Ok(())
  }
}

// ─── ProfilePatch ────────────────────────────────────────────────────────────

/// Changes a subject may make to its own record. Username, groups, and
/// password are not editable this way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
  pub email:        Option<String>,
  pub display_name: Option<String>,
}

impl ProfilePatch {
  /// Trim both fields and lowercase the email.
  #[must_use]
  pub fn normalized(self) -> Self {
    Self {
      email:        self.email.map(|e| e.trim().to_lowercase()),
      display_name: self.display_name.map(|n| n.trim().to_owned()),
    }
  }

  pub fn validate(&self) -> Result<()> {
    if let Some(email) = &self.email {
      validate_email(email)?;
    }
    if let Some(name) = &self.display_name {
      if name.is_empty() {
        return Err(Error::validation("display name must not be empty"));
      }
      if name.chars().count() > DISPLAY_NAME_MAX_LEN {
        return Err(Error::validation(format!(
          "display name must be at most {DISPLAY_NAME_MAX_LEN} characters"
        )));
      }
    }
    Ok(())
  }
}

/// Letters, digits, and `@ . + - _`; at most 150 characters.
pub fn validate_username(username: &str) -> Result<()> {
  if username.is_empty() {
    return Err(Error::validation("username must not be empty"));
  }
  if username.chars().count() > USERNAME_MAX_LEN {
    return Err(Error::validation(format!(
      "username must be at most {USERNAME_MAX_LEN} characters"
    )));
  }
  if !username
    .chars()
    .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
  {
    return Err(Error::validation(
      "username may only contain letters, digits and @/./+/-/_",
    ));
  }
  Ok(())
}

fn validate_email(email: &str) -> Result<()> {
  let valid = email
    .split_once('@')
    .is_some_and(|(local, domain)| {
      !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
    });
  if valid && !email.chars().any(char::is_whitespace) {
    Ok(())
  } else {
    Err(Error::validation(format!("invalid email address: {email:?}")))
  }
}

/// At least eight characters and not entirely numeric.
pub fn validate_password(password: &str) -> Result<()> {
  if password.chars().count() < PASSWORD_MIN_LEN {
    return Err(Error::validation(format!(
      "password must be at least {PASSWORD_MIN_LEN} characters"
    )));
  }
  if password.chars().all(|c| c.is_ascii_digit()) {
    return Err(Error::validation("password must not be entirely numeric"));
  }
  Ok(())
}

// ─── Caller ──────────────────────────────────────────────────────────────────

/// Who is issuing a request: nobody in particular, or an authenticated
/// subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Caller {
  #[default]
  Anonymous,
  Subject(Subject),
}

impl Caller {
  pub fn subject(&self) -> Option<&Subject> {
    match self {
      Self::Anonymous => None,
      Self::Subject(s) => Some(s),
    }
  }

  pub fn subject_id(&self) -> Option<Uuid> {
    self.subject().map(|s| s.subject_id)
  }

  pub fn is_anonymous(&self) -> bool { matches!(self, Self::Anonymous) }
}

impl From<Subject> for Caller {
  fn from(s: Subject) -> Self { Self::Subject(s) }
}
