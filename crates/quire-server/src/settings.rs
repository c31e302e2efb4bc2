//! Server settings: an optional TOML file overlaid with `QUIRE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use quire_core::permission::{Group, PermissionTable, VIEWER};
use serde::Deserialize;

/// Runtime server configuration, deserialised from `quire.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:          String,
  #[serde(default = "default_port")]
  pub port:          u16,
  #[serde(default = "default_store_path")]
  pub store_path:    PathBuf,
  /// Group given to subjects created through `POST /register`.
  #[serde(default = "default_group")]
  pub default_group: String,
  /// Replaces the standard viewer/editor/admin table when present.
  #[serde(default)]
  pub groups:        Option<Vec<Group>>,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_store_path() -> PathBuf { PathBuf::from("quire.db") }
fn default_group() -> String { VIEWER.to_string() }

impl ServerConfig {
  /// Read `path` (if it exists) and then the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let builder = config::Config::builder()
      .add_source(config::File::from(path).required(false));
    Self::from_builder(builder)
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    builder
      .add_source(
        config::Environment::with_prefix("QUIRE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  /// The group → permission table, checked against `default_group`.
  pub fn permission_table(&self) -> quire_core::Result<PermissionTable> {
    let table = match &self.groups {
      Some(groups) => PermissionTable::from_groups(groups.iter().cloned())?,
      None => PermissionTable::standard(),
    };
    if !table.contains_group(&self.default_group) {
      return Err(quire_core::Error::UnknownGroup(self.default_group.clone()));
    }
    Ok(table)
  }
}
