//! `quire` server binary.
//!
//! Reads `quire.toml` (or the path given with `--config`), opens the SQLite
//! store, and either serves the JSON API or runs a management command.
//!
//! # Creating the first admin
//!
//! ```text
//! echo 'a long password' | quire add-user --username root --email root@example.com --group admin
//! ```

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use quire_api::{AppState, auth::hash_password};
use quire_core::{
  gate::Gate,
  permission::PermissionTable,
  store::ContentStore,
  subject::{NewSubject, validate_password},
};
use quire_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(name = "quire", author, version, about = "Quire content server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "quire.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
  /// Create a subject. The password is read from stdin.
  AddUser {
    #[arg(long)]
    username:     String,
    #[arg(long)]
    email:        String,
    /// Repeatable. Defaults to the configured `default_group`.
    #[arg(long = "group")]
    groups:       Vec<String>,
    #[arg(long)]
    display_name: Option<String>,
  },
  /// Delete a subject together with its posts, comments, and books.
  DeleteUser {
    #[arg(long)]
    username: String,
  },
  /// List every subject with its groups.
  ListUsers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::HashPassword => {
      let password = read_password()?;
      println!("{}", hash_password(&password)?);
      Ok(())
    }
    Command::Serve => serve(Runtime::open(&cli.config).await?).await,
    Command::AddUser { username, email, groups, display_name } => {
      let rt = Runtime::open(&cli.config).await?;
      let mut input = NewSubject::new(username, email, String::new());
      if groups.is_empty() {
        input = input.with_group(&rt.cfg.default_group);
      }
      for group in &groups {
        input = input.with_group(group);
      }
      if let Some(name) = display_name {
        input = input.with_display_name(name);
      }
      add_user(&rt, input).await
    }
    Command::DeleteUser { username } => {
      delete_user(&Runtime::open(&cli.config).await?.store, &username).await
    }
    Command::ListUsers => list_users(&Runtime::open(&cli.config).await?.store).await,
  }
}

/// Everything a command needs once configuration has been read.
struct Runtime {
  cfg:   ServerConfig,
  table: PermissionTable,
  store: SqliteStore,
}

impl Runtime {
  async fn open(config_path: &Path) -> anyhow::Result<Self> {
    let cfg = ServerConfig::load(config_path)?;
    let table = cfg
      .permission_table()
      .context("invalid group configuration")?;

    let store_path = expand_tilde(&cfg.store_path);
    let store = SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?;
    Ok(Self { cfg, table, store })
  }
}

async fn serve(rt: Runtime) -> anyhow::Result<()> {
  let Runtime { cfg, table, store } = rt;
  let state = AppState::new(Arc::new(store), Gate::new(table), &cfg.default_group);
  let app = quire_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
    })
    .await
    .context("server error")?;

  Ok(())
}

async fn add_user(rt: &Runtime, mut input: NewSubject) -> anyhow::Result<()> {
  input.validate(&rt.table)?;
  let password = read_password()?;
  validate_password(&password)?;
  input.password_hash = hash_password(&password)?;

  let subject = rt
    .store
    .add_subject(input)
    .await
    .context("failed to add subject")?;
  tracing::info!(
    subject_id = %subject.subject_id,
    username = %subject.username,
    groups = ?subject.groups,
    "added subject",
  );
  println!("{}", subject.subject_id);
  Ok(())
}

async fn delete_user(store: &SqliteStore, username: &str) -> anyhow::Result<()> {
  let Some(creds) = store
    .find_credentials(username)
    .await
    .context("failed to look up subject")?
  else {
    bail!("no subject named {username:?}");
  };

  let id = creds.subject.subject_id;
  let Some(report) = store
    .delete_subject(id)
    .await
    .context("failed to delete subject")?
  else {
    bail!("subject {id} vanished before it could be deleted");
  };
  tracing::info!(
    subject_id = %id,
    %username,
    posts = report.posts,
    comments = report.comments,
    books = report.books,
    "deleted subject and owned content",
  );
  println!(
    "deleted {username}: {} posts, {} comments, {} books",
    report.posts, report.comments, report.books
  );
  Ok(())
}

async fn list_users(store: &SqliteStore) -> anyhow::Result<()> {
  let subjects = store
    .list_subjects()
    .await
    .context("failed to list subjects")?;
  for s in subjects {
    let groups: Vec<&str> = s.groups.iter().map(String::as_str).collect();
    println!("{}  {:<20}  {}", s.subject_id, s.username, groups.join(","));
  }
  Ok(())
}

/// Read a password from the first line of stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
