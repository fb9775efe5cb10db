//! Daily sweep binary.
//!
//! Intended to be invoked by cron (or an equivalent scheduler). Reads
//! `config.toml` (or `--config <path>`), opens the SQLite store, processes
//! every due reminder, and exits. `--today` overrides the sweep date for
//! catch-up runs and testing.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use tiltyard_core::{crypto::Encryptor, notify::Notifier, renewal::parse_date};
use tiltyard_service::{Roster, RosterConfig};
use tiltyard_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tiltyard reminder sweep")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Sweep as of this date (`YYYY-MM-DD`) instead of today.
  #[arg(long)]
  today: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SweepConfig {
  store_path:   PathBuf,
  base_url:     String,
  card_id_salt: String,
}

/// Delivery is an external collaborator; this boundary implementation just
/// logs what would be handed to it.
struct LogNotifier;

impl Notifier for LogNotifier {
  fn send(&self, recipient: &str, subject: &str, _body: &str) -> bool {
    tracing::info!(recipient, subject, "outbound message");
    true
  }
}

/// Pass-through encryptor. Real at-rest encryption is supplied by the
/// deployment, not this binary.
struct PlaintextEncryptor;

impl Encryptor for PlaintextEncryptor {
  fn encrypt_json(
    &self,
    value: &serde_json::Value,
  ) -> tiltyard_core::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
  }

  fn decrypt_json(
    &self,
    blob: &[u8],
  ) -> tiltyard_core::Result<serde_json::Value> {
    Ok(serde_json::from_slice(blob)?)
  }
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TILTYARD"))
    .build()
    .context("failed to read config file")?;
  let sweep_cfg: SweepConfig = settings
    .try_deserialize()
    .context("failed to deserialise SweepConfig")?;

  let today = match &cli.today {
    Some(s) => parse_date("today", s).context("invalid --today")?,
    None => chrono::Utc::now().date_naive(),
  };

  let store_path = expand_tilde(&sweep_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let roster = Roster::new(store, LogNotifier, PlaintextEncryptor, RosterConfig {
    base_url:     sweep_cfg.base_url,
    card_id_salt: sweep_cfg.card_id_salt,
  });

  let report = roster.run_sweep(today).await.context("sweep failed")?;
  tracing::info!(sent = report.sent, failed = report.failed, "done");

  Ok(())
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
