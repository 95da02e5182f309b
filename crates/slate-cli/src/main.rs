//! `slate`: operator binary for the Slate scheduling engine.
//!
//! Reads `slate.toml` (or the path given with `--config`), opens the SQLite
//! store, runs one engine operation, and prints its result as JSON.
//! Notifications produced by the operation are written to the log.
//!
//! # Usage
//!
//! ```
//! slate school create --name "Surf Club" --currency EUR
//! slate pack book --school <ID> --kind private --student <ID> --classes 4 \
//!   --duration 60 --price 200 --instructor <ID>
//! slate lesson schedule --lesson <ID> --date 2025-07-01 --start 10:00
//! slate slots --instructor <ID> --date 2025-07-01 --duration 60
//! ```

mod commands;
mod settings;
mod sink;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use settings::Settings;
use sink::LogSink;
use slate_engine::Scheduler;
use slate_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

pub type App = Scheduler<SqliteStore, LogSink>;

#[derive(Parser)]
#[command(name = "slate", version, about = "Scheduling for sports schools")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "slate.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays machine-readable.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(cli.config)?;
  let hours = settings.working_hours()?;

  let store_path = settings.store_path();
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let app = Scheduler::new(store, LogSink).with_working_hours(hours);

  commands::run(&app, &settings, cli.command).await
}
