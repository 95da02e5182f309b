//! Runtime configuration, deserialised from `slate.toml` and `SLATE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveTime;
use serde::Deserialize;
use slate_engine::WorkingHours;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path:                PathBuf,
  /// Start of the bookable day, `HH:MM`.
  #[serde(default = "default_day_start")]
  pub day_start:                 String,
  /// End of the bookable day, `HH:MM`.
  #[serde(default = "default_day_end")]
  pub day_end:                   String,
  #[serde(default = "default_increment")]
  pub default_increment_minutes: u32,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/slate/slate.db") }

fn default_day_start() -> String { "09:00".to_string() }

fn default_day_end() -> String { "18:00".to_string() }

fn default_increment() -> u32 { 30 }

impl Settings {
  /// Layer the optional config file under `SLATE_*` environment variables.
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SLATE"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  pub fn working_hours(&self) -> anyhow::Result<WorkingHours> {
    let start = parse_time(&self.day_start).context("invalid day_start")?;
    let end = parse_time(&self.day_end).context("invalid day_end")?;
    Ok(WorkingHours::new(start, end)?)
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M:%S")
    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
    .with_context(|| format!("expected HH:MM, got {s:?}"))
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
