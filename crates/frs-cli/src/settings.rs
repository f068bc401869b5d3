//! Layered settings: defaults, then the TOML file, then `FRS_ETL_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveDate;
use frs_core::pipeline::LoadMode;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EtlConfig {
  /// The operational (FRS) database.
  pub source_path:    PathBuf,
  /// The star-schema warehouse; created on first use.
  pub warehouse_path: PathBuf,
  #[serde(default)]
  pub mode:           LoadMode,
  /// Pins the run date, e.g. for reproducible reloads.
  #[serde(default)]
  pub today:          Option<NaiveDate>,
}

impl EtlConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("FRS_ETL")),
    )
    .with_context(|| format!("failed to read configuration {}", path.display()))
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    let mut cfg: Self = builder
      .set_default("source_path", "frs.db")?
      .set_default("warehouse_path", "warehouse.db")?
      .build()?
      .try_deserialize()
      .context("failed to deserialise EtlConfig")?;
    cfg.source_path = expand_tilde(&cfg.source_path);
    cfg.warehouse_path = expand_tilde(&cfg.warehouse_path);
    Ok(cfg)
  }
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
