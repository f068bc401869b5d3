//! Error types for `frs-core`.
//!
//! Only batch-level failures live here. Row-level problems (a join that does
//! not resolve, a date that does not parse) are never errors: they are
//! tallied as [`crate::rejection::Rejection`]s and the row is left out.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::table::Table;

/// A boxed backend error, as produced by a store implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  /// An append would collide with rows already in the target, or its key
  /// block was allocated against a stale maximum. Nothing was written.
  #[error("{0}")]
  IntegrityConflict(ConflictReport),

  /// An SCD2 expire step found no `Current` row for the key it was told to
  /// expire. The whole changeset was rolled back.
  #[error("{table} row {key} is no longer current; version changeset rolled back")]
  StaleVersion { table: Table, key: i64 },

  #[error("unknown table: {0:?}")]
  UnknownTable(String),

  #[error("{0} is not a fact table")]
  NotAFactTable(Table),

  #[error("source read failed: {0}")]
  Source(#[source] BoxError),

  #[error("warehouse operation failed: {0}")]
  Warehouse(#[source] BoxError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn source_failure<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Source(Box::new(err))
  }

  pub fn warehouse_failure<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Warehouse(Box::new(err))
  }

  /// Find the integrity conflict report behind this error, however deeply a
  /// backend wrapped it.
  pub fn conflict_report(&self) -> Option<&ConflictReport> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
    while let Some(err) = current {
      if let Some(Error::IntegrityConflict(report)) = err.downcast_ref::<Error>()
      {
        return Some(report);
      }
      current = err.source();
    }
    None
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Conflict report ─────────────────────────────────────────────────────────

/// Diagnosis of a rejected append: which keys collided and what the old and
/// new rows looked like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictReport {
  pub table:       Table,
  /// The table's maximum key at the time of the append.
  pub current_max: Option<i64>,
  /// The lowest key of the rejected batch.
  pub first_key:   i64,
  pub conflicts:   Vec<KeyConflict>,
}

/// One colliding row, rendered column by column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyConflict {
  pub key:      i64,
  pub existing: serde_json::Value,
  pub incoming: serde_json::Value,
}

impl fmt::Display for ConflictReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "integrity conflict on {}: batch starts at key {} but the table max is {}",
      self.table,
      self.first_key,
      self
        .current_max
        .map_or_else(|| "none".to_string(), |max| max.to_string()),
    )?;
    if self.conflicts.is_empty() {
      return write!(f, " (stale key allocation, no row collides)");
    }
    write!(f, "; {} colliding row(s)", self.conflicts.len())?;
    for conflict in &self.conflicts {
      write!(
        f,
        "\n  key {}: existing {} / incoming {}",
        conflict.key, conflict.existing, conflict.incoming
      )?;
    }
    Ok(())
  }
}
