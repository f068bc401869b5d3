//! Surrogate key allocation.
//!
//! A batch receives one contiguous block of keys starting just above the
//! table's current maximum. The maximum is read once per batch and never
//! re-queried, so the run must be the table's only writer.

use crate::{Error, Result, Table, dimension::Keyed, store::Warehouse};

/// The next free keys of a table, handed out in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBlock {
  first: i64,
}

impl KeyBlock {
  /// The block starting right after `last_max`; an empty table starts at 1.
  pub fn after(last_max: Option<i64>) -> Self {
    Self { first: last_max.unwrap_or(0) + 1 }
  }

  pub fn first(&self) -> i64 { self.first }

  /// Key `rows` in order: the i-th row gets `first + i`.
  pub fn assign<T>(self, rows: impl IntoIterator<Item = T>) -> Vec<Keyed<T>> {
    rows
      .into_iter()
      .zip(self.first..)
      .map(|(row, key)| Keyed { key, row })
      .collect()
  }
}

/// Read the current maximum key of `table` and return the block above it.
pub async fn allocate<W: Warehouse>(warehouse: &W, table: Table) -> Result<KeyBlock> {
  let last_max = warehouse
    .max_key(table)
    .await
    .map_err(Error::warehouse_failure)?;
  Ok(KeyBlock::after(last_max))
}
