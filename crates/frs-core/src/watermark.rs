//! Watermark tracking.
//!
//! A fact table's watermark is the latest calendar date referenced by its
//! watermark column. It is derived from the loaded rows at the start of every
//! run and never stored anywhere else, so the fact table alone decides what
//! has been loaded.
//!
//! The watermark is the maximum *date*, not the date of the maximum key:
//! `dim_waktu` keys are allocated in arrival order, so a late-arriving old
//! date can carry a higher key than a newer one.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{
  Error, FactTable, Result,
  dimension::{CalendarDay, Keyed},
  store::Warehouse,
};

/// The latest date among `keys`, and how many of the keys have no calendar
/// row.
pub fn latest_date(
  keys: &[i64],
  calendar: &[Keyed<CalendarDay>],
) -> (Option<NaiveDate>, usize) {
  let dates: HashMap<i64, NaiveDate> =
    calendar.iter().map(|day| (day.key, day.row.date)).collect();
  let mut dangling = 0;
  let mut latest = None;
  for key in keys {
    match dates.get(key) {
      Some(date) => latest = latest.max(Some(*date)),
      None => dangling += 1,
    }
  }
  (latest, dangling)
}

/// Whether an event on `date` is at or past the watermark. Everything is
/// admitted when there is no watermark.
///
/// The bound is inclusive: events later on the watermark day itself must
/// still be considered. Rows that were already loaded are removed by the
/// incremental filter.
pub fn admits(watermark: Option<NaiveDate>, date: NaiveDate) -> bool {
  watermark.is_none_or(|mark| date >= mark)
}

/// The watermark of `fact`, or `None` when the table is empty.
pub async fn watermark<W: Warehouse>(
  warehouse: &W,
  fact: FactTable,
) -> Result<Option<NaiveDate>> {
  let keys = warehouse
    .watermark_keys(fact)
    .await
    .map_err(Error::warehouse_failure)?;
  if keys.is_empty() {
    return Ok(None);
  }
  let calendar = warehouse.calendar().await.map_err(Error::warehouse_failure)?;
  let (latest, dangling) = latest_date(&keys, &calendar);
  if dangling > 0 {
    tracing::warn!(
      table = %fact,
      column = fact.watermark_column(),
      dangling,
      "fact rows reference calendar keys that do not exist"
    );
  }
  Ok(latest)
}
