//! Type 1 dimension builders.
//!
//! Each builder turns a [`SourceSnapshot`](crate::source::SourceSnapshot)
//! into cleaned, deduplicated dimension rows ([`Conformance`]).
//! [`plan_type1`] then diffs those rows against what the warehouse already
//! holds: unseen natural keys are inserted, changed ones corrected in place,
//! identical ones left alone.

mod advisors;
mod calendar;
mod courses;
mod statuses;
mod students;

use std::collections::BTreeMap;

pub use advisors::conform_advisors;
pub use calendar::{calendar_day, conform_calendar};
pub use courses::conform_courses;
pub use statuses::conform_statuses;
pub use students::conform_students;

use crate::{
  Table,
  dimension::Keyed,
  rejection::RejectionTally,
  store::{Correction, TargetBatch},
};

/// A Type 1 dimension row type.
pub trait Conformed: Clone + PartialEq + Send + 'static {
  type NaturalKey: Ord + Clone;

  const TABLE: Table;

  fn natural_key(&self) -> Self::NaturalKey;

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch;

  /// Wrap rows for an in-place overwrite. Tables whose attributes are fully
  /// derived from the natural key return `None` and never take corrections.
  fn into_correction(_rows: Vec<Keyed<Self>>) -> Option<Correction> { None }
}

/// The cleaned output of a dimension builder.
#[derive(Debug, Clone)]
pub struct Conformance<T> {
  /// One row per natural key, ordered by natural key.
  pub rows:       Vec<T>,
  pub rejected:   RejectionTally,
  /// Source rows dropped because an earlier row had the same natural key.
  pub duplicates: usize,
}

impl<T> Default for Conformance<T> {
  fn default() -> Self {
    Self {
      rows:       Vec::new(),
      rejected:   RejectionTally::new(),
      duplicates: 0,
    }
  }
}

/// Keep the first row per natural key, where "first" means the lowest source
/// id. Sorting first makes the winner independent of source row order.
pub(crate) fn first_per_key<T: Conformed>(
  mut rows: Vec<(i64, T)>,
) -> (Vec<T>, usize) {
  rows.sort_by(|(a_id, a), (b_id, b)| {
    a.natural_key()
      .cmp(&b.natural_key())
      .then(a_id.cmp(b_id))
  });
  let before = rows.len();
  let mut kept: Vec<T> = Vec::with_capacity(before);
  for (_, row) in rows {
    if kept
      .last()
      .is_some_and(|last| last.natural_key() == row.natural_key())
    {
      continue;
    }
    kept.push(row);
  }
  let duplicates = before - kept.len();
  (kept, duplicates)
}

// ─── Type 1 planning ─────────────────────────────────────────────────────────

/// What a Type 1 load has to write.
#[derive(Debug, Clone)]
pub struct Type1Plan<T> {
  /// Rows whose natural key the warehouse has never seen; not yet keyed.
  pub inserts:     Vec<T>,
  /// Rows whose attributes differ from the stored row, carrying the stored
  /// surrogate key.
  pub corrections: Vec<Keyed<T>>,
  pub unchanged:   usize,
}

/// Diff incoming rows against the stored dimension by natural key.
///
/// If the stored table holds a natural key more than once, the row with the
/// lowest surrogate key is the one compared and corrected.
pub fn plan_type1<T: Conformed>(
  existing: &[Keyed<T>],
  incoming: Vec<T>,
) -> Type1Plan<T> {
  let mut stored: BTreeMap<T::NaturalKey, &Keyed<T>> = BTreeMap::new();
  for row in existing {
    stored
      .entry(row.row.natural_key())
      .and_modify(|current| {
        if row.key < current.key {
          *current = row;
        }
      })
      .or_insert(row);
  }

  let mut plan = Type1Plan {
    inserts:     Vec::new(),
    corrections: Vec::new(),
    unchanged:   0,
  };
  for row in incoming {
    match stored.get(&row.natural_key()) {
      None => plan.inserts.push(row),
      Some(current) if current.row == row => plan.unchanged += 1,
      Some(current) => plan.corrections.push(Keyed { key: current.key, row }),
    }
  }
  plan
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dimension::Advisor;

  fn advisor(name: &str, email: &str) -> Advisor {
    Advisor { name: Some(name.into()), email: email.into() }
  }

  #[test]
  fn first_per_key_prefers_the_lowest_source_id() {
    let rows = vec![
      (9, advisor("Late", "a@its.ac.id")),
      (2, advisor("Early", "a@its.ac.id")),
      (5, advisor("Other", "b@its.ac.id")),
    ];
    let (kept, duplicates) = first_per_key(rows);
    assert_eq!(duplicates, 1);
    assert_eq!(kept, vec![
      advisor("Early", "a@its.ac.id"),
      advisor("Other", "b@its.ac.id"),
    ]);
  }

  #[test]
  fn plan_splits_inserts_corrections_and_unchanged() {
    let existing = vec![
      Keyed { key: 1, row: advisor("Same", "same@its.ac.id") },
      Keyed { key: 2, row: advisor("Old Name", "moved@its.ac.id") },
    ];
    let incoming = vec![
      advisor("Same", "same@its.ac.id"),
      advisor("New Name", "moved@its.ac.id"),
      advisor("Fresh", "fresh@its.ac.id"),
    ];
    let plan = plan_type1(&existing, incoming);
    assert_eq!(plan.unchanged, 1);
    assert_eq!(plan.inserts, vec![advisor("Fresh", "fresh@its.ac.id")]);
    assert_eq!(plan.corrections, vec![Keyed {
      key: 2,
      row: advisor("New Name", "moved@its.ac.id"),
    }]);
  }

  #[test]
  fn replanning_after_apply_is_a_no_op() {
    let existing = vec![Keyed { key: 4, row: advisor("A", "a@its.ac.id") }];
    let plan = plan_type1(&existing, vec![advisor("A", "a@its.ac.id")]);
    assert!(plan.inserts.is_empty());
    assert!(plan.corrections.is_empty());
    assert_eq!(plan.unchanged, 1);
  }
}
