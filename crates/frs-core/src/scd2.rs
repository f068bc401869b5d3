//! SCD Type 2 version management.
//!
//! [`plan_versions`] compares an incoming batch against the current versions
//! of a dimension and decides, per natural key, whether to do nothing, insert
//! a first version, or expire the current version and insert its successor.
//! The resulting [`VersionChangeset`] is applied by the warehouse as a single
//! unit so a key never ends up with zero or two current rows.
//!
//! [`verify_timeline`] checks the stored history of a dimension:
//!
//! - every natural key has exactly one `Current` row, and it is open-ended;
//! - every `Expired` row has a real expiration date;
//! - versions of one key never overlap.

use std::{
  collections::BTreeMap,
  fmt::{self, Debug},
};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  Table,
  dimension::{CourseOffering, CurrentFlag, Keyed, Version, open_ended},
  keys::KeyBlock,
  store::VersionChangeset,
};

/// A Type 2 dimension row: identified by a natural key, versioned on a subset
/// of its attributes.
pub trait Versioned: Clone + PartialEq + Send + 'static {
  type NaturalKey: Ord + Clone + Debug + Serialize;
  type Tracked: PartialEq + Debug;

  const TABLE: Table;

  fn natural_key(&self) -> Self::NaturalKey;

  /// The attributes whose change produces a new version. Changes to anything
  /// else are ignored.
  fn tracked(&self) -> Self::Tracked;
}

impl Versioned for CourseOffering {
  type NaturalKey = (String, String);
  type Tracked = (Option<String>, Option<i64>);

  const TABLE: Table = Table::CourseOfferings;

  fn natural_key(&self) -> Self::NaturalKey {
    (self.code.clone(), self.section.clone())
  }

  fn tracked(&self) -> Self::Tracked { (self.instructor.clone(), self.capacity) }
}

// ─── Planning ────────────────────────────────────────────────────────────────

/// The writes needed to bring a Type 2 dimension up to date with a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionPlan<T> {
  /// Surrogate keys of current rows to expire.
  pub expire:      Vec<i64>,
  /// New current versions, ordered by natural key; not yet keyed.
  pub insert:      Vec<T>,
  /// Natural keys whose current version already matches the batch.
  pub unchanged:   usize,
  /// Batch rows dropped because another row carried the same natural key and
  /// the same tracked attributes.
  pub duplicates:  usize,
  /// Natural keys that appeared in the batch with more than one distinct set
  /// of tracked attributes. The last row for such a key wins.
  pub conflicting: usize,
}

impl<T> VersionPlan<T> {
  pub fn is_empty(&self) -> bool {
    self.expire.is_empty() && self.insert.is_empty()
  }

  /// Key the inserts and stamp every change with `today`.
  pub fn into_changeset(
    self,
    block: KeyBlock,
    today: NaiveDate,
  ) -> VersionChangeset<T> {
    VersionChangeset {
      expire:    self.expire,
      expire_on: today,
      insert:    block.assign(
        self
          .insert
          .into_iter()
          .map(|row| Version::current(row, today)),
      ),
    }
  }
}

/// Plan the SCD2 step for `incoming` against the stored `versions`. Only rows
/// flagged `Current` take part; expired history is never touched.
pub fn plan_versions<T: Versioned>(
  versions: &[Keyed<Version<T>>],
  incoming: Vec<T>,
) -> VersionPlan<T> {
  let mut current: BTreeMap<T::NaturalKey, Vec<&Keyed<Version<T>>>> =
    BTreeMap::new();
  for version in versions.iter().filter(|v| v.row.is_current()) {
    current
      .entry(version.row.row.natural_key())
      .or_default()
      .push(version);
  }

  let mut batch: BTreeMap<T::NaturalKey, Vec<T>> = BTreeMap::new();
  for row in incoming {
    batch.entry(row.natural_key()).or_default().push(row);
  }

  let mut plan = VersionPlan {
    expire:      Vec::new(),
    insert:      Vec::new(),
    unchanged:   0,
    duplicates:  0,
    conflicting: 0,
  };

  for (key, mut rows) in batch {
    let mut distinct: Vec<T::Tracked> = Vec::new();
    for row in &rows {
      let tracked = row.tracked();
      if !distinct.contains(&tracked) {
        distinct.push(tracked);
      }
    }
    plan.duplicates += rows.len() - distinct.len();
    if distinct.len() > 1 {
      plan.conflicting += 1;
      tracing::warn!(
        table = %T::TABLE,
        natural_key = ?key,
        variants = distinct.len(),
        "batch carries conflicting versions of one key; keeping the last"
      );
    }
    let Some(incoming) = rows.pop() else { continue };

    match current.get(&key).map(Vec::as_slice) {
      None | Some([]) => plan.insert.push(incoming),
      Some([only]) if only.row.row.tracked() == incoming.tracked() => {
        plan.unchanged += 1;
      }
      Some(stale) => {
        plan.expire.extend(stale.iter().map(|v| v.key));
        plan.insert.push(incoming);
      }
    }
  }

  plan
}

// ─── Timeline verification ───────────────────────────────────────────────────

/// A breach of the SCD2 history invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum TimelineViolation<K> {
  NoCurrentVersion { natural_key: K },
  MultipleCurrentVersions { natural_key: K, keys: Vec<i64> },
  CurrentNotOpenEnded { natural_key: K, key: i64 },
  ExpiredOpenEnded { natural_key: K, key: i64 },
  Overlap { natural_key: K, earlier: i64, later: i64 },
}

impl<K: Debug> fmt::Display for TimelineViolation<K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NoCurrentVersion { natural_key } => {
        write!(f, "{natural_key:?}: no current version")
      }
      Self::MultipleCurrentVersions { natural_key, keys } => {
        write!(f, "{natural_key:?}: several current versions {keys:?}")
      }
      Self::CurrentNotOpenEnded { natural_key, key } => {
        write!(f, "{natural_key:?}: current row {key} has an expiration date")
      }
      Self::ExpiredOpenEnded { natural_key, key } => {
        write!(f, "{natural_key:?}: expired row {key} is open-ended")
      }
      Self::Overlap { natural_key, earlier, later } => write!(
        f,
        "{natural_key:?}: row {earlier} is still valid when row {later} takes \
         effect"
      ),
    }
  }
}

/// Check the full history of a Type 2 dimension and return every violation.
pub fn verify_timeline<T: Versioned>(
  versions: &[Keyed<Version<T>>],
) -> Vec<TimelineViolation<T::NaturalKey>> {
  let mut by_key: BTreeMap<T::NaturalKey, Vec<&Keyed<Version<T>>>> =
    BTreeMap::new();
  for version in versions {
    by_key
      .entry(version.row.row.natural_key())
      .or_default()
      .push(version);
  }

  let mut violations = Vec::new();
  for (natural_key, mut history) in by_key {
    history.sort_by_key(|v| (v.row.effective_date, v.key));

    let current: Vec<i64> = history
      .iter()
      .filter(|v| v.row.flag == CurrentFlag::Current)
      .map(|v| v.key)
      .collect();
    match current.len() {
      0 => violations.push(TimelineViolation::NoCurrentVersion {
        natural_key: natural_key.clone(),
      }),
      1 => {}
      _ => violations.push(TimelineViolation::MultipleCurrentVersions {
        natural_key: natural_key.clone(),
        keys:        current,
      }),
    }

    for version in &history {
      let open = version.row.expiration_date == open_ended();
      match version.row.flag {
        CurrentFlag::Current if !open => {
          violations.push(TimelineViolation::CurrentNotOpenEnded {
            natural_key: natural_key.clone(),
            key:         version.key,
          });
        }
        CurrentFlag::Expired if open => {
          violations.push(TimelineViolation::ExpiredOpenEnded {
            natural_key: natural_key.clone(),
            key:         version.key,
          });
        }
        _ => {}
      }
    }

    for pair in history.windows(2) {
      let (earlier, later) = (pair[0], pair[1]);
      if earlier.row.expiration_date > later.row.effective_date {
        violations.push(TimelineViolation::Overlap {
          natural_key: natural_key.clone(),
          earlier:     earlier.key,
          later:       later.key,
        });
      }
    }
  }
  violations
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, d).unwrap() }

  fn offering(code: &str, instructor: &str, capacity: i64) -> CourseOffering {
    CourseOffering {
      code:       code.into(),
      name:       Some("Intro".into()),
      credits:    Some(3),
      section:    "A".into(),
      instructor: Some(instructor.into()),
      capacity:   Some(capacity),
    }
  }

  /// Apply a changeset to an in-memory copy of the dimension, the way a
  /// warehouse would.
  fn apply(
    stored: &mut Vec<Keyed<Version<CourseOffering>>>,
    changeset: VersionChangeset<CourseOffering>,
  ) {
    for row in stored.iter_mut() {
      if changeset.expire.contains(&row.key) {
        row.row.expiration_date = changeset.expire_on;
        row.row.flag = CurrentFlag::Expired;
      }
    }
    stored.extend(changeset.insert);
  }

  fn max_key(stored: &[Keyed<Version<CourseOffering>>]) -> Option<i64> {
    stored.iter().map(|v| v.key).max()
  }

  #[test]
  fn duplicate_source_rows_make_one_first_version() {
    let plan = plan_versions(&[], vec![
      offering("CS101", "Smith", 30),
      offering("CS101", "Smith", 30),
    ]);
    assert_eq!(plan.insert, vec![offering("CS101", "Smith", 30)]);
    assert_eq!(plan.duplicates, 1);
    assert_eq!(plan.conflicting, 0);
    assert!(plan.expire.is_empty());
  }

  #[test]
  fn capacity_change_expires_and_reinserts() {
    let mut stored = Vec::new();
    let first = plan_versions(&stored, vec![
      offering("CS101", "Smith", 30),
      offering("CS101", "Smith", 30),
    ]);
    let changeset = first.into_changeset(KeyBlock::after(max_key(&stored)), day(1));
    apply(&mut stored, changeset);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key, 1);

    let second = plan_versions(&stored, vec![offering("CS101", "Smith", 25)]);
    assert_eq!(second.expire, vec![1]);
    let changeset = second.into_changeset(KeyBlock::after(max_key(&stored)), day(9));
    apply(&mut stored, changeset);

    assert_eq!(stored.len(), 2);
    let old = &stored[0];
    assert_eq!(old.key, 1);
    assert_eq!(old.row.flag, CurrentFlag::Expired);
    assert_eq!(old.row.expiration_date, day(9));
    assert_eq!(old.row.row.capacity, Some(30));
    let new = &stored[1];
    assert_eq!(new.key, 2);
    assert!(new.row.is_current());
    assert_eq!(new.row.effective_date, day(9));
    assert_eq!(new.row.expiration_date, open_ended());
    assert_eq!(new.row.row.capacity, Some(25));

    assert!(verify_timeline(&stored).is_empty());
  }

  #[test]
  fn unchanged_batch_is_a_no_op() {
    let stored = vec![Keyed {
      key: 4,
      row: Version::current(offering("CS101", "Smith", 30), day(1)),
    }];
    let plan = plan_versions(&stored, vec![offering("CS101", "Smith", 30)]);
    assert!(plan.is_empty());
    assert_eq!(plan.unchanged, 1);
  }

  #[test]
  fn untracked_attributes_do_not_version() {
    let stored = vec![Keyed {
      key: 4,
      row: Version::current(offering("CS101", "Smith", 30), day(1)),
    }];
    let mut renamed = offering("CS101", "Smith", 30);
    renamed.name = Some("Introduction".into());
    renamed.credits = Some(4);
    assert!(plan_versions(&stored, vec![renamed]).is_empty());
  }

  #[test]
  fn expired_history_is_ignored() {
    let mut old = Version::current(offering("CS101", "Jones", 40), day(1));
    old.flag = CurrentFlag::Expired;
    old.expiration_date = day(2);
    let stored = vec![
      Keyed { key: 1, row: old },
      Keyed {
        key: 2,
        row: Version::current(offering("CS101", "Smith", 30), day(2)),
      },
    ];
    // Matching the expired version is still a change against the current one.
    let plan = plan_versions(&stored, vec![offering("CS101", "Jones", 40)]);
    assert_eq!(plan.expire, vec![2]);
    assert_eq!(plan.insert.len(), 1);
  }

  #[test]
  fn conflicting_rows_keep_the_last() {
    let plan = plan_versions(&[], vec![
      offering("CS101", "Smith", 30),
      offering("CS101", "Jones", 30),
    ]);
    assert_eq!(plan.conflicting, 1);
    assert_eq!(plan.insert, vec![offering("CS101", "Jones", 30)]);
  }

  #[test]
  fn double_current_rows_are_healed() {
    let stored = vec![
      Keyed {
        key: 1,
        row: Version::current(offering("CS101", "Smith", 30), day(1)),
      },
      Keyed {
        key: 2,
        row: Version::current(offering("CS101", "Smith", 30), day(1)),
      },
    ];
    let plan = plan_versions(&stored, vec![offering("CS101", "Smith", 30)]);
    assert_eq!(plan.expire, vec![1, 2]);
    assert_eq!(plan.insert.len(), 1);
  }

  #[test]
  fn verify_reports_each_kind_of_violation() {
    let mut expired_open = Version::current(offering("A1", "X", 1), day(1));
    expired_open.flag = CurrentFlag::Expired;
    let mut current_closed = Version::current(offering("B1", "X", 1), day(1));
    current_closed.expiration_date = day(5);
    let mut overlapping = Version::current(offering("C1", "X", 1), day(1));
    overlapping.flag = CurrentFlag::Expired;
    overlapping.expiration_date = day(8);

    let stored = vec![
      Keyed { key: 1, row: expired_open },
      Keyed { key: 2, row: current_closed },
      Keyed { key: 3, row: overlapping },
      Keyed {
        key: 4,
        row: Version::current(offering("C1", "Y", 1), day(3)),
      },
      Keyed {
        key: 5,
        row: Version::current(offering("D1", "X", 1), day(1)),
      },
      Keyed {
        key: 6,
        row: Version::current(offering("D1", "Y", 1), day(2)),
      },
    ];
    let violations = verify_timeline(&stored);
    let a1 = ("A1".to_string(), "A".to_string());
    let b1 = ("B1".to_string(), "A".to_string());
    let c1 = ("C1".to_string(), "A".to_string());
    let d1 = ("D1".to_string(), "A".to_string());
    assert!(violations.contains(&TimelineViolation::NoCurrentVersion {
      natural_key: a1.clone(),
    }));
    assert!(violations.contains(&TimelineViolation::ExpiredOpenEnded {
      natural_key: a1,
      key:         1,
    }));
    assert!(violations.contains(&TimelineViolation::CurrentNotOpenEnded {
      natural_key: b1,
      key:         2,
    }));
    assert!(violations.contains(&TimelineViolation::Overlap {
      natural_key: c1,
      earlier:     3,
      later:       4,
    }));
    assert!(violations.contains(
      &TimelineViolation::MultipleCurrentVersions {
        natural_key: d1.clone(),
        keys:        vec![5, 6],
      }
    ));
    assert!(violations.contains(&TimelineViolation::Overlap {
      natural_key: d1,
      earlier:     5,
      later:       6,
    }));
    assert_eq!(violations.len(), 6);
  }
}
