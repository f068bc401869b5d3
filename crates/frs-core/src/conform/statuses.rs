use std::collections::BTreeSet;

use super::{Conformance, Conformed};
use crate::{
  Table,
  dimension::{ChangeStatus, Keyed},
  normalize,
  source::SourceSnapshot,
  store::TargetBatch,
};

impl Conformed for ChangeStatus {
  /// Statuses compare case-insensitively.
  type NaturalKey = String;

  const TABLE: Table = Table::ChangeStatuses;

  fn natural_key(&self) -> String { self.status.trim().to_uppercase() }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::ChangeStatuses(rows)
  }
}

/// The distinct `detail_frs.action` values, capitalised (`Add`, `Drop`).
/// Blank actions carry no status and are skipped.
pub fn conform_statuses(snapshot: &SourceSnapshot) -> Conformance<ChangeStatus> {
  let keys: BTreeSet<String> = snapshot
    .details
    .iter()
    .filter_map(|d| normalize::trimmed(d.action.as_deref()))
    .map(|action| action.to_uppercase())
    .collect();

  Conformance {
    rows: keys
      .into_iter()
      .map(|key| ChangeStatus { status: normalize::capitalize(&key) })
      .collect(),
    ..Default::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::StudyPlanDetail;

  fn detail(id: i64, action: Option<&str>) -> StudyPlanDetail {
    StudyPlanDetail {
      id,
      study_plan_id: 1,
      class_id: 1,
      action: action.map(Into::into),
      recorded_at: None,
    }
  }

  #[test]
  fn distinct_capitalised_actions() {
    let snapshot = SourceSnapshot {
      details: vec![
        detail(1, Some("ADD")),
        detail(2, Some(" add ")),
        detail(3, Some("DROP")),
        detail(4, None),
        detail(5, Some("  ")),
      ],
      ..Default::default()
    };
    let statuses: Vec<String> = conform_statuses(&snapshot)
      .rows
      .into_iter()
      .map(|s| s.status)
      .collect();
    assert_eq!(statuses, vec!["Add", "Drop"]);
  }

  #[test]
  fn natural_key_ignores_case() {
    let stored = ChangeStatus { status: "ADD".into() };
    let incoming = ChangeStatus { status: "Add".into() };
    assert_eq!(stored.natural_key(), incoming.natural_key());
  }
}
