//! Fact row types.
//!
//! A fact row is immutable once loaded. Every fact table carries a triple of
//! dimension keys ([`FactKey`]) that identifies the event; the incremental
//! filter guarantees no triple is loaded twice.

use serde::{Deserialize, Serialize};

use crate::{FactTable, dimension::Keyed, store::TargetBatch};

/// The dimension-key triple of a fact row, in
/// [`FactTable::key_columns`] order.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FactKey(pub i64, pub i64, pub i64);

/// Behaviour shared by every fact row type.
pub trait FactRow: Clone + Send + 'static {
  const TABLE: FactTable;

  fn fact_key(&self) -> FactKey;

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch;
}

// ─── fact_pengambilan_kelas ──────────────────────────────────────────────────

/// One class taken (or dropped) on an approved study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentFact {
  pub student_key: i64,
  pub course_key:  i64,
  pub date_key:    i64,
  pub credits:     i64,
  /// Grade average over semesters strictly before the plan's semester.
  pub gpa_to_date: f64,
  pub has_paid:    bool,
  pub is_drop:     bool,
}

impl FactRow for EnrollmentFact {
  const TABLE: FactTable = FactTable::Enrollment;

  fn fact_key(&self) -> FactKey {
    FactKey(self.student_key, self.course_key, self.date_key)
  }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::Enrollments(rows)
  }
}

// ─── fact_perubahan_kelas ────────────────────────────────────────────────────

/// Add/drop activity of one student on one course offering in one semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassChangeFact {
  pub student_key:          i64,
  pub course_key:           i64,
  pub status_key:           i64,
  pub date_key:             i64,
  pub drop_count:           i64,
  pub add_count:            i64,
  /// Credits summed over the group's ADD actions only.
  pub credits_after_change: i64,
}

impl FactRow for ClassChangeFact {
  const TABLE: FactTable = FactTable::ClassChange;

  fn fact_key(&self) -> FactKey {
    FactKey(self.student_key, self.course_key, self.date_key)
  }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::ClassChanges(rows)
  }
}

// ─── fact_persetujuan_frs ────────────────────────────────────────────────────

/// The current approval state of a study plan, taken from its latest log
/// entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalFact {
  pub student_key:       i64,
  pub advisor_key:       i64,
  pub approval_date_key: i64,
  pub is_approved:       bool,
  pub total_credits:     i64,
  pub gpa_to_date:       f64,
}

impl FactRow for ApprovalFact {
  const TABLE: FactTable = FactTable::Approval;

  fn fact_key(&self) -> FactKey {
    FactKey(self.student_key, self.advisor_key, self.approval_date_key)
  }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::Approvals(rows)
  }
}

// ─── fact_pembatalan_frs ─────────────────────────────────────────────────────

/// A cancellation request against an approved study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationFact {
  pub student_key:        i64,
  pub submitted_date_key: i64,
  pub verified_date_key:  i64,
  pub gpa_to_date:        f64,
  /// Whole days between submission and verification; never negative.
  pub verification_days:  i64,
}

impl FactRow for CancellationFact {
  const TABLE: FactTable = FactTable::Cancellation;

  fn fact_key(&self) -> FactKey {
    FactKey(
      self.student_key,
      self.submitted_date_key,
      self.verified_date_key,
    )
  }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::Cancellations(rows)
  }
}
