//! The `OperationalSource` and `Warehouse` traits and the batches they accept.
//!
//! Both traits are implemented by storage backends (e.g. `frs-store-sqlite`).
//! The engines in this crate depend on these abstractions, never on a
//! concrete database.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  FactTable, Table,
  dimension::{
    Advisor, CalendarDay, ChangeStatus, CourseOffering, Keyed, Student, Version,
  },
  fact::{ApprovalFact, CancellationFact, ClassChangeFact, EnrollmentFact, FactKey},
  source::{
    AdvisorRecord, CancellationRecord, ClassRecord, CourseRecord, Department,
    GradeRecord, PaymentRecord, StudentRecord, StudyPlan, StudyPlanDetail,
    StudyPlanLog,
  },
};

// ─── Operational source ──────────────────────────────────────────────────────

/// Snapshot reads of the operational tables. Every method returns the full
/// table in the source's natural order; there is no paging.
pub trait OperationalSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn departments(
    &self,
  ) -> impl Future<Output = Result<Vec<Department>, Self::Error>> + Send + '_;

  fn advisors(
    &self,
  ) -> impl Future<Output = Result<Vec<AdvisorRecord>, Self::Error>> + Send + '_;

  fn students(
    &self,
  ) -> impl Future<Output = Result<Vec<StudentRecord>, Self::Error>> + Send + '_;

  fn courses(
    &self,
  ) -> impl Future<Output = Result<Vec<CourseRecord>, Self::Error>> + Send + '_;

  fn classes(
    &self,
  ) -> impl Future<Output = Result<Vec<ClassRecord>, Self::Error>> + Send + '_;

  fn study_plans(
    &self,
  ) -> impl Future<Output = Result<Vec<StudyPlan>, Self::Error>> + Send + '_;

  fn study_plan_details(
    &self,
  ) -> impl Future<Output = Result<Vec<StudyPlanDetail>, Self::Error>> + Send + '_;

  fn study_plan_logs(
    &self,
  ) -> impl Future<Output = Result<Vec<StudyPlanLog>, Self::Error>> + Send + '_;

  fn grades(
    &self,
  ) -> impl Future<Output = Result<Vec<GradeRecord>, Self::Error>> + Send + '_;

  fn payments(
    &self,
  ) -> impl Future<Output = Result<Vec<PaymentRecord>, Self::Error>> + Send + '_;

  fn cancellations(
    &self,
  ) -> impl Future<Output = Result<Vec<CancellationRecord>, Self::Error>> + Send + '_;
}

// ─── Write batches ───────────────────────────────────────────────────────────

/// Keyed rows to append to one target table.
///
/// Course offerings are absent on purpose: they are only ever written through
/// [`Warehouse::apply_versions`], which pairs each insert with its expiry.
#[derive(Debug, Clone)]
pub enum TargetBatch {
  Advisors(Vec<Keyed<Advisor>>),
  Students(Vec<Keyed<Student>>),
  ChangeStatuses(Vec<Keyed<ChangeStatus>>),
  Calendar(Vec<Keyed<CalendarDay>>),
  Enrollments(Vec<Keyed<EnrollmentFact>>),
  ClassChanges(Vec<Keyed<ClassChangeFact>>),
  Approvals(Vec<Keyed<ApprovalFact>>),
  Cancellations(Vec<Keyed<CancellationFact>>),
}

impl TargetBatch {
  pub fn table(&self) -> Table {
    match self {
      Self::Advisors(_) => Table::Advisors,
      Self::Students(_) => Table::Students,
      Self::ChangeStatuses(_) => Table::ChangeStatuses,
      Self::Calendar(_) => Table::Calendar,
      Self::Enrollments(_) => Table::Enrollments,
      Self::ClassChanges(_) => Table::ClassChanges,
      Self::Approvals(_) => Table::Approvals,
      Self::Cancellations(_) => Table::Cancellations,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Self::Advisors(rows) => rows.len(),
      Self::Students(rows) => rows.len(),
      Self::ChangeStatuses(rows) => rows.len(),
      Self::Calendar(rows) => rows.len(),
      Self::Enrollments(rows) => rows.len(),
      Self::ClassChanges(rows) => rows.len(),
      Self::Approvals(rows) => rows.len(),
      Self::Cancellations(rows) => rows.len(),
    }
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Type 1 rows to overwrite in place, matched by surrogate key.
#[derive(Debug, Clone)]
pub enum Correction {
  Advisors(Vec<Keyed<Advisor>>),
  Students(Vec<Keyed<Student>>),
}

impl Correction {
  pub fn table(&self) -> Table {
    match self {
      Self::Advisors(_) => Table::Advisors,
      Self::Students(_) => Table::Students,
    }
  }
}

/// One SCD2 step for a dimension: expire the listed current rows and insert
/// their successors, all or nothing.
#[derive(Debug, Clone)]
pub struct VersionChangeset<T> {
  /// Surrogate keys of the `Current` rows to expire.
  pub expire:    Vec<i64>,
  /// The date written as `expiration_date` on expired rows.
  pub expire_on: NaiveDate,
  pub insert:    Vec<Keyed<Version<T>>>,
}

impl<T> VersionChangeset<T> {
  pub fn is_empty(&self) -> bool {
    self.expire.is_empty() && self.insert.is_empty()
  }
}

/// What an applied [`VersionChangeset`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionsApplied {
  pub expired:  usize,
  pub inserted: usize,
}

// ─── Warehouse ───────────────────────────────────────────────────────────────

/// Abstraction over the star-schema target.
///
/// Appends are all-or-nothing per call and must fail with
/// [`crate::Error::IntegrityConflict`] (wrapped in the backend error) rather
/// than skip rows when a key collides or the batch was keyed against a stale
/// maximum. The only in-place writes are keyed Type 1 corrections and the SCD2
/// expire step.
///
/// Implementations assume a single writer per table per run.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The largest surrogate key in `table`, or `None` when it is empty.
  fn max_key(
    &self,
    table: Table,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + '_;

  fn students(
    &self,
  ) -> impl Future<Output = Result<Vec<Keyed<Student>>, Self::Error>> + Send + '_;

  fn advisors(
    &self,
  ) -> impl Future<Output = Result<Vec<Keyed<Advisor>>, Self::Error>> + Send + '_;

  fn change_statuses(
    &self,
  ) -> impl Future<Output = Result<Vec<Keyed<ChangeStatus>>, Self::Error>> + Send + '_;

  fn calendar(
    &self,
  ) -> impl Future<Output = Result<Vec<Keyed<CalendarDay>>, Self::Error>> + Send + '_;

  /// Every version of every course offering, expired ones included.
  fn course_versions(
    &self,
  ) -> impl Future<
    Output = Result<Vec<Keyed<Version<CourseOffering>>>, Self::Error>,
  > + Send
  + '_;

  /// The dimension-key triple of every loaded row of `fact`.
  fn fact_keys(
    &self,
    fact: FactTable,
  ) -> impl Future<Output = Result<Vec<FactKey>, Self::Error>> + Send + '_;

  /// The distinct calendar keys in the watermark column of `fact`.
  fn watermark_keys(
    &self,
    fact: FactTable,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Append every row of `batch`, returning the number written.
  fn append(
    &self,
    batch: TargetBatch,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Overwrite Type 1 attributes by surrogate key, returning the number of
  /// rows updated.
  fn correct(
    &self,
    correction: Correction,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Apply one SCD2 changeset to `dim_mata_kuliah` atomically.
  fn apply_versions(
    &self,
    changeset: VersionChangeset<CourseOffering>,
  ) -> impl Future<Output = Result<VersionsApplied, Self::Error>> + Send + '_;
}
