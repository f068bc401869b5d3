//! Run orchestration.
//!
//! [`EtlContext`] holds the two store handles and the run options; nothing
//! about a run lives in process-wide state. A run extracts the operational
//! snapshot once, then executes the selected jobs in [`Table`] order so that
//! every dimension is written before a fact resolves keys against it.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoEnumIterator};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
  Error, FactTable, Result, Table,
  conform::{
    Conformance, Conformed, conform_advisors, conform_calendar, conform_courses,
    conform_statuses, conform_students, plan_type1,
  },
  dimension::Keyed,
  fact::{ApprovalFact, CancellationFact, ClassChangeFact, EnrollmentFact, FactKey},
  facts::{Assemble, DimensionIndex, FactContext},
  incremental::retain_unloaded,
  keys,
  rejection::RejectionTally,
  scd2::{self, TimelineViolation},
  source::SourceSnapshot,
  store::{OperationalSource, Warehouse},
  watermark,
};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LoadMode {
  /// Derive every fact candidate; only the incremental filter bounds the
  /// load.
  Historical,
  /// Additionally bound watermarked facts by their watermark.
  #[default]
  Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
  pub mode:  LoadMode,
  /// Effective and expiration date for SCD2 changes made by this run.
  pub today: NaiveDate,
  /// Jobs to run; empty means all of them.
  pub jobs:  BTreeSet<Table>,
}

impl RunOptions {
  pub fn new(mode: LoadMode, today: NaiveDate) -> Self {
    Self { mode, today, jobs: BTreeSet::new() }
  }

  pub fn with_jobs(mut self, jobs: impl IntoIterator<Item = Table>) -> Self {
    self.jobs.extend(jobs);
    self
  }

  pub fn includes(&self, table: Table) -> bool {
    self.jobs.is_empty() || self.jobs.contains(&table)
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobOutcome {
  Loaded,
  /// Nothing new since the last run. Not an error; the write step was
  /// skipped.
  EmptyIncrement,
}

/// What one job did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
  pub table:           Table,
  pub outcome:         JobOutcome,
  pub inserted:        usize,
  /// Type 1 rows overwritten in place.
  pub corrected:       usize,
  /// SCD2 rows expired.
  pub expired:         usize,
  pub unchanged:       usize,
  /// Source rows folded into another row with the same key.
  pub duplicates:      usize,
  pub rejected:        RejectionTally,
  /// Fact candidates whose key triple was already loaded.
  pub already_loaded:  usize,
  pub below_watermark: usize,
  pub watermark:       Option<NaiveDate>,
}

impl JobReport {
  fn new(table: Table) -> Self {
    Self {
      table,
      outcome: JobOutcome::EmptyIncrement,
      inserted: 0,
      corrected: 0,
      expired: 0,
      unchanged: 0,
      duplicates: 0,
      rejected: RejectionTally::new(),
      already_loaded: 0,
      below_watermark: 0,
      watermark: None,
    }
  }

  fn finish(mut self) -> Self {
    self.outcome = if self.inserted + self.corrected + self.expired > 0 {
      JobOutcome::Loaded
    } else {
      JobOutcome::EmptyIncrement
    };
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
  pub run_id: Uuid,
  pub mode:   LoadMode,
  pub today:  NaiveDate,
  pub jobs:   Vec<JobReport>,
}

impl RunReport {
  pub fn inserted(&self) -> usize { self.jobs.iter().map(|j| j.inserted).sum() }

  pub fn rejected(&self) -> RejectionTally {
    let mut total = RejectionTally::new();
    for job in &self.jobs {
      total.merge(&job.rejected);
    }
    total
  }

  pub fn job(&self, table: Table) -> Option<&JobReport> {
    self.jobs.iter().find(|j| j.table == table)
  }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// The explicit handles and options of a run.
pub struct EtlContext<S, W> {
  source:    S,
  warehouse: W,
  options:   RunOptions,
}

impl<S: OperationalSource, W: Warehouse> EtlContext<S, W> {
  pub fn new(source: S, warehouse: W, options: RunOptions) -> Self {
    Self { source, warehouse, options }
  }

  pub fn source(&self) -> &S { &self.source }

  pub fn warehouse(&self) -> &W { &self.warehouse }

  pub fn options(&self) -> &RunOptions { &self.options }

  /// Execute the selected jobs. The run stops at the first batch-level
  /// failure; jobs that completed before it stay committed.
  pub async fn run(&self) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!(
      "etl_run",
      %run_id,
      mode = %self.options.mode,
      today = %self.options.today,
    );
    self.run_jobs(run_id).instrument(span).await
  }

  async fn run_jobs(&self, run_id: Uuid) -> Result<RunReport> {
    let snapshot = SourceSnapshot::extract(&self.source).await?;
    let mut dims: Option<DimensionIndex> = None;
    let mut jobs = Vec::new();

    for table in Table::iter().filter(|t| self.options.includes(*t)) {
      let report = match table {
        Table::Advisors => {
          let existing = self
            .warehouse
            .advisors()
            .await
            .map_err(Error::warehouse_failure)?;
          self.load_type1(conform_advisors(&snapshot), existing).await?
        }
        Table::Students => {
          let existing = self
            .warehouse
            .students()
            .await
            .map_err(Error::warehouse_failure)?;
          self.load_type1(conform_students(&snapshot), existing).await?
        }
        Table::ChangeStatuses => {
          let existing = self
            .warehouse
            .change_statuses()
            .await
            .map_err(Error::warehouse_failure)?;
          self.load_type1(conform_statuses(&snapshot), existing).await?
        }
        Table::Calendar => {
          let existing = self
            .warehouse
            .calendar()
            .await
            .map_err(Error::warehouse_failure)?;
          self.load_type1(conform_calendar(&snapshot), existing).await?
        }
        Table::CourseOfferings => self.load_courses(&snapshot).await?,
        fact_table => {
          let fact = FactTable::try_from(fact_table)?;
          // Dimensions are complete once the first fact job starts.
          let index = match dims.take() {
            Some(index) => index,
            None => DimensionIndex::load(&self.warehouse).await?,
          };
          let report = {
            let ctx = FactContext::new(&snapshot, &index);
            match fact {
              FactTable::Enrollment => {
                self.load_facts::<EnrollmentFact>(&ctx).await?
              }
              FactTable::ClassChange => {
                self.load_facts::<ClassChangeFact>(&ctx).await?
              }
              FactTable::Approval => self.load_facts::<ApprovalFact>(&ctx).await?,
              FactTable::Cancellation => {
                self.load_facts::<CancellationFact>(&ctx).await?
              }
            }
          };
          dims = Some(index);
          report
        }
      };

      tracing::info!(
        table = %report.table,
        outcome = %report.outcome,
        inserted = report.inserted,
        corrected = report.corrected,
        expired = report.expired,
        unchanged = report.unchanged,
        rejected = report.rejected.total(),
        already_loaded = report.already_loaded,
        "job finished"
      );
      jobs.push(report);
    }

    Ok(RunReport {
      run_id,
      mode: self.options.mode,
      today: self.options.today,
      jobs,
    })
  }

  async fn load_type1<T: Conformed>(
    &self,
    conformed: Conformance<T>,
    existing: Vec<Keyed<T>>,
  ) -> Result<JobReport> {
    let mut report = JobReport::new(T::TABLE);
    report.duplicates = conformed.duplicates;
    report.rejected = conformed.rejected;
    if !report.rejected.is_empty() {
      tracing::warn!(
        table = %T::TABLE,
        rejected = %report.rejected,
        "source rows left out of the dimension"
      );
    }

    let plan = plan_type1(&existing, conformed.rows);
    report.unchanged = plan.unchanged;

    if !plan.corrections.is_empty() {
      let drifted = plan.corrections.len();
      match T::into_correction(plan.corrections) {
        Some(correction) => {
          report.corrected = self
            .warehouse
            .correct(correction)
            .await
            .map_err(Error::warehouse_failure)?;
        }
        None => {
          tracing::warn!(
            table = %T::TABLE,
            rows = drifted,
            "stored rows differ from the source but the table takes no \
             corrections"
          );
          report.unchanged += drifted;
        }
      }
    }

    if !plan.inserts.is_empty() {
      let block = keys::allocate(&self.warehouse, T::TABLE).await?;
      report.inserted = self
        .warehouse
        .append(T::into_batch(block.assign(plan.inserts)))
        .await
        .map_err(Error::warehouse_failure)?;
    }

    Ok(report.finish())
  }

  async fn load_courses(&self, snapshot: &SourceSnapshot) -> Result<JobReport> {
    let mut report = JobReport::new(Table::CourseOfferings);
    let conformed = conform_courses(snapshot);
    report.rejected = conformed.rejected;

    let versions = self
      .warehouse
      .course_versions()
      .await
      .map_err(Error::warehouse_failure)?;
    let plan = scd2::plan_versions(&versions, conformed.rows);
    report.unchanged = plan.unchanged;
    report.duplicates = plan.duplicates;

    if !plan.is_empty() {
      let block = keys::allocate(&self.warehouse, Table::CourseOfferings).await?;
      let applied = self
        .warehouse
        .apply_versions(plan.into_changeset(block, self.options.today))
        .await
        .map_err(Error::warehouse_failure)?;
      report.expired = applied.expired;
      report.inserted = applied.inserted;
    }

    Ok(report.finish())
  }

  async fn load_facts<F: Assemble>(
    &self,
    ctx: &FactContext<'_>,
  ) -> Result<JobReport> {
    let fact = F::TABLE;
    let mut report = JobReport::new(fact.table());

    report.watermark = watermark::watermark(&self.warehouse, fact).await?;
    let bound = match self.options.mode {
      LoadMode::Incremental if fact.is_watermark_bounded() => report.watermark,
      _ => None,
    };

    let assembly = F::assemble(ctx, bound);
    report.rejected = assembly.rejected;
    report.below_watermark = assembly.below_watermark;
    if !report.rejected.is_empty() {
      tracing::warn!(
        table = %fact,
        rejected = %report.rejected,
        "source rows dropped from the fact candidates"
      );
    }

    let loaded = self
      .warehouse
      .fact_keys(fact)
      .await
      .map_err(Error::warehouse_failure)?;
    let filtered = retain_unloaded(assembly.rows, loaded);
    report.already_loaded = filtered.already_loaded;
    report.duplicates = filtered.repeated;

    if !filtered.fresh.is_empty() {
      let block = keys::allocate(&self.warehouse, fact.table()).await?;
      report.inserted = self
        .warehouse
        .append(F::into_batch(block.assign(filtered.fresh)))
        .await
        .map_err(Error::warehouse_failure)?;
    }

    Ok(report.finish())
  }
}

// ─── Verification ────────────────────────────────────────────────────────────

/// A fact table holding the same key triple more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateTriples {
  pub table:   Table,
  /// Distinct triples that occur more than once.
  pub triples: usize,
}

/// Integrity of the stored warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
  pub timeline:   Vec<TimelineViolation<(String, String)>>,
  pub duplicates: Vec<DuplicateTriples>,
}

impl VerifyReport {
  pub fn is_clean(&self) -> bool {
    self.timeline.is_empty() && self.duplicates.is_empty()
  }
}

/// Check the course-offering history and every fact table's key triples.
pub async fn verify<W: Warehouse>(warehouse: &W) -> Result<VerifyReport> {
  let versions = warehouse
    .course_versions()
    .await
    .map_err(Error::warehouse_failure)?;
  let timeline = scd2::verify_timeline(&versions);

  let mut duplicates = Vec::new();
  for fact in FactTable::iter() {
    let keys = warehouse
      .fact_keys(fact)
      .await
      .map_err(Error::warehouse_failure)?;
    let mut seen: HashSet<FactKey> = HashSet::new();
    let mut repeated: HashSet<FactKey> = HashSet::new();
    for key in keys {
      if !seen.insert(key) {
        repeated.insert(key);
      }
    }
    if !repeated.is_empty() {
      duplicates.push(DuplicateTriples {
        table:   fact.table(),
        triples: repeated.len(),
      });
    }
  }

  Ok(VerifyReport { timeline, duplicates })
}
