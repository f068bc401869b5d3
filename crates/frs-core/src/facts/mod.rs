//! Fact assembly: operational rows joined to dimension keys, with derived
//! measures.
//!
//! A source row whose required key does not resolve is never defaulted: it is
//! left out of the candidate set and counted in [`Assembly::rejected`].

mod approval;
mod cancellation;
mod class_change;
mod enrollment;
pub mod lookup;
pub mod metrics;

use chrono::{NaiveDate, NaiveDateTime};

pub use approval::ApprovalStatus;
pub use lookup::{ClassInfo, DimensionIndex, SourceIndex};
pub use metrics::{CreditTally, GradeBook, PaymentLedger, elapsed_days, round2};

use crate::{
  fact::FactRow,
  rejection::{Rejection, RejectionTally},
  source::{SourceSnapshot, parse_timestamp},
};

/// Everything an assembler reads, built once per run after the dimensions
/// are loaded.
#[derive(Debug, Clone)]
pub struct FactContext<'a> {
  pub snapshot: &'a SourceSnapshot,
  pub dims:     &'a DimensionIndex,
  pub source:   SourceIndex<'a>,
  pub grades:   GradeBook,
  pub payments: PaymentLedger,
}

impl<'a> FactContext<'a> {
  pub fn new(snapshot: &'a SourceSnapshot, dims: &'a DimensionIndex) -> Self {
    Self {
      snapshot,
      dims,
      source: SourceIndex::new(snapshot),
      grades: GradeBook::new(&snapshot.grades),
      payments: PaymentLedger::new(&snapshot.payments),
    }
  }
}

/// Candidate fact rows, before the incremental filter.
#[derive(Debug, Clone)]
pub struct Assembly<F> {
  pub rows:            Vec<F>,
  pub rejected:        RejectionTally,
  /// Source rows skipped because their event predates the watermark.
  pub below_watermark: usize,
}

impl<F> Default for Assembly<F> {
  fn default() -> Self {
    Self {
      rows:            Vec::new(),
      rejected:        RejectionTally::new(),
      below_watermark: 0,
    }
  }
}

/// A fact row type that can be assembled from a [`FactContext`].
pub trait Assemble: FactRow + Sized {
  /// Build candidates. With a `watermark`, events dated before it are
  /// skipped.
  fn assemble(ctx: &FactContext<'_>, watermark: Option<NaiveDate>) -> Assembly<Self>;
}

/// Parse a required timestamp, classifying the failure.
pub(crate) fn required_timestamp(
  raw: Option<&str>,
) -> Result<NaiveDateTime, Rejection> {
  let raw = raw.ok_or(Rejection::MissingCalendarDate)?;
  parse_timestamp(raw).ok_or(Rejection::UnparseableDate)
}
