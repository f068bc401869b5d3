//! Row-level rejections.
//!
//! A source row that cannot become a target row is left out of the batch and
//! counted here. Counts travel back to the caller in every job report so that
//! dropped rows are observable without reading logs.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
  // Resolution: a required join found nothing.
  MissingStudent,
  MissingCourse,
  MissingCalendarDate,
  MissingStudyPlan,
  MissingAdvisor,
  MissingStatus,

  // Parse: a value could not be converted.
  UnparseableDate,

  // Validation: a Type 1 input failed its minimal checks.
  InvalidEmail,
  MissingNaturalKey,
}

/// The broad class of a [`Rejection`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
  Resolution,
  Parse,
  Validation,
}

impl Rejection {
  pub fn kind(self) -> FailureKind {
    match self {
      Self::MissingStudent
      | Self::MissingCourse
      | Self::MissingCalendarDate
      | Self::MissingStudyPlan
      | Self::MissingAdvisor
      | Self::MissingStatus => FailureKind::Resolution,
      Self::UnparseableDate => FailureKind::Parse,
      Self::InvalidEmail | Self::MissingNaturalKey => FailureKind::Validation,
    }
  }
}

/// Per-reason counts of rejected rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RejectionTally(BTreeMap<Rejection, usize>);

impl RejectionTally {
  pub fn new() -> Self { Self::default() }

  pub fn record(&mut self, reason: Rejection) {
    *self.0.entry(reason).or_default() += 1;
  }

  pub fn count(&self, reason: Rejection) -> usize {
    self.0.get(&reason).copied().unwrap_or(0)
  }

  pub fn total(&self) -> usize { self.0.values().sum() }

  pub fn is_empty(&self) -> bool { self.total() == 0 }

  pub fn of_kind(&self, kind: FailureKind) -> usize {
    self
      .0
      .iter()
      .filter(|(reason, _)| reason.kind() == kind)
      .map(|(_, n)| n)
      .sum()
  }

  pub fn merge(&mut self, other: &RejectionTally) {
    for (reason, n) in &other.0 {
      *self.0.entry(*reason).or_default() += n;
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (Rejection, usize)> + '_ {
    self.0.iter().map(|(reason, n)| (*reason, *n))
  }
}

impl fmt::Display for RejectionTally {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return write!(f, "none");
    }
    let parts: Vec<String> = self
      .iter()
      .map(|(reason, n)| format!("{reason}={n}"))
      .collect();
    write!(f, "{}", parts.join(", "))
  }
}
