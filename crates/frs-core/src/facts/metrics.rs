//! Derived fact measures.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::source::{DetailAction, GradeRecord, PaymentRecord};

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

/// Every student's grades by semester.
#[derive(Debug, Clone, Default)]
pub struct GradeBook {
  by_student: HashMap<String, Vec<(i64, f64)>>,
}

impl GradeBook {
  /// Grades without a value are left out.
  pub fn new(grades: &[GradeRecord]) -> Self {
    let mut by_student: HashMap<String, Vec<(i64, f64)>> = HashMap::new();
    for record in grades {
      if let Some(grade) = record.grade {
        by_student
          .entry(record.nrp.trim().to_string())
          .or_default()
          .push((record.semester, grade));
      }
    }
    Self { by_student }
  }

  /// The mean of the student's grades from semesters strictly before
  /// `semester`, to two decimals; 0.0 without any.
  pub fn gpa_before(&self, nrp: &str, semester: i64) -> f64 {
    let Some(grades) = self.by_student.get(nrp.trim()) else {
      return 0.0;
    };
    let (sum, count) = grades
      .iter()
      .filter(|(s, _)| *s < semester)
      .fold((0.0, 0usize), |(sum, count), (_, g)| (sum + g, count + 1));
    if count == 0 {
      return 0.0;
    }
    round2(sum / count as f64)
  }
}

/// Which (student, semester) pairs have a payment on record.
#[derive(Debug, Clone, Default)]
pub struct PaymentLedger {
  paid: HashSet<(String, i64)>,
}

impl PaymentLedger {
  pub fn new(payments: &[PaymentRecord]) -> Self {
    Self {
      paid: payments
        .iter()
        .map(|p| (p.nrp.trim().to_string(), p.semester))
        .collect(),
    }
  }

  pub fn has_paid(&self, nrp: &str, semester: i64) -> bool {
    self.paid.contains(&(nrp.trim().to_string(), semester))
  }
}

/// Whole days from `from` to `to`. Missing timestamps and negative spans
/// both yield 0.
pub fn elapsed_days(from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> i64 {
  match (from, to) {
    (Some(from), Some(to)) => (to - from).num_days().max(0),
    _ => 0,
  }
}

/// Add/drop counts and ADD-only credits over one group of detail rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreditTally {
  pub adds:    i64,
  pub drops:   i64,
  pub credits: i64,
}

impl CreditTally {
  pub fn record(&mut self, action: DetailAction, credits: i64) {
    match action {
      DetailAction::Add => {
        self.adds += 1;
        self.credits += credits;
      }
      DetailAction::Drop => self.drops += 1,
      DetailAction::Other => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::parse_timestamp;

  fn grade(nrp: &str, semester: i64, grade: Option<f64>) -> GradeRecord {
    GradeRecord { id: 0, nrp: nrp.into(), semester, grade }
  }

  #[test]
  fn gpa_uses_only_strictly_prior_semesters() {
    let book = GradeBook::new(&[
      grade("5025", 1, Some(3.0)),
      grade("5025", 2, Some(3.5)),
      grade("5025", 3, Some(1.0)),
      grade("9999", 1, Some(4.0)),
    ]);
    assert_eq!(book.gpa_before("5025", 3), 3.25);
    assert_eq!(book.gpa_before("5025", 2), 3.0);
    assert_eq!(book.gpa_before("5025", 1), 0.0);
    assert_eq!(book.gpa_before("0000", 5), 0.0);
  }

  #[test]
  fn gpa_rounds_and_skips_missing_grades() {
    let book = GradeBook::new(&[
      grade("5025", 1, Some(3.0)),
      grade("5025", 1, Some(3.5)),
      grade("5025", 1, Some(3.75)),
      grade("5025", 1, None),
    ]);
    // 10.25 / 3 = 3.41666...
    assert_eq!(book.gpa_before("5025", 2), 3.42);
  }

  #[test]
  fn payments_match_student_and_semester() {
    let ledger = PaymentLedger::new(&[PaymentRecord {
      id:       1,
      nrp:      "5025 ".into(),
      semester: 2,
      paid_at:  None,
    }]);
    assert!(ledger.has_paid("5025", 2));
    assert!(!ledger.has_paid("5025", 1));
  }

  #[test]
  fn elapsed_days_are_whole_and_non_negative() {
    let at = |raw| parse_timestamp(raw);
    assert_eq!(
      elapsed_days(at("2024-03-01 08:00"), at("2024-03-04 07:00")),
      2
    );
    assert_eq!(elapsed_days(at("2024-03-01"), at("2024-03-04")), 3);
    assert_eq!(elapsed_days(at("2024-03-04"), at("2024-03-01")), 0);
    assert_eq!(elapsed_days(None, at("2024-03-01")), 0);
  }

  #[test]
  fn credit_tally_counts_adds_only() {
    let mut tally = CreditTally::default();
    tally.record(DetailAction::Add, 3);
    tally.record(DetailAction::Add, 2);
    tally.record(DetailAction::Drop, 3);
    tally.record(DetailAction::Other, 4);
    assert_eq!(tally, CreditTally { adds: 2, drops: 1, credits: 5 });
  }
}
