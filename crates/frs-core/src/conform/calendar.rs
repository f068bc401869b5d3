use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use super::{Conformance, Conformed};
use crate::{
  Table,
  dimension::{AcademicTerm, CalendarDay, Keyed},
  rejection::Rejection,
  source::{SourceSnapshot, parse_timestamp},
  store::TargetBatch,
};

impl Conformed for CalendarDay {
  type NaturalKey = NaiveDate;

  const TABLE: Table = Table::Calendar;

  fn natural_key(&self) -> NaiveDate { self.date }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::Calendar(rows)
  }
}

/// The `dim_waktu` row for `date`.
pub fn calendar_day(date: NaiveDate) -> CalendarDay {
  CalendarDay {
    date,
    day_name: date.format("%A").to_string(),
    month_name: date.format("%B").to_string(),
    year: date.year(),
    term: if date.month() <= 6 {
      AcademicTerm::Genap
    } else {
      AcademicTerm::Ganjil
    },
  }
}

/// One calendar row per distinct date found in any date-bearing source
/// column, ascending. Values that do not parse are counted; null values are
/// simply absent.
pub fn conform_calendar(snapshot: &SourceSnapshot) -> Conformance<CalendarDay> {
  let raw_dates = snapshot
    .study_plans
    .iter()
    .map(|p| p.approved_at.as_deref())
    .chain(snapshot.payments.iter().map(|p| p.paid_at.as_deref()))
    .chain(snapshot.details.iter().map(|d| d.recorded_at.as_deref()))
    .chain(snapshot.cancellations.iter().map(|c| c.submitted_at.as_deref()))
    .chain(snapshot.logs.iter().map(|l| l.logged_at.as_deref()))
    .flatten();

  let mut out = Conformance::default();
  let mut dates = BTreeSet::new();
  for raw in raw_dates {
    match parse_timestamp(raw) {
      Some(ts) => {
        dates.insert(ts.date());
      }
      None => out.rejected.record(Rejection::UnparseableDate),
    }
  }

  out.rows = dates.into_iter().map(calendar_day).collect();
  out
}
