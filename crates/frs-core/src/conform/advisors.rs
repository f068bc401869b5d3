use super::{Conformance, Conformed, first_per_key};
use crate::{
  Table,
  dimension::{Advisor, Keyed},
  normalize,
  rejection::Rejection,
  source::SourceSnapshot,
  store::{Correction, TargetBatch},
};

impl Conformed for Advisor {
  type NaturalKey = String;

  const TABLE: Table = Table::Advisors;

  fn natural_key(&self) -> String { self.email.clone() }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::Advisors(rows)
  }

  fn into_correction(rows: Vec<Keyed<Self>>) -> Option<Correction> {
    Some(Correction::Advisors(rows))
  }
}

/// Build `dim_dosen_wali` rows, one per normalized email.
pub fn conform_advisors(snapshot: &SourceSnapshot) -> Conformance<Advisor> {
  let mut out = Conformance::default();
  let mut candidates = Vec::with_capacity(snapshot.advisors.len());

  for record in &snapshot.advisors {
    let Some(email) = normalize::email(record.email.as_deref()) else {
      out.rejected.record(Rejection::MissingNaturalKey);
      continue;
    };
    if !normalize::is_valid_email(&email) {
      out.rejected.record(Rejection::InvalidEmail);
      continue;
    }
    candidates.push((record.id, Advisor {
      name: normalize::academic_name(record.name.as_deref()),
      email,
    }));
  }

  let (rows, duplicates) = first_per_key(candidates);
  out.rows = rows;
  out.duplicates = duplicates;
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::AdvisorRecord;

  fn record(id: i64, name: &str, email: Option<&str>) -> AdvisorRecord {
    AdvisorRecord {
      id,
      name: Some(name.into()),
      email: email.map(Into::into),
    }
  }

  #[test]
  fn normalizes_names_and_emails() {
    let snapshot = SourceSnapshot {
      advisors: vec![record(1, "  PROF dr  ani ,  phd", Some(" Ani@ITS.AC.ID "))],
      ..Default::default()
    };
    let out = conform_advisors(&snapshot);
    assert_eq!(out.rows, vec![Advisor {
      name:  Some("Prof. Dr. Ani , PhD".into()),
      email: "ani@its.ac.id".into(),
    }]);
  }

  #[test]
  fn dedups_on_email_and_rejects_blank_ones() {
    let snapshot = SourceSnapshot {
      advisors: vec![
        record(4, "Second", Some("dup@its.ac.id")),
        record(2, "First", Some("DUP@its.ac.id")),
        record(3, "Nobody", Some("   ")),
        record(5, "Broken", Some("broken.its.ac.id")),
      ],
      ..Default::default()
    };
    let out = conform_advisors(&snapshot);
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].name.as_deref(), Some("First"));
    assert_eq!(out.duplicates, 1);
    assert_eq!(out.rejected.count(Rejection::MissingNaturalKey), 1);
    assert_eq!(out.rejected.count(Rejection::InvalidEmail), 1);
  }
}
