use std::collections::HashMap;

use super::{Conformance, Conformed, first_per_key};
use crate::{
  Table,
  dimension::{Keyed, Student},
  normalize,
  rejection::Rejection,
  source::SourceSnapshot,
  store::{Correction, TargetBatch},
};

impl Conformed for Student {
  type NaturalKey = String;

  const TABLE: Table = Table::Students;

  fn natural_key(&self) -> String { self.nrp.clone() }

  fn into_batch(rows: Vec<Keyed<Self>>) -> TargetBatch {
    TargetBatch::Students(rows)
  }

  fn into_correction(rows: Vec<Keyed<Self>>) -> Option<Correction> {
    Some(Correction::Students(rows))
  }
}

/// Build `dim_mahasiswa` rows: one per `nrp`, with the department and advisor
/// names joined in. A student without a usable email is rejected; a missing
/// department or advisor only leaves that column empty.
pub fn conform_students(snapshot: &SourceSnapshot) -> Conformance<Student> {
  let departments: HashMap<i64, Option<String>> = snapshot
    .departments
    .iter()
    .map(|d| (d.id, normalize::title_text(d.name.as_deref())))
    .collect();
  let advisors: HashMap<i64, Option<String>> = snapshot
    .advisors
    .iter()
    .map(|a| (a.id, normalize::academic_name(a.name.as_deref())))
    .collect();

  let mut out = Conformance::default();
  let mut candidates = Vec::with_capacity(snapshot.students.len());

  for record in &snapshot.students {
    let nrp = record.nrp.trim();
    if nrp.is_empty() {
      out.rejected.record(Rejection::MissingNaturalKey);
      continue;
    }
    let Some(email) = normalize::email(record.email.as_deref())
      .filter(|e| normalize::is_valid_email(e))
    else {
      out.rejected.record(Rejection::InvalidEmail);
      continue;
    };

    let department = record
      .department_id
      .and_then(|id| departments.get(&id).cloned().flatten());
    let advisor_name = record
      .advisor_id
      .and_then(|id| advisors.get(&id).cloned().flatten());

    candidates.push((record.id, Student {
      nrp: nrp.to_string(),
      name: normalize::title_text(record.name.as_deref()),
      email,
      department,
      advisor_name,
    }));
  }

  let (rows, duplicates) = first_per_key(candidates);
  out.rows = rows;
  out.duplicates = duplicates;
  out
}
