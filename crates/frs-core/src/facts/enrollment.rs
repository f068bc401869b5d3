use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use super::{Assemble, Assembly, FactContext, required_timestamp};
use crate::{
  fact::EnrollmentFact,
  rejection::Rejection,
  source::{DetailAction, StudyPlanDetail, parse_timestamp},
  watermark,
};

impl Assemble for EnrollmentFact {
  /// One row per class on a study plan, dated by the plan's approval. When a
  /// class was added and dropped on the same plan, the last entry decides.
  fn assemble(ctx: &FactContext<'_>, mark: Option<NaiveDate>) -> Assembly<Self> {
    let mut details: Vec<&StudyPlanDetail> =
      last_action_per_class(&ctx.snapshot.details);
    details.sort_by_key(|d| d.id);

    let mut out = Assembly::default();
    for detail in details {
      match enrollment(ctx, detail, mark) {
        Ok(Some(row)) => out.rows.push(row),
        Ok(None) => out.below_watermark += 1,
        Err(reason) => out.rejected.record(reason),
      }
    }
    out
  }
}

/// Keep the latest entry of each (plan, class) pair, ordered by when it was
/// recorded and then by id. Unparseable timestamps sort first.
fn last_action_per_class(
  details: &[StudyPlanDetail],
) -> Vec<&StudyPlanDetail> {
  type Latest<'a> = (Option<NaiveDateTime>, &'a StudyPlanDetail);
  let mut latest: BTreeMap<(i64, i64), Latest<'_>> = BTreeMap::new();
  for detail in details {
    let at = detail.recorded_at.as_deref().and_then(parse_timestamp);
    latest
      .entry((detail.study_plan_id, detail.class_id))
      .and_modify(|current| {
        if (at, detail.id) > (current.0, current.1.id) {
          *current = (at, detail);
        }
      })
      .or_insert((at, detail));
  }
  latest.into_values().map(|(_, detail)| detail).collect()
}

fn enrollment(
  ctx: &FactContext<'_>,
  detail: &StudyPlanDetail,
  mark: Option<NaiveDate>,
) -> Result<Option<EnrollmentFact>, Rejection> {
  let plan = ctx
    .source
    .plan(detail.study_plan_id)
    .ok_or(Rejection::MissingStudyPlan)?;
  let class = ctx
    .source
    .class(detail.class_id)
    .ok_or(Rejection::MissingCourse)?;
  let student_key = ctx
    .dims
    .student(&plan.nrp)
    .ok_or(Rejection::MissingStudent)?;
  let date = required_timestamp(plan.approved_at.as_deref())?.date();
  if !watermark::admits(mark, date) {
    return Ok(None);
  }
  let date_key = ctx.dims.date(date).ok_or(Rejection::MissingCalendarDate)?;
  let course = ctx
    .dims
    .course_as_of(&class.code, &class.section, date)
    .ok_or(Rejection::MissingCourse)?;

  Ok(Some(EnrollmentFact {
    student_key,
    course_key: course.key,
    date_key,
    credits: class.credits,
    gpa_to_date: ctx.grades.gpa_before(&plan.nrp, plan.semester),
    has_paid: ctx.payments.has_paid(&plan.nrp, plan.semester),
    is_drop: DetailAction::parse(detail.action.as_deref()) == DetailAction::Drop,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::facts::fixtures;

  #[test]
  fn one_row_per_class_with_derived_measures() {
    let snapshot = fixtures::snapshot();
    let dims = fixtures::dims();
    let ctx = FactContext::new(&snapshot, &dims);
    let out = EnrollmentFact::assemble(&ctx, None);

    assert!(out.rejected.is_empty());
    assert_eq!(out.rows.len(), 2);
    let drop = &out.rows[1];
    assert_eq!(drop.course_key, 2);
    // Dated by the plan approval on 03-05.
    assert_eq!(drop.date_key, 3);
    assert_eq!(drop.credits, 4);
    assert_eq!(drop.gpa_to_date, 3.25);
    assert!(drop.has_paid);
    assert!(drop.is_drop);
    assert!(!out.rows[0].is_drop);
  }

  #[test]
  fn unapproved_plans_are_rejected_not_defaulted() {
    let mut snapshot = fixtures::snapshot();
    snapshot.study_plans[0].approved_at = None;
    let dims = fixtures::dims();
    let ctx = FactContext::new(&snapshot, &dims);
    let out = EnrollmentFact::assemble(&ctx, None);
    assert!(out.rows.is_empty());
    assert_eq!(out.rejected.count(Rejection::MissingCalendarDate), 2);
  }

  #[test]
  fn unknown_students_and_classes_are_counted() {
    let mut snapshot = fixtures::snapshot();
    snapshot.details[0].class_id = 99;
    snapshot.study_plans[0].nrp = "0000".into();
    let dims = fixtures::dims();
    let ctx = FactContext::new(&snapshot, &dims);
    let out = EnrollmentFact::assemble(&ctx, None);
    assert!(out.rows.is_empty());
    assert_eq!(out.rejected.count(Rejection::MissingCourse), 1);
    assert_eq!(out.rejected.count(Rejection::MissingStudent), 1);
  }

  #[test]
  fn the_latest_entry_for_a_class_decides_not_the_lowest_id() {
    let mut snapshot = fixtures::snapshot();
    // Re-added after the drop, under a lower id than the drop.
    snapshot.details[0] = StudyPlanDetail {
      id:            0,
      study_plan_id: 100,
      class_id:      2,
      action:        Some("ADD".into()),
      recorded_at:   Some("2024-03-03 08:00:00".into()),
    };
    let dims = fixtures::dims();
    let ctx = FactContext::new(&snapshot, &dims);
    let out = EnrollmentFact::assemble(&ctx, None);
    assert_eq!(out.rows.len(), 1);
    assert_eq!(out.rows[0].course_key, 2);
    assert!(!out.rows[0].is_drop);
  }

  #[test]
  fn timestamp_ties_fall_back_to_the_higher_id() {
    let mut snapshot = fixtures::snapshot();
    for detail in &mut snapshot.details {
      detail.recorded_at = None;
    }
    let dims = fixtures::dims();
    let ctx = FactContext::new(&snapshot, &dims);
    let out = EnrollmentFact::assemble(&ctx, None);
    let cs102 = out.rows.iter().find(|r| r.course_key == 2).unwrap();
    assert!(cs102.is_drop);
  }
}
