use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{Assemble, Assembly, CreditTally, FactContext, required_timestamp};
use crate::{
  fact::ClassChangeFact,
  rejection::Rejection,
  source::{DetailAction, StudyPlanDetail},
  watermark,
};

/// One student's activity on one offering in one semester.
type GroupKey = (i64, String, String, i64);

/// A resolved detail row.
struct Change<'d> {
  detail:     &'d StudyPlanDetail,
  date:       NaiveDate,
  date_key:   i64,
  course_key: i64,
  status_key: i64,
  action:     DetailAction,
  credits:    i64,
}

impl Assemble for ClassChangeFact {
  /// Details grouped by (student, offering, semester). The earliest detail of
  /// a group supplies its date, course version and status; the counts and
  /// credits cover the whole group.
  fn assemble(ctx: &FactContext<'_>, mark: Option<NaiveDate>) -> Assembly<Self> {
    let mut out = Assembly::default();
    let mut groups: BTreeMap<GroupKey, Vec<Change<'_>>> = BTreeMap::new();

    for detail in &ctx.snapshot.details {
      match resolve(ctx, detail) {
        Ok((key, change)) => groups.entry(key).or_default().push(change),
        Err(reason) => out.rejected.record(reason),
      }
    }

    for ((student_key, ..), mut changes) in groups {
      changes.sort_by_key(|c| (c.date, c.detail.id));
      let Some(first) = changes.first() else { continue };
      if !watermark::admits(mark, first.date) {
        out.below_watermark += changes.len();
        continue;
      }
      let mut tally = CreditTally::default();
      for change in &changes {
        tally.record(change.action, change.credits);
      }
      out.rows.push(ClassChangeFact {
        student_key,
        course_key: first.course_key,
        status_key: first.status_key,
        date_key: first.date_key,
        drop_count: tally.drops,
        add_count: tally.adds,
        credits_after_change: tally.credits,
      });
    }
    out
  }
}

fn resolve<'d>(
  ctx: &FactContext<'_>,
  detail: &'d StudyPlanDetail,
) -> Result<(GroupKey, Change<'d>), Rejection> {
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
  let status_key = detail
    .action
    .as_deref()
    .and_then(|action| ctx.dims.status(action))
    .ok_or(Rejection::MissingStatus)?;
  let date = required_timestamp(detail.recorded_at.as_deref())?.date();
  let date_key = ctx.dims.date(date).ok_or(Rejection::MissingCalendarDate)?;
  let course = ctx
    .dims
    .course_as_of(&class.code, &class.section, date)
    .ok_or(Rejection::MissingCourse)?;

  let key = (
    student_key,
    class.code.clone(),
    class.section.clone(),
    plan.semester,
  );
  Ok((key, Change {
    detail,
    date,
    date_key,
    course_key: course.key,
    status_key,
    action: DetailAction::parse(detail.action.as_deref()),
    credits: class.credits,
  }))
}
