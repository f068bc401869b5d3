use chrono::NaiveDate;

use super::{Assemble, Assembly, FactContext, elapsed_days, required_timestamp};
use crate::{
  fact::CancellationFact,
  rejection::Rejection,
  source::CancellationRecord,
  watermark,
};

impl Assemble for CancellationFact {
  /// One row per `pembatalan_frs` entry. Verification is dated by the plan's
  /// approval; the watermark applies to the submission date.
  fn assemble(ctx: &FactContext<'_>, mark: Option<NaiveDate>) -> Assembly<Self> {
    let mut records: Vec<&CancellationRecord> =
      ctx.snapshot.cancellations.iter().collect();
    records.sort_by_key(|c| c.id);

    let mut out = Assembly::default();
    for record in records {
      match cancellation(ctx, record, mark) {
        Ok(Some(row)) => out.rows.push(row),
        Ok(None) => out.below_watermark += 1,
        Err(reason) => out.rejected.record(reason),
      }
    }
    out
  }
}

fn cancellation(
  ctx: &FactContext<'_>,
  record: &CancellationRecord,
  mark: Option<NaiveDate>,
) -> Result<Option<CancellationFact>, Rejection> {
  let plan = ctx
    .source
    .plan(record.study_plan_id)
    .ok_or(Rejection::MissingStudyPlan)?;
  let submitted = required_timestamp(record.submitted_at.as_deref())?;
  let verified = required_timestamp(plan.approved_at.as_deref())?;
  if !watermark::admits(mark, submitted.date()) {
    return Ok(None);
  }
  let student_key = ctx
    .dims
    .student(&plan.nrp)
    .ok_or(Rejection::MissingStudent)?;
  let submitted_date_key = ctx
    .dims
    .date(submitted.date())
    .ok_or(Rejection::MissingCalendarDate)?;
  let verified_date_key = ctx
    .dims
    .date(verified.date())
    .ok_or(Rejection::MissingCalendarDate)?;

  Ok(Some(CancellationFact {
    student_key,
    submitted_date_key,
    verified_date_key,
    gpa_to_date: ctx.grades.gpa_before(&plan.nrp, plan.semester),
    verification_days: elapsed_days(Some(submitted), Some(verified)),
  }))
}
