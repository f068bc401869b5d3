use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::{Assemble, Assembly, FactContext, required_timestamp};
use crate::{
  fact::ApprovalFact,
  rejection::Rejection,
  source::{StudyPlan, StudyPlanLog},
  watermark,
};

/// A study plan's state as recorded in `log_frs`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
)]
pub enum ApprovalStatus {
  #[strum(serialize = "DISETUJUI")]
  Approved,
  #[strum(serialize = "DITOLAK")]
  Rejected,
  /// Submitted, under review, or anything else not final.
  Pending,
}

impl ApprovalStatus {
  pub fn parse(raw: Option<&str>) -> Self {
    match raw.map(|s| s.trim().to_uppercase()).as_deref() {
      Some("DISETUJUI") => Self::Approved,
      Some("DITOLAK") => Self::Rejected,
      _ => Self::Pending,
    }
  }
}

impl Assemble for ApprovalFact {
  /// One row per study plan, from its chronologically last log entry. The
  /// watermark applies to that entry's date.
  fn assemble(ctx: &FactContext<'_>, mark: Option<NaiveDate>) -> Assembly<Self> {
    let mut out = Assembly::default();

    let mut latest: BTreeMap<i64, (NaiveDateTime, &StudyPlanLog)> = BTreeMap::new();
    for log in &ctx.snapshot.logs {
      let at = match required_timestamp(log.logged_at.as_deref()) {
        Ok(at) => at,
        Err(reason) => {
          out.rejected.record(reason);
          continue;
        }
      };
      latest
        .entry(log.study_plan_id)
        .and_modify(|current| {
          if (at, log.id) > (current.0, current.1.id) {
            *current = (at, log);
          }
        })
        .or_insert((at, log));
    }

    for (plan_id, (at, log)) in latest {
      let Some(plan) = ctx.source.plan(plan_id) else {
        out.rejected.record(Rejection::MissingStudyPlan);
        continue;
      };
      if !watermark::admits(mark, at.date()) {
        out.below_watermark += 1;
        continue;
      }
      match approval(ctx, plan, log, at.date()) {
        Ok(row) => out.rows.push(row),
        Err(reason) => out.rejected.record(reason),
      }
    }
    out
  }
}

fn approval(
  ctx: &FactContext<'_>,
  plan: &StudyPlan,
  log: &StudyPlanLog,
  date: NaiveDate,
) -> Result<ApprovalFact, Rejection> {
  let student_key = ctx
    .dims
    .student(&plan.nrp)
    .ok_or(Rejection::MissingStudent)?;
  let advisor_key = ctx
    .source
    .advisor_email(&plan.nrp)
    .and_then(|email| ctx.dims.advisor(email))
    .ok_or(Rejection::MissingAdvisor)?;
  let approval_date_key =
    ctx.dims.date(date).ok_or(Rejection::MissingCalendarDate)?;

  Ok(ApprovalFact {
    student_key,
    advisor_key,
    approval_date_key,
    is_approved: ApprovalStatus::parse(log.status.as_deref())
      == ApprovalStatus::Approved,
    total_credits: ctx.source.plan_credits(plan.id),
    gpa_to_date: ctx.grades.gpa_before(&plan.nrp, plan.semester),
  })
}
