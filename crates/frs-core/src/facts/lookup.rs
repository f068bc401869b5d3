//! Key resolution for fact assembly.
//!
//! [`DimensionIndex`] maps natural keys to warehouse surrogate keys;
//! [`SourceIndex`] pre-joins the operational tables the assemblers share.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{
  Error, Result,
  dimension::{
    Advisor, CalendarDay, ChangeStatus, CourseOffering, Keyed, Student, Version,
  },
  normalize,
  source::{DetailAction, SourceSnapshot, StudyPlan},
  store::Warehouse,
};

// ─── Dimension keys ──────────────────────────────────────────────────────────

type CourseHistory = Vec<Keyed<Version<CourseOffering>>>;

/// Natural key to surrogate key, for every dimension a fact references.
///
/// Where a dimension holds a natural key more than once, the lowest surrogate
/// key wins.
#[derive(Debug, Clone, Default)]
pub struct DimensionIndex {
  students: HashMap<String, i64>,
  advisors: HashMap<String, i64>,
  statuses: HashMap<String, i64>,
  calendar: HashMap<NaiveDate, i64>,
  courses:  HashMap<(String, String), CourseHistory>,
}

fn lowest_key<K: std::hash::Hash + Eq>(
  rows: impl IntoIterator<Item = (K, i64)>,
) -> HashMap<K, i64> {
  let mut map = HashMap::new();
  for (natural, key) in rows {
    map
      .entry(natural)
      .and_modify(|current: &mut i64| *current = (*current).min(key))
      .or_insert(key);
  }
  map
}

impl DimensionIndex {
  pub fn new(
    students: &[Keyed<Student>],
    advisors: &[Keyed<Advisor>],
    statuses: &[Keyed<ChangeStatus>],
    calendar: &[Keyed<CalendarDay>],
    courses: CourseHistory,
  ) -> Self {
    let mut by_offering: HashMap<(String, String), CourseHistory> = HashMap::new();
    for version in courses {
      by_offering
        .entry((version.row.row.code.clone(), version.row.row.section.clone()))
        .or_default()
        .push(version);
    }
    for history in by_offering.values_mut() {
      history.sort_by_key(|v| (v.row.effective_date, v.key));
    }

    Self {
      students: lowest_key(students.iter().map(|s| (s.row.nrp.clone(), s.key))),
      advisors: lowest_key(advisors.iter().map(|a| (a.row.email.clone(), a.key))),
      statuses: lowest_key(
        statuses
          .iter()
          .map(|s| (s.row.status.trim().to_uppercase(), s.key)),
      ),
      calendar: lowest_key(calendar.iter().map(|d| (d.row.date, d.key))),
      courses:  by_offering,
    }
  }

  /// Read every dimension the facts reference.
  pub async fn load<W: Warehouse>(warehouse: &W) -> Result<Self> {
    let students = warehouse.students().await.map_err(Error::warehouse_failure)?;
    let advisors = warehouse.advisors().await.map_err(Error::warehouse_failure)?;
    let statuses = warehouse
      .change_statuses()
      .await
      .map_err(Error::warehouse_failure)?;
    let calendar = warehouse.calendar().await.map_err(Error::warehouse_failure)?;
    let courses = warehouse
      .course_versions()
      .await
      .map_err(Error::warehouse_failure)?;
    Ok(Self::new(&students, &advisors, &statuses, &calendar, courses))
  }

  pub fn student(&self, nrp: &str) -> Option<i64> {
    self.students.get(nrp.trim()).copied()
  }

  pub fn advisor(&self, email: &str) -> Option<i64> {
    self.advisors.get(email).copied()
  }

  /// Case-insensitive status lookup.
  pub fn status(&self, status: &str) -> Option<i64> {
    self.statuses.get(&status.trim().to_uppercase()).copied()
  }

  pub fn date(&self, date: NaiveDate) -> Option<i64> {
    self.calendar.get(&date).copied()
  }

  /// The version of an offering that was in effect on `date`.
  ///
  /// An event older than every version resolves to the first version; one
  /// that falls in a gap of the history resolves to the latest version that
  /// took effect before it.
  pub fn course_as_of(
    &self,
    code: &str,
    section: &str,
    date: NaiveDate,
  ) -> Option<&Keyed<Version<CourseOffering>>> {
    let history = self.courses.get(&(code.to_string(), section.to_string()))?;
    history
      .iter()
      .rev()
      .find(|v| v.row.covers(date))
      .or_else(|| {
        history
          .iter()
          .rev()
          .find(|v| v.row.effective_date <= date)
      })
      .or_else(|| history.first())
  }
}

// ─── Source joins ────────────────────────────────────────────────────────────

/// A class joined to its course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
  pub code:    String,
  pub section: String,
  /// The course's credit count; 0 when the course is unknown or has none.
  pub credits: i64,
}

/// Operational joins shared by the fact assemblers.
#[derive(Debug, Clone)]
pub struct SourceIndex<'a> {
  plans:          HashMap<i64, &'a StudyPlan>,
  classes:        HashMap<i64, ClassInfo>,
  advisor_emails: HashMap<String, String>,
  plan_credits:   HashMap<i64, i64>,
}

impl<'a> SourceIndex<'a> {
  pub fn new(snapshot: &'a SourceSnapshot) -> Self {
    let plans = snapshot.study_plans.iter().map(|p| (p.id, p)).collect();

    let credits: HashMap<&str, i64> = snapshot
      .courses
      .iter()
      .map(|c| (c.code.trim(), c.credits.unwrap_or(0)))
      .collect();
    let classes: HashMap<i64, ClassInfo> = snapshot
      .classes
      .iter()
      .filter_map(|class| {
        let code = class.course_code.trim();
        let section = normalize::section(class.section.as_deref())?;
        Some((class.id, ClassInfo {
          code: code.to_string(),
          section,
          credits: credits.get(code).copied().unwrap_or(0),
        }))
      })
      .collect();

    let advisor_by_id: HashMap<i64, String> = snapshot
      .advisors
      .iter()
      .filter_map(|a| Some((a.id, normalize::email(a.email.as_deref())?)))
      .collect();
    let mut students: Vec<_> = snapshot.students.iter().collect();
    students.sort_by_key(|s| s.id);
    let mut advisor_emails = HashMap::new();
    for student in students {
      let Some(email) = student.advisor_id.and_then(|id| advisor_by_id.get(&id))
      else {
        continue;
      };
      advisor_emails
        .entry(student.nrp.trim().to_string())
        .or_insert_with(|| email.clone());
    }

    let mut plan_credits: HashMap<i64, i64> = HashMap::new();
    for detail in &snapshot.details {
      if DetailAction::parse(detail.action.as_deref()) != DetailAction::Add {
        continue;
      }
      if let Some(class) = classes.get(&detail.class_id) {
        *plan_credits.entry(detail.study_plan_id).or_default() += class.credits;
      }
    }

    Self { plans, classes, advisor_emails, plan_credits }
  }

  pub fn plan(&self, id: i64) -> Option<&'a StudyPlan> {
    self.plans.get(&id).copied()
  }

  pub fn class(&self, id: i64) -> Option<&ClassInfo> { self.classes.get(&id) }

  /// The normalized email of the student's advisor.
  pub fn advisor_email(&self, nrp: &str) -> Option<&str> {
    self.advisor_emails.get(nrp.trim()).map(String::as_str)
  }

  /// Credits over the plan's ADD details.
  pub fn plan_credits(&self, plan_id: i64) -> i64 {
    self.plan_credits.get(&plan_id).copied().unwrap_or(0)
  }
}
