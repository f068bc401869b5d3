//! Operational (source-system) records, as read by an
//! [`OperationalSource`](crate::store::OperationalSource).
//!
//! Timestamp columns are carried as the raw text the source holds. They are
//! parsed by [`parse_timestamp`] at the point of use, so a malformed value
//! rejects only the row that needs it.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, store::OperationalSource};

// ─── Reference data ──────────────────────────────────────────────────────────

/// A row of `jurusan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
  pub id:   i64,
  pub name: Option<String>,
}

/// A row of `dosen_wali`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRecord {
  pub id:    i64,
  pub name:  Option<String>,
  pub email: Option<String>,
}

/// A row of `mahasiswa`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
  pub id:            i64,
  /// Student number; always handled as text even where the source stores an
  /// integer.
  pub nrp:           String,
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub department_id: Option<i64>,
  pub advisor_id:    Option<i64>,
}

/// A row of `mata_kuliah`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
  pub code:    String,
  pub name:    Option<String>,
  pub credits: Option<i64>,
}

/// A row of `kelas`: one section of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
  pub id:          i64,
  pub course_code: String,
  pub section:     Option<String>,
  pub instructor:  Option<String>,
  pub capacity:    Option<i64>,
}

// ─── Transactional records ───────────────────────────────────────────────────

/// A row of `frs`: a student's study plan for one semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
  pub id:          i64,
  pub nrp:         String,
  pub semester:    i64,
  pub approved_at: Option<String>,
}

/// A row of `detail_frs`: one add or drop of a class on a study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanDetail {
  pub id:            i64,
  pub study_plan_id: i64,
  pub class_id:      i64,
  pub action:        Option<String>,
  pub recorded_at:   Option<String>,
}

/// A row of `log_frs`: one status transition of a study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanLog {
  pub id:            i64,
  pub study_plan_id: i64,
  pub status:        Option<String>,
  pub logged_at:     Option<String>,
}

/// A row of `nilai_mahasiswa`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
  pub id:       i64,
  pub nrp:      String,
  pub semester: i64,
  pub grade:    Option<f64>,
}

/// A row of `pembayaran`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
  pub id:       i64,
  pub nrp:      String,
  pub semester: i64,
  pub paid_at:  Option<String>,
}

/// A row of `pembatalan_frs`: a request to cancel an approved study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRecord {
  pub id:            i64,
  pub study_plan_id: i64,
  pub submitted_at:  Option<String>,
}

// ─── Detail actions ──────────────────────────────────────────────────────────

/// What a [`StudyPlanDetail`] did to the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailAction {
  Add,
  Drop,
  Other,
}

impl DetailAction {
  pub fn parse(raw: Option<&str>) -> Self {
    match raw.map(|s| s.trim().to_uppercase()).as_deref() {
      Some("ADD") => Self::Add,
      Some("DROP") => Self::Drop,
      _ => Self::Other,
    }
  }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

const TIMESTAMP_FORMATS: &[&str] = &[
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M",
];

/// Parse a source timestamp. Accepts a bare date, a date and time separated by
/// a space or `T`, and RFC 3339. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    return date.and_hms_opt(0, 0, 0);
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.naive_local());
  }
  TIMESTAMP_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Every operational table a run needs, read once at the start of the run.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
  pub departments:   Vec<Department>,
  pub advisors:      Vec<AdvisorRecord>,
  pub students:      Vec<StudentRecord>,
  pub courses:       Vec<CourseRecord>,
  pub classes:       Vec<ClassRecord>,
  pub study_plans:   Vec<StudyPlan>,
  pub details:       Vec<StudyPlanDetail>,
  pub logs:          Vec<StudyPlanLog>,
  pub grades:        Vec<GradeRecord>,
  pub payments:      Vec<PaymentRecord>,
  pub cancellations: Vec<CancellationRecord>,
}

impl SourceSnapshot {
  pub async fn extract<S: OperationalSource>(source: &S) -> Result<Self> {
    let snapshot = Self {
      departments:   source.departments().await.map_err(Error::source_failure)?,
      advisors:      source.advisors().await.map_err(Error::source_failure)?,
      students:      source.students().await.map_err(Error::source_failure)?,
      courses:       source.courses().await.map_err(Error::source_failure)?,
      classes:       source.classes().await.map_err(Error::source_failure)?,
      study_plans:   source.study_plans().await.map_err(Error::source_failure)?,
      details:       source
        .study_plan_details()
        .await
        .map_err(Error::source_failure)?,
      logs:          source.study_plan_logs().await.map_err(Error::source_failure)?,
      grades:        source.grades().await.map_err(Error::source_failure)?,
      payments:      source.payments().await.map_err(Error::source_failure)?,
      cancellations: source.cancellations().await.map_err(Error::source_failure)?,
    };

    tracing::debug!(
      students = snapshot.students.len(),
      classes = snapshot.classes.len(),
      study_plans = snapshot.study_plans.len(),
      details = snapshot.details.len(),
      logs = snapshot.logs.len(),
      cancellations = snapshot.cancellations.len(),
      "extracted operational snapshot"
    );

    Ok(snapshot)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Timelike;

  use super::*;

  #[test]
  fn parses_every_supported_shape() {
    let date = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
    for raw in [
      "2024-02-14",
      "2024-02-14 08:30:00",
      "2024-02-14T08:30:00",
      "2024-02-14 08:30:00.125",
      "2024-02-14 08:30",
      "2024-02-14T08:30:00+07:00",
      "  2024-02-14  ",
    ] {
      let parsed = parse_timestamp(raw).unwrap_or_else(|| panic!("{raw}"));
      assert_eq!(parsed.date(), date, "{raw}");
    }
  }

  #[test]
  fn bare_dates_are_midnight() {
    let parsed = parse_timestamp("2024-02-14").unwrap();
    assert_eq!(parsed.hour(), 0);
    assert_eq!(parsed.minute(), 0);
  }

  #[test]
  fn garbage_does_not_parse() {
    assert!(parse_timestamp("").is_none());
    assert!(parse_timestamp("14/02/2024").is_none());
    assert!(parse_timestamp("2024-02-30").is_none());
    assert!(parse_timestamp("yesterday").is_none());
  }

  #[test]
  fn detail_actions_are_case_insensitive() {
    assert_eq!(DetailAction::parse(Some(" add ")), DetailAction::Add);
    assert_eq!(DetailAction::parse(Some("Drop")), DetailAction::Drop);
    assert_eq!(DetailAction::parse(Some("swap")), DetailAction::Other);
    assert_eq!(DetailAction::parse(None), DetailAction::Other);
  }
}
