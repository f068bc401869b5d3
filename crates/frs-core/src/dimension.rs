//! Dimension row types.
//!
//! Rows are plain attribute structs; the warehouse surrogate key is attached
//! by wrapping them in [`Keyed`] once a key block has been allocated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ─── Keyed ───────────────────────────────────────────────────────────────────

/// A row paired with its warehouse surrogate key. Keys are never reused or
/// changed once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyed<T> {
  pub key: i64,
  #[serde(flatten)]
  pub row: T,
}

// ─── Type 1 dimensions ───────────────────────────────────────────────────────

/// A row of `dim_mahasiswa`, keyed by `nrp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub nrp:          String,
  pub name:         Option<String>,
  pub email:        String,
  pub department:   Option<String>,
  pub advisor_name: Option<String>,
}

/// A row of `dim_dosen_wali`, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisor {
  pub name:  Option<String>,
  pub email: String,
}

/// A row of `dim_status_perubahan_kelas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
  pub status: String,
}

/// Half of the academic year a date falls in.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum AcademicTerm {
  /// January through June.
  Genap,
  /// July through December.
  Ganjil,
}

/// A row of `dim_waktu`: exactly one per calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
  pub date:       NaiveDate,
  pub day_name:   String,
  pub month_name: String,
  pub year:       i32,
  pub term:       AcademicTerm,
}

// ─── Type 2 dimension ────────────────────────────────────────────────────────

/// One section of a course as offered, keyed by `(code, section)`.
///
/// Instructor and capacity are versioned; the other attributes ride along
/// with whichever version is current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOffering {
  pub code:       String,
  pub name:       Option<String>,
  pub credits:    Option<i64>,
  pub section:    String,
  pub instructor: Option<String>,
  pub capacity:   Option<i64>,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum CurrentFlag {
  Current,
  Expired,
}

/// A dated version of a Type 2 dimension row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version<T> {
  #[serde(flatten)]
  pub row:             T,
  pub effective_date:  NaiveDate,
  /// [`open_ended`] while the version is current.
  pub expiration_date: NaiveDate,
  pub flag:            CurrentFlag,
}

impl<T> Version<T> {
  /// A fresh current version starting on `today`.
  pub fn current(row: T, today: NaiveDate) -> Self {
    Self {
      row,
      effective_date: today,
      expiration_date: open_ended(),
      flag: CurrentFlag::Current,
    }
  }

  pub fn is_current(&self) -> bool { self.flag == CurrentFlag::Current }

  /// Whether the half-open interval `[effective, expiration)` contains `date`.
  pub fn covers(&self, date: NaiveDate) -> bool {
    self.effective_date <= date && date < self.expiration_date
  }
}

/// The expiration date of a current version: the largest date the warehouse
/// stores.
pub fn open_ended() -> NaiveDate {
  NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}
