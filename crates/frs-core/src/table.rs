//! The warehouse table catalogue.
//!
//! [`Table`] names every target table and doubles as the job identifier of a
//! run; its declaration order is the dependency order in which jobs execute.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::Error;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
pub enum Table {
  #[serde(rename = "dim_dosen_wali")]
  #[strum(serialize = "dim_dosen_wali")]
  Advisors,
  #[serde(rename = "dim_mahasiswa")]
  #[strum(serialize = "dim_mahasiswa")]
  Students,
  #[serde(rename = "dim_status_perubahan_kelas")]
  #[strum(serialize = "dim_status_perubahan_kelas")]
  ChangeStatuses,
  #[serde(rename = "dim_waktu")]
  #[strum(serialize = "dim_waktu")]
  Calendar,
  #[serde(rename = "dim_mata_kuliah")]
  #[strum(serialize = "dim_mata_kuliah")]
  CourseOfferings,
  #[serde(rename = "fact_pengambilan_kelas")]
  #[strum(serialize = "fact_pengambilan_kelas")]
  Enrollments,
  #[serde(rename = "fact_perubahan_kelas")]
  #[strum(serialize = "fact_perubahan_kelas")]
  ClassChanges,
  #[serde(rename = "fact_persetujuan_frs")]
  #[strum(serialize = "fact_persetujuan_frs")]
  Approvals,
  #[serde(rename = "fact_pembatalan_frs")]
  #[strum(serialize = "fact_pembatalan_frs")]
  Cancellations,
}

impl Table {
  /// The surrogate key column.
  pub fn key_column(self) -> &'static str {
    match self {
      Self::Advisors => "dosen_wali_id",
      Self::Students => "mahasiswa_id",
      Self::ChangeStatuses => "status_perubahan_kelas_id",
      Self::Calendar => "waktu_id",
      Self::CourseOfferings => "mata_kuliah_id",
      Self::Enrollments => "pengambilan_kelas_id",
      Self::ClassChanges => "perubahan_kelas_id",
      Self::Approvals => "persetujuan_frs_id",
      Self::Cancellations => "pembatalan_frs_id",
    }
  }

  pub fn fact(self) -> Option<FactTable> {
    match self {
      Self::Enrollments => Some(FactTable::Enrollment),
      Self::ClassChanges => Some(FactTable::ClassChange),
      Self::Approvals => Some(FactTable::Approval),
      Self::Cancellations => Some(FactTable::Cancellation),
      _ => None,
    }
  }

  pub fn is_fact(self) -> bool { self.fact().is_some() }

  /// Parse a table name, reporting unknown names as [`Error::UnknownTable`].
  pub fn parse(name: &str) -> crate::Result<Self> {
    Self::from_str(name.trim()).map_err(|_| Error::UnknownTable(name.into()))
  }
}

// ─── Fact tables ─────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, EnumIter,
)]
pub enum FactTable {
  Enrollment,
  ClassChange,
  Approval,
  Cancellation,
}

impl FactTable {
  pub fn table(self) -> Table {
    match self {
      Self::Enrollment => Table::Enrollments,
      Self::ClassChange => Table::ClassChanges,
      Self::Approval => Table::Approvals,
      Self::Cancellation => Table::Cancellations,
    }
  }

  /// The dimension-key triple no two loaded rows may share, in
  /// [`crate::fact::FactKey`] order.
  pub fn key_columns(self) -> [&'static str; 3] {
    match self {
      Self::Enrollment | Self::ClassChange => {
        ["mahasiswa_id", "mata_kuliah_id", "waktu_id"]
      }
      Self::Approval => {
        ["mahasiswa_id", "dosen_wali_id", "waktu_persetujuan_id"]
      }
      Self::Cancellation => {
        ["mahasiswa_id", "waktu_pengajuan_id", "waktu_verifikasi_id"]
      }
    }
  }

  /// The time-dimension foreign key whose latest date is the table's
  /// watermark.
  pub fn watermark_column(self) -> &'static str {
    match self {
      Self::Enrollment | Self::ClassChange => "waktu_id",
      Self::Approval => "waktu_persetujuan_id",
      Self::Cancellation => "waktu_pengajuan_id",
    }
  }

  /// Whether incremental runs bound candidate extraction by the watermark.
  /// The other fact tables rely on the anti-join alone.
  pub fn is_watermark_bounded(self) -> bool {
    matches!(self, Self::Approval | Self::Cancellation)
  }
}

impl TryFrom<Table> for FactTable {
  type Error = Error;

  fn try_from(table: Table) -> crate::Result<Self> {
    table.fact().ok_or(Error::NotAFactTable(table))
  }
}

impl FromStr for FactTable {
  type Err = Error;

  fn from_str(s: &str) -> crate::Result<Self> { Table::parse(s)?.try_into() }
}

impl std::fmt::Display for FactTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.table().fmt(f)
  }
}
