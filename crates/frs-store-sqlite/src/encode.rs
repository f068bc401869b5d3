//! Encoding and decoding helpers between domain rows and SQLite columns.
//!
//! Dates are stored as `YYYY-MM-DD` text and flags as 0/1 integers. Writes
//! go through [`EncodedBatch`], which pairs a table's column list with one
//! value vector per row, so a single insert path serves every table.

use std::str::FromStr;

use chrono::NaiveDate;
use frs_core::{
  Table,
  dimension::{
    AcademicTerm, Advisor, CalendarDay, ChangeStatus, CourseOffering,
    CurrentFlag, Keyed, Student, Version,
  },
  fact::{ApprovalFact, CancellationFact, ClassChangeFact, EnrollmentFact},
  store::TargetBatch,
};
use rusqlite::types::{Value, ValueRef};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

/// Read a column as text whatever its storage class. Operational tables hold
/// `nrp` as either text or integer, and timestamps as whatever the source
/// application wrote.
pub fn text_of(value: ValueRef<'_>) -> Option<String> {
  match value {
    ValueRef::Null => None,
    ValueRef::Integer(i) => Some(i.to_string()),
    ValueRef::Real(f) => Some(f.to_string()),
    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
      Some(String::from_utf8_lossy(bytes).into_owned())
    }
  }
}

/// Render a stored column for a conflict report.
pub fn json_of(value: ValueRef<'_>) -> serde_json::Value {
  match value {
    ValueRef::Null => serde_json::Value::Null,
    ValueRef::Integer(i) => i.into(),
    ValueRef::Real(f) => f.into(),
    ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
    ValueRef::Blob(bytes) => format!("<{} bytes>", bytes.len()).into(),
  }
}

// ─── Column lists ────────────────────────────────────────────────────────────
//
// The surrogate key is always the first column.

pub const ADVISOR_COLUMNS: &[&str] = &["dosen_wali_id", "nama", "email"];

pub const STUDENT_COLUMNS: &[&str] = &[
  "mahasiswa_id",
  "nrp",
  "nama",
  "email",
  "nama_jurusan",
  "nama_dosen_wali",
];

pub const STATUS_COLUMNS: &[&str] = &["status_perubahan_kelas_id", "status"];

pub const CALENDAR_COLUMNS: &[&str] = &[
  "waktu_id",
  "tanggal",
  "hari",
  "bulan",
  "tahun",
  "semester_akademik",
];

pub const COURSE_COLUMNS: &[&str] = &[
  "mata_kuliah_id",
  "kode_mata_kuliah",
  "nama",
  "sks",
  "nama_kelas",
  "dosen",
  "kapasitas",
  "row_effective_date",
  "row_expiration_date",
  "current_row_flag",
];

const ENROLLMENT_COLUMNS: &[&str] = &[
  "pengambilan_kelas_id",
  "mahasiswa_id",
  "mata_kuliah_id",
  "waktu_id",
  "sks_diambil",
  "ipk_terakhir",
  "sudah_bayar_flag",
  "is_drop",
];

const CLASS_CHANGE_COLUMNS: &[&str] = &[
  "perubahan_kelas_id",
  "mata_kuliah_id",
  "mahasiswa_id",
  "status_perubahan_kelas_id",
  "waktu_id",
  "jumlah_drop",
  "jumlah_add",
  "sks_setelah_perubahan",
];

const APPROVAL_COLUMNS: &[&str] = &[
  "persetujuan_frs_id",
  "mahasiswa_id",
  "dosen_wali_id",
  "waktu_persetujuan_id",
  "is_frs_disetujui",
  "jumlah_sks",
  "ipk_terakhir",
];

const CANCELLATION_COLUMNS: &[&str] = &[
  "pembatalan_frs_id",
  "mahasiswa_id",
  "waktu_pengajuan_id",
  "waktu_verifikasi_id",
  "ipk_terakhir",
  "lama_verifikasi_pembatalan",
];

// ─── Encoded batches ─────────────────────────────────────────────────────────

/// One row ready to bind, in its table's column order (key first).
#[derive(Debug, Clone)]
pub struct EncodedRow {
  pub key:    i64,
  pub values: Vec<Value>,
}

impl EncodedRow {
  pub fn new(key: i64, rest: impl IntoIterator<Item = Value>) -> Self {
    let values = std::iter::once(Value::Integer(key)).chain(rest).collect();
    Self { key, values }
  }

  /// The row as a `{column: value}` object.
  pub fn to_json(&self, columns: &[&str]) -> serde_json::Value {
    let object = columns
      .iter()
      .zip(&self.values)
      .map(|(column, value)| {
        ((*column).to_owned(), json_of(ValueRef::from(value)))
      })
      .collect();
    serde_json::Value::Object(object)
  }
}

#[derive(Debug, Clone)]
pub struct EncodedBatch {
  pub table:   Table,
  pub columns: &'static [&'static str],
  pub rows:    Vec<EncodedRow>,
}

impl EncodedBatch {
  pub fn first_key(&self) -> Option<i64> {
    self.rows.iter().map(|r| r.key).min()
  }

  pub fn insert_sql(&self) -> String {
    let placeholders = (1..=self.columns.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    format!(
      "INSERT INTO {} ({}) VALUES ({placeholders})",
      self.table,
      self.columns.join(", ")
    )
  }
}

fn batch<T>(
  table: Table,
  columns: &'static [&'static str],
  rows: Vec<Keyed<T>>,
  encode: impl Fn(T) -> Vec<Value>,
) -> EncodedBatch {
  let rows = rows
    .into_iter()
    .map(|Keyed { key, row }| EncodedRow::new(key, encode(row)))
    .collect();
  EncodedBatch { table, columns, rows }
}

pub fn encode_batch(target: TargetBatch) -> EncodedBatch {
  let table = target.table();
  match target {
    TargetBatch::Advisors(rows) => {
      batch(table, ADVISOR_COLUMNS, rows, encode_advisor)
    }
    TargetBatch::Students(rows) => {
      batch(table, STUDENT_COLUMNS, rows, encode_student)
    }
    TargetBatch::ChangeStatuses(rows) => {
      batch(table, STATUS_COLUMNS, rows, |s: ChangeStatus| {
        vec![s.status.into()]
      })
    }
    TargetBatch::Calendar(rows) => {
      batch(table, CALENDAR_COLUMNS, rows, |d: CalendarDay| {
        vec![
          encode_date(d.date).into(),
          d.day_name.into(),
          d.month_name.into(),
          i64::from(d.year).into(),
          d.term.to_string().into(),
        ]
      })
    }
    TargetBatch::Enrollments(rows) => {
      batch(table, ENROLLMENT_COLUMNS, rows, |f: EnrollmentFact| {
        vec![
          f.student_key.into(),
          f.course_key.into(),
          f.date_key.into(),
          f.credits.into(),
          f.gpa_to_date.into(),
          f.has_paid.into(),
          f.is_drop.into(),
        ]
      })
    }
    TargetBatch::ClassChanges(rows) => {
      batch(table, CLASS_CHANGE_COLUMNS, rows, |f: ClassChangeFact| {
        vec![
          f.course_key.into(),
          f.student_key.into(),
          f.status_key.into(),
          f.date_key.into(),
          f.drop_count.into(),
          f.add_count.into(),
          f.credits_after_change.into(),
        ]
      })
    }
    TargetBatch::Approvals(rows) => {
      batch(table, APPROVAL_COLUMNS, rows, |f: ApprovalFact| {
        vec![
          f.student_key.into(),
          f.advisor_key.into(),
          f.approval_date_key.into(),
          f.is_approved.into(),
          f.total_credits.into(),
          f.gpa_to_date.into(),
        ]
      })
    }
    TargetBatch::Cancellations(rows) => {
      batch(table, CANCELLATION_COLUMNS, rows, |f: CancellationFact| {
        vec![
          f.student_key.into(),
          f.submitted_date_key.into(),
          f.verified_date_key.into(),
          f.gpa_to_date.into(),
          f.verification_days.into(),
        ]
      })
    }
  }
}

pub fn encode_course_versions(
  rows: Vec<Keyed<Version<CourseOffering>>>,
) -> EncodedBatch {
  batch(
    Table::CourseOfferings,
    COURSE_COLUMNS,
    rows,
    |v: Version<CourseOffering>| {
      vec![
        v.row.code.into(),
        v.row.name.into(),
        v.row.credits.into(),
        v.row.section.into(),
        v.row.instructor.into(),
        v.row.capacity.into(),
        encode_date(v.effective_date).into(),
        encode_date(v.expiration_date).into(),
        v.flag.to_string().into(),
      ]
    },
  )
}

/// Non-key columns of a student, in [`STUDENT_COLUMNS`] order.
pub fn encode_student(s: Student) -> Vec<Value> {
  vec![
    s.nrp.into(),
    s.name.into(),
    s.email.into(),
    s.department.into(),
    s.advisor_name.into(),
  ]
}

/// Non-key columns of an advisor, in [`ADVISOR_COLUMNS`] order.
pub fn encode_advisor(a: Advisor) -> Vec<Value> {
  vec![a.name.into(), a.email.into()]
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `dim_waktu` row with its text columns not yet parsed.
pub struct RawCalendarDay {
  pub key:        i64,
  pub date:       String,
  pub day_name:   String,
  pub month_name: String,
  pub year:       i32,
  pub term:       String,
}

impl RawCalendarDay {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      key:        row.get(0)?,
      date:       row.get(1)?,
      day_name:   row.get(2)?,
      month_name: row.get(3)?,
      year:       row.get(4)?,
      term:       row.get(5)?,
    })
  }

  pub fn into_day(self) -> Result<Keyed<CalendarDay>> {
    let term = AcademicTerm::from_str(&self.term)
      .map_err(|_| Error::Decode(format!("academic term {:?}", self.term)))?;
    Ok(Keyed {
      key: self.key,
      row: CalendarDay {
        date: decode_date(&self.date)?,
        day_name: self.day_name,
        month_name: self.month_name,
        year: self.year,
        term,
      },
    })
  }
}

/// A `dim_mata_kuliah` row with its dates and flag not yet parsed.
pub struct RawCourseVersion {
  pub key:             i64,
  pub code:            String,
  pub name:            Option<String>,
  pub credits:         Option<i64>,
  pub section:         String,
  pub instructor:      Option<String>,
  pub capacity:        Option<i64>,
  pub effective_date:  String,
  pub expiration_date: String,
  pub flag:            String,
}

impl RawCourseVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      key:             row.get(0)?,
      code:            row.get(1)?,
      name:            row.get(2)?,
      credits:         row.get(3)?,
      section:         row.get(4)?,
      instructor:      row.get(5)?,
      capacity:        row.get(6)?,
      effective_date:  row.get(7)?,
      expiration_date: row.get(8)?,
      flag:            row.get(9)?,
    })
  }

  pub fn into_version(self) -> Result<Keyed<Version<CourseOffering>>> {
    let flag = CurrentFlag::from_str(&self.flag)
      .map_err(|_| Error::Decode(format!("current_row_flag {:?}", self.flag)))?;
    Ok(Keyed {
      key: self.key,
      row: Version {
        row: CourseOffering {
          code:       self.code,
          name:       self.name,
          credits:    self.credits,
          section:    self.section,
          instructor: self.instructor,
          capacity:   self.capacity,
        },
        effective_date: decode_date(&self.effective_date)?,
        expiration_date: decode_date(&self.expiration_date)?,
        flag,
      },
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_are_iso_text() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    assert_eq!(encode_date(date), "2024-03-05");
    assert_eq!(decode_date("2024-03-05").unwrap(), date);
    assert!(decode_date("05/03/2024").is_err());
  }

  #[test]
  fn integer_and_text_columns_read_as_text() {
    assert_eq!(text_of(ValueRef::Integer(5025)).as_deref(), Some("5025"));
    assert_eq!(text_of(ValueRef::Text(b"5025")).as_deref(), Some("5025"));
    assert_eq!(text_of(ValueRef::Null), None);
  }

  #[test]
  fn insert_sql_binds_every_column() {
    let encoded = encode_batch(TargetBatch::ChangeStatuses(vec![Keyed {
      key: 4,
      row: ChangeStatus { status: "Add".into() },
    }]));
    assert_eq!(
      encoded.insert_sql(),
      "INSERT INTO dim_status_perubahan_kelas (status_perubahan_kelas_id, \
       status) VALUES (?1, ?2)"
    );
    assert_eq!(encoded.first_key(), Some(4));
    assert_eq!(
      encoded.rows[0].to_json(encoded.columns),
      serde_json::json!({ "status_perubahan_kelas_id": 4, "status": "Add" })
    );
  }
}
