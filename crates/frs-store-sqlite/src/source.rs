//! [`SqliteSource`]: operational tables read from a SQLite database.

use std::path::Path;

use frs_core::{
  source::{
    AdvisorRecord, CancellationRecord, ClassRecord, CourseRecord, Department,
    GradeRecord, PaymentRecord, StudentRecord, StudyPlan, StudyPlanDetail,
    StudyPlanLog,
  },
  store::OperationalSource,
};

use crate::{
  Error, Result, encode::text_of, query::select_all, schema::OPERATIONAL_SCHEMA,
};

/// Read-only view of the FRS operational database.
#[derive(Clone)]
pub struct SqliteSource {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSource {
  /// Open an existing operational database. The schema is left untouched.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn })
  }

  /// An empty in-memory operational database with every table created,
  /// ready to be filled through [`SqliteSource::execute_batch`].
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let source = Self { conn };
    source.create_schema().await?;
    Ok(source)
  }

  /// Create any missing operational table.
  pub async fn create_schema(&self) -> Result<()> {
    self.execute_batch(OPERATIONAL_SCHEMA).await
  }

  /// Run raw SQL against the source, e.g. to seed fixtures.
  pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// A column that may hold text or a number, read as text. `NULL` becomes the
/// empty string, which conformance treats as a missing natural key.
fn text(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<String> {
  Ok(text_of(row.get_ref(index)?).unwrap_or_default())
}

fn optional_text(
  row: &rusqlite::Row<'_>,
  index: usize,
) -> rusqlite::Result<Option<String>> {
  Ok(text_of(row.get_ref(index)?))
}

impl OperationalSource for SqliteSource {
  type Error = Error;

  async fn departments(&self) -> Result<Vec<Department>> {
    let sql = "SELECT jurusan_id, nama_jurusan FROM jurusan ORDER BY jurusan_id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(Department { id: row.get(0)?, name: optional_text(row, 1)? })
    })
    .await
  }

  async fn advisors(&self) -> Result<Vec<AdvisorRecord>> {
    let sql = "SELECT id, nama, email FROM dosen_wali ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(AdvisorRecord {
        id:    row.get(0)?,
        name:  optional_text(row, 1)?,
        email: optional_text(row, 2)?,
      })
    })
    .await
  }

  async fn students(&self) -> Result<Vec<StudentRecord>> {
    let sql = "SELECT id, nrp, nama, email, jurusan_id, dosen_wali_id
                 FROM mahasiswa ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(StudentRecord {
        id:            row.get(0)?,
        nrp:           text(row, 1)?,
        name:          optional_text(row, 2)?,
        email:         optional_text(row, 3)?,
        department_id: row.get(4)?,
        advisor_id:    row.get(5)?,
      })
    })
    .await
  }

  async fn courses(&self) -> Result<Vec<CourseRecord>> {
    let sql = "SELECT kode_mata_kuliah, nama, sks FROM mata_kuliah
                ORDER BY kode_mata_kuliah";
    select_all(&self.conn, sql.into(), |row| {
      Ok(CourseRecord {
        code:    text(row, 0)?,
        name:    optional_text(row, 1)?,
        credits: row.get(2)?,
      })
    })
    .await
  }

  async fn classes(&self) -> Result<Vec<ClassRecord>> {
    let sql = "SELECT id, kode_mata_kuliah, nama_kelas, dosen, kapasitas
                 FROM kelas ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(ClassRecord {
        id:          row.get(0)?,
        course_code: text(row, 1)?,
        section:     optional_text(row, 2)?,
        instructor:  optional_text(row, 3)?,
        capacity:    row.get(4)?,
      })
    })
    .await
  }

  async fn study_plans(&self) -> Result<Vec<StudyPlan>> {
    let sql = "SELECT id, nrp, semester, tanggal_disetujui FROM frs ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(StudyPlan {
        id:          row.get(0)?,
        nrp:         text(row, 1)?,
        semester:    row.get(2)?,
        approved_at: optional_text(row, 3)?,
      })
    })
    .await
  }

  async fn study_plan_details(&self) -> Result<Vec<StudyPlanDetail>> {
    let sql = "SELECT id, frs_id, kelas_id, action, tanggal
                 FROM detail_frs ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(StudyPlanDetail {
        id:            row.get(0)?,
        study_plan_id: row.get(1)?,
        class_id:      row.get(2)?,
        action:        optional_text(row, 3)?,
        recorded_at:   optional_text(row, 4)?,
      })
    })
    .await
  }

  async fn study_plan_logs(&self) -> Result<Vec<StudyPlanLog>> {
    let sql = "SELECT id, frs_id, status, tanggal FROM log_frs ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(StudyPlanLog {
        id:            row.get(0)?,
        study_plan_id: row.get(1)?,
        status:        optional_text(row, 2)?,
        logged_at:     optional_text(row, 3)?,
      })
    })
    .await
  }

  async fn grades(&self) -> Result<Vec<GradeRecord>> {
    let sql = "SELECT id, nrp, semester, nilai FROM nilai_mahasiswa ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(GradeRecord {
        id:       row.get(0)?,
        nrp:      text(row, 1)?,
        semester: row.get(2)?,
        grade:    row.get(3)?,
      })
    })
    .await
  }

  async fn payments(&self) -> Result<Vec<PaymentRecord>> {
    let sql = "SELECT id, nrp, semester, tanggal_bayar FROM pembayaran ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(PaymentRecord {
        id:       row.get(0)?,
        nrp:      text(row, 1)?,
        semester: row.get(2)?,
        paid_at:  optional_text(row, 3)?,
      })
    })
    .await
  }

  async fn cancellations(&self) -> Result<Vec<CancellationRecord>> {
    let sql = "SELECT id, frs_id, tanggal_pengajuan FROM pembatalan_frs
                ORDER BY id";
    select_all(&self.conn, sql.into(), |row| {
      Ok(CancellationRecord {
        id:            row.get(0)?,
        study_plan_id: row.get(1)?,
        submitted_at:  optional_text(row, 2)?,
      })
    })
    .await
  }
}
