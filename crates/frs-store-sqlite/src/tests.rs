//! Integration tests for `SqliteWarehouse` and `SqliteSource` against
//! in-memory databases.

use chrono::NaiveDate;
use frs_core::{
  FactTable, Table,
  dimension::{
    Advisor, CourseOffering, CurrentFlag, Keyed, Student, Version, open_ended,
  },
  pipeline::{self, EtlContext, JobOutcome, LoadMode, RunOptions, RunReport},
  scd2,
  store::{OperationalSource, TargetBatch, VersionChangeset, Warehouse},
  watermark,
};

use crate::{Error, SqliteSource, SqliteWarehouse};

const SEED: &str = "
INSERT INTO jurusan VALUES (1, 'teknik informatika');
INSERT INTO dosen_wali VALUES (1, 'dr budi', ' BUDI@its.ac.id ');
INSERT INTO mahasiswa VALUES (1, 5025, 'ani', 'ani@its.ac.id', 1, 1);
INSERT INTO mata_kuliah VALUES ('CS101', 'algoritma', 3), ('CS102', 'struktur data', 4);
INSERT INTO kelas VALUES (1, 'CS101', 'A', 'Smith', 30), (2, 'CS102', 'a', 'Jones', 40);
INSERT INTO frs VALUES (100, '5025', 3, '2024-03-05 10:00:00');
INSERT INTO detail_frs VALUES
  (1, 100, 1, 'ADD',  '2024-03-01 09:00:00'),
  (2, 100, 2, 'ADD',  '2024-03-01 09:05:00'),
  (3, 100, 2, 'DROP', '2024-03-02 11:00:00');
INSERT INTO log_frs VALUES
  (1, 100, 'DIAJUKAN',  '2024-03-01 12:00:00'),
  (2, 100, 'DISETUJUI', '2024-03-05 10:00:00');
INSERT INTO nilai_mahasiswa VALUES (1, '5025', 1, 3.0), (2, '5025', 2, 3.5);
INSERT INTO pembayaran VALUES (1, '5025', 3, '2024-02-20');
INSERT INTO pembatalan_frs VALUES (1, 100, '2024-03-02 08:00:00');
";

fn date(m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

async fn source() -> SqliteSource {
  let source = SqliteSource::open_in_memory()
    .await
    .expect("in-memory source");
  source.execute_batch(SEED).await.expect("seed");
  source
}

async fn warehouse() -> SqliteWarehouse {
  SqliteWarehouse::open_in_memory()
    .await
    .expect("in-memory warehouse")
}

async fn run(
  source: &SqliteSource,
  warehouse: &SqliteWarehouse,
  options: RunOptions,
) -> RunReport {
  EtlContext::new(source.clone(), warehouse.clone(), options)
    .run()
    .await
    .expect("run")
}

fn options(mode: LoadMode, today: NaiveDate) -> RunOptions {
  RunOptions::new(mode, today)
}

// ─── Source ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn integer_nrp_reads_as_text() {
  let s = source().await;
  let students = s.students().await.unwrap();
  assert_eq!(students.len(), 1);
  assert_eq!(students[0].nrp, "5025");
  assert_eq!(students[0].advisor_id, Some(1));
}

#[tokio::test]
async fn timestamps_are_passed_through_raw() {
  let s = source().await;
  let payments = s.payments().await.unwrap();
  assert_eq!(payments[0].paid_at.as_deref(), Some("2024-02-20"));
  let plans = s.study_plans().await.unwrap();
  assert_eq!(plans[0].approved_at.as_deref(), Some("2024-03-05 10:00:00"));
}

// ─── Full runs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_run_loads_every_table() {
  let (s, w) = (source().await, warehouse().await);
  let report = run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;

  let inserted = |table| report.job(table).map(|j| j.inserted).unwrap();
  assert_eq!(inserted(Table::Advisors), 1);
  assert_eq!(inserted(Table::Students), 1);
  assert_eq!(inserted(Table::ChangeStatuses), 2);
  assert_eq!(inserted(Table::Calendar), 4);
  assert_eq!(inserted(Table::CourseOfferings), 2);
  // The ADD and DROP of CS102 fold into one row.
  assert_eq!(inserted(Table::Enrollments), 2);
  assert_eq!(report.job(Table::Enrollments).unwrap().duplicates, 0);
  assert_eq!(inserted(Table::ClassChanges), 2);
  assert_eq!(inserted(Table::Approvals), 1);
  assert_eq!(inserted(Table::Cancellations), 1);
  assert!(report.rejected().is_empty());

  let advisors = w.advisors().await.unwrap();
  assert_eq!(advisors, vec![Keyed {
    key: 1,
    row: Advisor {
      name:  Some("Dr. Budi".into()),
      email: "budi@its.ac.id".into(),
    },
  }]);
  let students = w.students().await.unwrap();
  assert_eq!(students[0].row.department.as_deref(), Some("Teknik Informatika"));
  assert_eq!(students[0].row.advisor_name.as_deref(), Some("Dr. Budi"));
}

#[tokio::test]
async fn a_dropped_class_loads_as_a_drop() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Historical, date(3, 10))).await;

  let cs101: i64 = w
    .scalar("SELECT is_drop FROM fact_pengambilan_kelas WHERE mata_kuliah_id = 1")
    .await
    .unwrap();
  let cs102: i64 = w
    .scalar("SELECT is_drop FROM fact_pengambilan_kelas WHERE mata_kuliah_id = 2")
    .await
    .unwrap();
  assert_eq!((cs101, cs102), (0, 1));
}

#[tokio::test]
async fn calendar_keys_are_contiguous_and_dates_ascend() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;

  let calendar = w.calendar().await.unwrap();
  let keys: Vec<i64> = calendar.iter().map(|d| d.key).collect();
  let dates: Vec<NaiveDate> = calendar.iter().map(|d| d.row.date).collect();
  assert_eq!(keys, vec![1, 2, 3, 4]);
  assert_eq!(dates, vec![date(2, 20), date(3, 1), date(3, 2), date(3, 5)]);
  assert_eq!(calendar[0].row.day_name, "Tuesday");
  assert_eq!(calendar[0].row.month_name, "February");
}

#[tokio::test]
async fn rerunning_is_idempotent() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Historical, date(3, 10))).await;
  let second = run(&s, &w, options(LoadMode::Historical, date(3, 11))).await;
  let third = run(&s, &w, options(LoadMode::Incremental, date(3, 12))).await;

  for report in [&second, &third] {
    assert_eq!(report.inserted(), 0);
    for job in &report.jobs {
      assert_eq!(job.outcome, JobOutcome::EmptyIncrement, "{}", job.table);
    }
  }
  assert_eq!(
    second.job(Table::Enrollments).unwrap().already_loaded,
    2,
    "every candidate is recognised"
  );
  assert!(pipeline::verify(&w).await.unwrap().is_clean());
  assert_eq!(w.count(Table::Enrollments).await.unwrap(), 2);
}

#[tokio::test]
async fn rolling_gpa_uses_prior_semesters_only() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;

  let gpa: f64 = w
    .scalar("SELECT ipk_terakhir FROM fact_pembatalan_frs")
    .await
    .unwrap();
  assert_eq!(gpa, 3.25);
  let days: i64 = w
    .scalar("SELECT lama_verifikasi_pembatalan FROM fact_pembatalan_frs")
    .await
    .unwrap();
  assert_eq!(days, 3);
  let paid: i64 = w
    .scalar("SELECT MIN(sudah_bayar_flag) FROM fact_pengambilan_kelas")
    .await
    .unwrap();
  assert_eq!(paid, 1);
}

// ─── Type 1 corrections ──────────────────────────────────────────────────────

#[tokio::test]
async fn changed_students_are_corrected_in_place() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;

  s.execute_batch("UPDATE mahasiswa SET nama = 'ani rahma' WHERE id = 1")
    .await
    .unwrap();
  let report = run(
    &s,
    &w,
    options(LoadMode::Incremental, date(3, 11)).with_jobs([Table::Students]),
  )
  .await;

  let job = report.job(Table::Students).unwrap();
  assert_eq!((job.inserted, job.corrected), (0, 1));
  assert_eq!(report.jobs.len(), 1);
  let students = w.students().await.unwrap();
  assert_eq!(students.len(), 1);
  assert_eq!(students[0].key, 1);
  assert_eq!(students[0].row.name.as_deref(), Some("Ani Rahma"));
}

// ─── SCD2 ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn capacity_change_expires_and_reversions() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;

  s.execute_batch("UPDATE kelas SET kapasitas = 25 WHERE id = 1")
    .await
    .unwrap();
  let report = run(
    &s,
    &w,
    options(LoadMode::Incremental, date(4, 1))
      .with_jobs([Table::CourseOfferings]),
  )
  .await;
  let job = report.job(Table::CourseOfferings).unwrap();
  assert_eq!((job.expired, job.inserted, job.unchanged), (1, 1, 1));

  let versions = w.course_versions().await.unwrap();
  let cs101: Vec<_> = versions
    .iter()
    .filter(|v| v.row.row.code == "CS101")
    .collect();
  assert_eq!(cs101.len(), 2);
  assert_eq!(cs101[0].key, 1);
  assert_eq!(cs101[0].row.flag, CurrentFlag::Expired);
  assert_eq!(cs101[0].row.expiration_date, date(4, 1));
  assert_eq!(cs101[0].row.row.capacity, Some(30));
  assert_eq!(cs101[1].key, 3);
  assert_eq!(cs101[1].row.flag, CurrentFlag::Current);
  assert_eq!(cs101[1].row.effective_date, date(4, 1));
  assert_eq!(cs101[1].row.expiration_date, open_ended());
  assert_eq!(cs101[1].row.row.capacity, Some(25));

  assert!(scd2::verify_timeline(&versions).is_empty());

  // Unchanged source: nothing more happens.
  let again = run(
    &s,
    &w,
    options(LoadMode::Incremental, date(4, 2))
      .with_jobs([Table::CourseOfferings]),
  )
  .await;
  assert_eq!(
    again.job(Table::CourseOfferings).unwrap().outcome,
    JobOutcome::EmptyIncrement
  );
}

#[tokio::test]
async fn facts_before_a_version_change_stay_recognised() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Historical, date(3, 10))).await;
  s.execute_batch("UPDATE kelas SET dosen = 'Wong' WHERE id = 1")
    .await
    .unwrap();
  let report = run(&s, &w, options(LoadMode::Historical, date(4, 1))).await;

  assert_eq!(report.job(Table::CourseOfferings).unwrap().expired, 1);
  assert_eq!(report.job(Table::Enrollments).unwrap().inserted, 0);
  assert_eq!(report.job(Table::ClassChanges).unwrap().inserted, 0);
}

#[tokio::test]
async fn stale_expiry_rolls_back_the_whole_changeset() {
  let w = warehouse().await;
  let offering = CourseOffering {
    code:       "CS101".into(),
    name:       None,
    credits:    Some(3),
    section:    "A".into(),
    instructor: Some("Smith".into()),
    capacity:   Some(30),
  };
  let err = w
    .apply_versions(VersionChangeset {
      expire:    vec![99],
      expire_on: date(4, 1),
      insert:    vec![Keyed {
        key: 1,
        row: Version::current(offering, date(4, 1)),
      }],
    })
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    Error::Core(frs_core::Error::StaleVersion { key: 99, .. })
  ));
  assert_eq!(w.count(Table::CourseOfferings).await.unwrap(), 0);
}

// ─── Append integrity ────────────────────────────────────────────────────────

#[tokio::test]
async fn colliding_append_reports_both_rows_and_writes_nothing() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;

  let err = w
    .append(TargetBatch::Students(vec![
      Keyed {
        key: 1,
        row: Student {
          nrp:          "5026".into(),
          name:         Some("Budi".into()),
          email:        "b@its.ac.id".into(),
          department:   None,
          advisor_name: None,
        },
      },
      Keyed {
        key: 2,
        row: Student {
          nrp:          "5027".into(),
          name:         None,
          email:        "c@its.ac.id".into(),
          department:   None,
          advisor_name: None,
        },
      },
    ]))
    .await
    .unwrap_err();

  let wrapped = frs_core::Error::warehouse_failure(err);
  let report = wrapped.conflict_report().expect("conflict report");
  assert_eq!(report.table, Table::Students);
  assert_eq!(report.current_max, Some(1));
  assert_eq!(report.first_key, 1);
  assert_eq!(report.conflicts.len(), 1);
  assert_eq!(report.conflicts[0].existing["nrp"], "5025");
  assert_eq!(report.conflicts[0].incoming["nrp"], "5026");
  assert_eq!(w.count(Table::Students).await.unwrap(), 1);
}

#[tokio::test]
async fn stale_allocation_is_refused_without_collisions() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;
  w.execute_raw("DELETE FROM dim_dosen_wali").await.unwrap();
  w.execute_raw("INSERT INTO dim_dosen_wali VALUES (5, NULL, 'x@its.ac.id')")
    .await
    .unwrap();

  let err = w
    .append(TargetBatch::Advisors(vec![Keyed {
      key: 3,
      row: Advisor { name: None, email: "y@its.ac.id".into() },
    }]))
    .await
    .unwrap_err();
  let report = match err {
    Error::Core(frs_core::Error::IntegrityConflict(report)) => report,
    other => panic!("expected an integrity conflict, got {other}"),
  };
  assert_eq!(report.current_max, Some(5));
  assert!(report.conflicts.is_empty());
}

// ─── Watermarks ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn watermark_only_moves_forward() {
  let (s, w) = (source().await, warehouse().await);
  assert_eq!(watermark::watermark(&w, FactTable::Approval).await.unwrap(), None);

  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;
  let first = watermark::watermark(&w, FactTable::Approval).await.unwrap();
  assert_eq!(first, Some(date(3, 5)));

  s.execute_batch(
    "INSERT INTO log_frs VALUES (3, 100, 'DITOLAK', '2024-03-08 09:00:00')",
  )
  .await
  .unwrap();
  let report = run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;
  assert_eq!(report.job(Table::Approvals).unwrap().inserted, 1);
  assert_eq!(report.job(Table::Calendar).unwrap().inserted, 1);

  let second = watermark::watermark(&w, FactTable::Approval).await.unwrap();
  assert_eq!(second, Some(date(3, 8)));
  assert!(second >= first);

  let quiet = run(&s, &w, options(LoadMode::Incremental, date(3, 11))).await;
  let third = watermark::watermark(&w, FactTable::Approval).await.unwrap();
  assert_eq!(quiet.job(Table::Approvals).unwrap().inserted, 0);
  assert_eq!(third, second);
}

#[tokio::test]
async fn watermark_follows_dates_not_keys() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;

  // An older date arriving late gets the highest calendar key.
  s.execute_batch(
    "INSERT INTO pembatalan_frs VALUES (2, 100, '2024-01-15 08:00:00')",
  )
  .await
  .unwrap();
  let report = run(&s, &w, options(LoadMode::Historical, date(3, 11))).await;
  assert_eq!(report.job(Table::Cancellations).unwrap().inserted, 1);
  assert_eq!(
    watermark::watermark(&w, FactTable::Cancellation).await.unwrap(),
    Some(date(3, 2))
  );
}

#[tokio::test]
async fn incremental_mode_skips_events_before_the_watermark() {
  let (s, w) = (source().await, warehouse().await);
  run(&s, &w, options(LoadMode::Incremental, date(3, 10))).await;
  s.execute_batch(
    "INSERT INTO pembatalan_frs VALUES (2, 100, '2024-01-15 08:00:00')",
  )
  .await
  .unwrap();

  let report = run(&s, &w, options(LoadMode::Incremental, date(3, 11))).await;
  let job = report.job(Table::Cancellations).unwrap();
  assert_eq!(job.inserted, 0);
  assert_eq!(job.below_watermark, 1);
  assert_eq!(job.already_loaded, 1);
  assert_eq!(job.watermark, Some(date(3, 2)));
}
