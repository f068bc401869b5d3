//! [`SqliteWarehouse`]: the SQLite implementation of [`Warehouse`].

use std::path::Path;

use frs_core::{
  ConflictReport, FactTable, KeyConflict, Table,
  dimension::{
    Advisor, CalendarDay, ChangeStatus, CourseOffering, Keyed, Student, Version,
  },
  fact::FactKey,
  store::{Correction, TargetBatch, VersionChangeset, VersionsApplied, Warehouse},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{
    ADVISOR_COLUMNS, CALENDAR_COLUMNS, COURSE_COLUMNS, EncodedBatch, EncodedRow,
    RawCalendarDay, RawCourseVersion, STATUS_COLUMNS, STUDENT_COLUMNS,
    encode_advisor, encode_batch, encode_course_versions, encode_date,
    encode_student, json_of,
  },
  query::select_all,
  schema::WAREHOUSE_SCHEMA,
};

/// Why a write transaction was abandoned. Carried out of the connection
/// thread as a value so the transaction rolls back on drop.
enum Refused {
  Conflict(ConflictReport),
  Stale(i64),
}

impl From<Refused> for Error {
  fn from(refused: Refused) -> Self {
    match refused {
      Refused::Conflict(report) => {
        frs_core::Error::IntegrityConflict(report).into()
      }
      Refused::Stale(key) => frs_core::Error::StaleVersion {
        table: Table::CourseOfferings,
        key,
      }
      .into(),
    }
  }
}

// ─── Warehouse ───────────────────────────────────────────────────────────────

/// The star-schema warehouse in a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let warehouse = Self { conn };
    warehouse.init_schema().await?;
    Ok(warehouse)
  }

  /// Open an in-memory warehouse, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let warehouse = Self { conn };
    warehouse.init_schema().await?;
    Ok(warehouse)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(WAREHOUSE_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Row count of `table`.
  pub async fn count(&self, table: Table) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let count: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
      .await?;
    Ok(usize::try_from(count).unwrap_or_default())
  }

  /// Insert `batch` inside `tx`, refusing it whole if its keys do not start
  /// above the table's current maximum.
  fn insert_checked(
    tx: &rusqlite::Transaction<'_>,
    batch: &EncodedBatch,
  ) -> rusqlite::Result<Result<usize, Refused>> {
    let Some(first_key) = batch.first_key() else {
      return Ok(Ok(0));
    };
    let key_column = batch.table.key_column();
    let current_max: Option<i64> = tx.query_row(
      &format!("SELECT MAX({key_column}) FROM {}", batch.table),
      [],
      |row| row.get(0),
    )?;

    if current_max.is_some_and(|max| first_key <= max) {
      let conflicts = Self::collisions(tx, batch)?;
      return Ok(Err(Refused::Conflict(ConflictReport {
        table: batch.table,
        current_max,
        first_key,
        conflicts,
      })));
    }

    let mut stmt = tx.prepare(&batch.insert_sql())?;
    for row in &batch.rows {
      stmt.execute(rusqlite::params_from_iter(row.values.iter()))?;
    }
    Ok(Ok(batch.rows.len()))
  }

  /// Every incoming row whose key is already taken, next to the stored row.
  fn collisions(
    tx: &rusqlite::Transaction<'_>,
    batch: &EncodedBatch,
  ) -> rusqlite::Result<Vec<KeyConflict>> {
    let sql = format!(
      "SELECT {} FROM {} WHERE {} = ?1",
      batch.columns.join(", "),
      batch.table,
      batch.table.key_column(),
    );
    let mut stmt = tx.prepare(&sql)?;
    let mut conflicts = Vec::new();
    for incoming in &batch.rows {
      let existing = stmt
        .query_row([incoming.key], |row| {
          let object = batch
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
              Ok(((*column).to_owned(), json_of(row.get_ref(i)?)))
            })
            .collect::<rusqlite::Result<serde_json::Map<_, _>>>()?;
          Ok(serde_json::Value::Object(object))
        })
        .optional()?;
      if let Some(existing) = existing {
        conflicts.push(KeyConflict {
          key: incoming.key,
          existing,
          incoming: incoming.to_json(batch.columns),
        });
      }
    }
    Ok(conflicts)
  }

  /// Apply keyed updates of the given non-key columns in one transaction.
  async fn update_keyed(&self, batch: EncodedBatch) -> Result<usize> {
    let all_columns: &'static [&'static str] = batch.columns;
    let Some((key_column, columns)) = all_columns.split_first() else {
      return Ok(0);
    };
    let assignments = columns
      .iter()
      .enumerate()
      .map(|(i, column)| format!("{column} = ?{}", i + 2))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "UPDATE {} SET {assignments} WHERE {key_column} = ?1",
      batch.table
    );

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
          let mut stmt = tx.prepare(&sql)?;
          for row in &batch.rows {
            updated +=
              stmt.execute(rusqlite::params_from_iter(row.values.iter()))?;
          }
        }
        tx.commit()?;
        Ok(updated)
      })
      .await?;
    Ok(updated)
  }
}

fn select_columns(table: Table, columns: &[&str]) -> String {
  format!(
    "SELECT {} FROM {table} ORDER BY {}",
    columns.join(", "),
    table.key_column()
  )
}

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn max_key(&self, table: Table) -> Result<Option<i64>> {
    let sql = format!("SELECT MAX({}) FROM {table}", table.key_column());
    let max: Option<i64> = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
      .await?;
    Ok(max)
  }

  async fn students(&self) -> Result<Vec<Keyed<Student>>> {
    let sql = select_columns(Table::Students, STUDENT_COLUMNS);
    select_all(&self.conn, sql, |row| {
      Ok(Keyed {
        key: row.get(0)?,
        row: Student {
          nrp:          row.get(1)?,
          name:         row.get(2)?,
          email:        row.get(3)?,
          department:   row.get(4)?,
          advisor_name: row.get(5)?,
        },
      })
    })
    .await
  }

  async fn advisors(&self) -> Result<Vec<Keyed<Advisor>>> {
    let sql = select_columns(Table::Advisors, ADVISOR_COLUMNS);
    select_all(&self.conn, sql, |row| {
      Ok(Keyed {
        key: row.get(0)?,
        row: Advisor { name: row.get(1)?, email: row.get(2)? },
      })
    })
    .await
  }

  async fn change_statuses(&self) -> Result<Vec<Keyed<ChangeStatus>>> {
    let sql = select_columns(Table::ChangeStatuses, STATUS_COLUMNS);
    select_all(&self.conn, sql, |row| {
      Ok(Keyed {
        key: row.get(0)?,
        row: ChangeStatus { status: row.get(1)? },
      })
    })
    .await
  }

  async fn calendar(&self) -> Result<Vec<Keyed<CalendarDay>>> {
    let sql = select_columns(Table::Calendar, CALENDAR_COLUMNS);
    let raws = select_all(&self.conn, sql, RawCalendarDay::from_row).await?;
    raws.into_iter().map(RawCalendarDay::into_day).collect()
  }

  async fn course_versions(&self) -> Result<Vec<Keyed<Version<CourseOffering>>>> {
    let sql = select_columns(Table::CourseOfferings, COURSE_COLUMNS);
    let raws = select_all(&self.conn, sql, RawCourseVersion::from_row).await?;
    raws.into_iter().map(RawCourseVersion::into_version).collect()
  }

  async fn fact_keys(&self, fact: FactTable) -> Result<Vec<FactKey>> {
    let [a, b, c] = fact.key_columns();
    let sql = format!("SELECT {a}, {b}, {c} FROM {fact}");
    select_all(&self.conn, sql, |row| {
      Ok(FactKey(row.get(0)?, row.get(1)?, row.get(2)?))
    })
    .await
  }

  async fn watermark_keys(&self, fact: FactTable) -> Result<Vec<i64>> {
    let column = fact.watermark_column();
    let sql = format!(
      "SELECT DISTINCT {column} FROM {fact} WHERE {column} IS NOT NULL"
    );
    select_all(&self.conn, sql, |row| row.get(0)).await
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn append(&self, batch: TargetBatch) -> Result<usize> {
    let encoded = encode_batch(batch);
    let table = encoded.table;
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = Self::insert_checked(&tx, &encoded)?;
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let written = outcome?;
    tracing::debug!(%table, rows = written, "appended batch");
    Ok(written)
  }

  async fn correct(&self, correction: Correction) -> Result<usize> {
    let table = correction.table();
    let batch = match correction {
      Correction::Advisors(rows) => EncodedBatch {
        table,
        columns: ADVISOR_COLUMNS,
        rows: rows
          .into_iter()
          .map(|Keyed { key, row }| EncodedRow::new(key, encode_advisor(row)))
          .collect(),
      },
      Correction::Students(rows) => EncodedBatch {
        table,
        columns: STUDENT_COLUMNS,
        rows: rows
          .into_iter()
          .map(|Keyed { key, row }| EncodedRow::new(key, encode_student(row)))
          .collect(),
      },
    };
    let updated = self.update_keyed(batch).await?;
    tracing::debug!(%table, rows = updated, "corrected rows in place");
    Ok(updated)
  }

  async fn apply_versions(
    &self,
    changeset: VersionChangeset<CourseOffering>,
  ) -> Result<VersionsApplied> {
    let VersionChangeset { expire, expire_on, insert } = changeset;
    let expire_on = encode_date(expire_on);
    let encoded = encode_course_versions(insert);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = expire_then_insert(&tx, &expire, &expire_on, &encoded)?;
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let applied = outcome?;
    tracing::debug!(
      expired = applied.expired,
      inserted = applied.inserted,
      "applied course versions"
    );
    Ok(applied)
  }
}

fn expire_then_insert(
  tx: &rusqlite::Transaction<'_>,
  expire: &[i64],
  expire_on: &str,
  insert: &EncodedBatch,
) -> rusqlite::Result<Result<VersionsApplied, Refused>> {
  let mut expired = 0;
  {
    let mut stmt = tx.prepare(
      "UPDATE dim_mata_kuliah
          SET row_expiration_date = ?1, current_row_flag = 'Expired'
        WHERE mata_kuliah_id = ?2 AND current_row_flag = 'Current'",
    )?;
    for key in expire {
      if stmt.execute(rusqlite::params![expire_on, key])? == 0 {
        return Ok(Err(Refused::Stale(*key)));
      }
      expired += 1;
    }
  }
  let inserted = match SqliteWarehouse::insert_checked(tx, insert)? {
    Ok(inserted) => inserted,
    Err(refused) => return Ok(Err(refused)),
  };
  Ok(Ok(VersionsApplied { expired, inserted }))
}

#[cfg(test)]
impl SqliteWarehouse {
  /// The first column of the first row of `sql`.
  pub(crate) async fn scalar<T>(&self, sql: &str) -> Result<T>
  where
    T: rusqlite::types::FromSql + Send + 'static,
  {
    let sql = sql.to_owned();
    let value = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
      .await?;
    Ok(value)
  }

  pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
    let sql = sql.to_owned();
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
