//! Query helpers shared by the warehouse and the source.

/// Run `sql` and map every returned row.
pub async fn select_all<T, F>(
  conn: &tokio_rusqlite::Connection,
  sql: String,
  map: F,
) -> crate::Result<Vec<T>>
where
  T: Send + 'static,
  F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
{
  let rows = conn
    .call(move |conn| {
      let mut stmt = conn.prepare(&sql)?;
      let rows = stmt
        .query_map([], |row| map(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
  Ok(rows)
}
