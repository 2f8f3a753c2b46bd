use sqlx::PgPool;

use crate::error::Result;

/// Builds the one CSV row copied into a target's staging table, in the same
/// column order as `columns`.
pub fn csv_line(fields: &[String]) -> String {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(fields).expect("writing to an in-memory buffer cannot fail");
    String::from_utf8(writer.into_inner().expect("flushing an in-memory buffer cannot fail"))
        .expect("csv writer only emits valid utf-8 for utf-8 input")
}

fn staging_table(target: &str, worker_id: &str) -> String {
    format!("staging.\"{target}-{worker_id}\"")
}

/// Creates this worker's staging table for `target` if it doesn't already
/// exist. Called once per sink at startup.
pub async fn ensure_staging_table(pool: &PgPool, target: &str, worker_id: &str) -> Result<()> {
    sqlx::query("CREATE SCHEMA IF NOT EXISTS staging")
        .execute(pool)
        .await?;
    let staging = staging_table(target, worker_id);
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {staging} (LIKE {target} INCLUDING DEFAULTS)"
    ))
    .execute(pool)
    .await?;
    Ok(())
}

/// Bulk-loads `rows` into the worker's staging table via `COPY`, then merges
/// them into `target` with `INSERT ... ON CONFLICT DO NOTHING`, truncating
/// staging afterwards either way (§6).
pub async fn copy_and_merge(
    pool: &PgPool,
    target: &str,
    worker_id: &str,
    columns: &[&str],
    rows: &[String],
) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let staging = staging_table(target, worker_id);
    let column_list = columns.join(", ");
    let mut conn = pool.acquire().await?;

    let copy_sql = format!("COPY {staging} ({column_list}) FROM STDIN WITH (FORMAT csv)");
    let mut copy = conn.copy_in_raw(&copy_sql).await?;
    for row in rows {
        copy.send(row.as_bytes()).await?;
    }
    copy.finish().await?;

    let merged = sqlx::query(&format!(
        "INSERT INTO {target} ({column_list}) SELECT {column_list} FROM {staging} ON CONFLICT DO NOTHING"
    ))
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!("TRUNCATE {staging}"))
        .execute(&mut *conn)
        .await?;

    Ok(merged.rows_affected())
}

/// Drops this worker's staging tables. Called at shutdown.
pub async fn drop_staging_table(pool: &PgPool, target: &str, worker_id: &str) -> Result<()> {
    let staging = staging_table(target, worker_id);
    sqlx::query(&format!("DROP TABLE IF EXISTS {staging}"))
        .execute(pool)
        .await?;
    Ok(())
}
