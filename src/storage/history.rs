//! Run ledger and execution history queries.

use crate::model::{TestCaseResult, TestStatus};
use crate::storage::Pool;
use anyhow::{anyhow, Context, Result};
use rusqlite::params;
use std::str::FromStr;

/// Record one run and its executions in the append-only ledger.
pub fn insert_run(
    pool: &Pool,
    project: &str,
    build_id: &str,
    commit_sha: &str,
    meta: &serde_json::Value,
    run_ts: i64,
    results: &[TestCaseResult],
) -> Result<i64> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO runs (run_ts, project, build_id, commit_sha, meta_json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![run_ts, project, build_id, commit_sha, meta.to_string()],
    )?;
    let run_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO test_results
               (run_id, full_name, suite, status, duration_ms, error_type, error_message, error_details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for r in results {
            stmt.execute(params![
                run_id,
                r.full_name,
                r.suite,
                r.status.as_str(),
                r.duration_ms,
                r.error_type,
                r.error_message,
                r.error_details,
            ])?;
        }
    }

    tx.commit().context("committing run insert")?;
    Ok(run_id)
}

/// Fetch the status history for every test in the project's window.
///
/// The window is all executions belonging to the most recent `run_window`
/// runs. Rows come back in explicit chronological order (`run_ts`, then
/// insertion id) -- transition counting depends on it, so storage fetch
/// order is never trusted.
pub fn fetch_recent_statuses(
    pool: &Pool,
    project: &str,
    run_window: usize,
) -> Result<Vec<(String, TestStatus)>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT t.full_name, t.status
           FROM test_results t
           JOIN runs r ON r.id = t.run_id
          WHERE t.run_id IN (
                SELECT id FROM runs
                 WHERE project = ?1
                 ORDER BY run_ts DESC, id DESC
                 LIMIT ?2)
          ORDER BY r.run_ts ASC, t.id ASC",
    )?;

    let rows = stmt.query_map(params![project, run_window as i64], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for r in rows {
        let (full_name, status) = r?;
        let status = TestStatus::from_str(&status)
            .map_err(|e| anyhow!("invalid history row for {full_name}: {e}"))?;
        out.push((full_name, status));
    }
    Ok(out)
}
