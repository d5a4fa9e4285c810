//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_ts INTEGER NOT NULL,
            project TEXT NOT NULL,
            build_id TEXT,
            commit_sha TEXT,
            meta_json TEXT
        );

        CREATE TABLE IF NOT EXISTS test_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL,
            full_name TEXT NOT NULL,
            suite TEXT,
            status TEXT NOT NULL,
            duration_ms INTEGER,
            error_type TEXT,
            error_message TEXT,
            error_details TEXT,
            FOREIGN KEY(run_id) REFERENCES runs(id)
        );

        CREATE TABLE IF NOT EXISTS flaky_lifecycle (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project TEXT NOT NULL,
            full_name TEXT NOT NULL,
            first_detected INTEGER NOT NULL,
            last_seen INTEGER NOT NULL,
            fixed_at INTEGER,
            days_flaky INTEGER NOT NULL DEFAULT 0,
            cumulative_failures INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_runs_project_ts ON runs(project, run_ts);
        CREATE INDEX IF NOT EXISTS idx_test_results_run ON test_results(run_id);
        CREATE INDEX IF NOT EXISTS idx_test_results_full_name ON test_results(full_name);
        CREATE INDEX IF NOT EXISTS idx_lifecycle_project ON flaky_lifecycle(project);

        -- At most one open lifecycle row per (project, full_name); closed
        -- rows are immutable and a re-detection inserts a fresh row.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_lifecycle_one_open
            ON flaky_lifecycle(project, full_name) WHERE fixed_at IS NULL;",
    )?;

    Ok(())
}
