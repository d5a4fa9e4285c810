//! Flaky-test lifecycle tracking for time-to-fix analysis.
//!
//! Owns the `flaky_lifecycle` table. Each (project, test) key has at most
//! one open row at a time; closing a row is terminal, and a later
//! re-detection opens a brand new row. All mutations for one invocation
//! happen inside a single transaction.

use crate::analysis::flakiness::FlakinessRecord;
use crate::storage::Pool;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

const SECONDS_PER_DAY: i64 = 86_400;

/// One tracked open-or-closed period during which a test stayed flaky.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleRecord {
    pub full_name: String,
    pub first_detected: i64,
    pub last_seen: i64,
    pub fixed_at: Option<i64>,
    pub days_flaky: i64,
    pub cumulative_failures: i64,
}

impl LifecycleRecord {
    pub fn is_open(&self) -> bool {
        self.fixed_at.is_none()
    }

    /// Live elapsed days for open records, the stored value once closed.
    pub fn current_days_flaky(&self, now: i64) -> i64 {
        match self.fixed_at {
            None => (now - self.first_detected) / SECONDS_PER_DAY,
            Some(_) => self.days_flaky,
        }
    }
}

/// Worst-offender ranking entry.
#[derive(Debug, Clone, Serialize)]
pub struct OffenderRow {
    #[serde(flatten)]
    pub record: LifecycleRecord,
    pub current_days_flaky: i64,
}

/// Result of one tracker invocation.
#[derive(Debug, Default)]
pub struct TrackingOutcome {
    /// All rows left open after this invocation.
    pub open: Vec<LifecycleRecord>,
    /// Rows closed by this invocation.
    pub newly_closed: Vec<LifecycleRecord>,
}

pub struct LifecycleTracker {
    pool: Pool,
}

impl LifecycleTracker {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Reconcile persisted lifecycle rows with the current classification.
    ///
    /// State transitions, all committed atomically:
    /// - flaky now, no open row: insert a new open row
    /// - flaky now, open row: bump last_seen, accumulate failures
    /// - open row, not flaky now: close it (terminal)
    pub fn update_tracking(
        &self,
        project: &str,
        flake_stats: &HashMap<String, FlakinessRecord>,
        now: i64,
    ) -> Result<TrackingOutcome> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let prev_open = fetch_open(&tx, project)?;

        let currently_flaky: HashMap<&str, &FlakinessRecord> = flake_stats
            .iter()
            .filter(|(_, stats)| stats.is_suspect())
            .map(|(name, stats)| (name.as_str(), stats))
            .collect();

        for (name, stats) in &currently_flaky {
            if prev_open.contains_key(*name) {
                tx.execute(
                    "UPDATE flaky_lifecycle
                        SET last_seen = ?1,
                            cumulative_failures = cumulative_failures + ?2,
                            days_flaky = CAST((?1 - first_detected) / 86400 AS INTEGER)
                      WHERE project = ?3 AND full_name = ?4 AND fixed_at IS NULL",
                    params![now, stats.fail_count, project, name],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO flaky_lifecycle
                       (project, full_name, first_detected, last_seen, fixed_at, days_flaky, cumulative_failures)
                     VALUES (?1, ?2, ?3, ?3, NULL, 0, ?4)",
                    params![project, name, now, stats.fail_count],
                )?;
            }
        }

        // Open rows whose test is no longer flaky get closed. The row is
        // never touched again after this.
        let mut newly_closed = Vec::new();
        for (name, record) in &prev_open {
            if currently_flaky.contains_key(name.as_str()) {
                continue;
            }
            let days = (now - record.first_detected) / SECONDS_PER_DAY;
            tx.execute(
                "UPDATE flaky_lifecycle
                    SET fixed_at = ?1, days_flaky = ?2
                  WHERE project = ?3 AND full_name = ?4 AND fixed_at IS NULL",
                params![now, days, project, name],
            )?;
            let mut closed = record.clone();
            closed.fixed_at = Some(now);
            closed.days_flaky = days;
            newly_closed.push(closed);
        }

        let mut open: Vec<LifecycleRecord> = fetch_open(&tx, project)?.into_values().collect();
        open.sort_by(|a, b| {
            a.first_detected
                .cmp(&b.first_detected)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });

        tx.commit().context("committing lifecycle update")?;
        Ok(TrackingOutcome { open, newly_closed })
    }

    /// Rank the project's lifecycle rows by how long each test has been
    /// flaky (live days for open rows), then by cumulative failures.
    pub fn worst_offenders(&self, project: &str, limit: usize, now: i64) -> Result<Vec<OffenderRow>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT full_name, first_detected, last_seen, fixed_at, days_flaky, cumulative_failures,
                    CASE WHEN fixed_at IS NULL
                         THEN CAST((?1 - first_detected) / 86400 AS INTEGER)
                         ELSE days_flaky
                    END AS current_days_flaky
               FROM flaky_lifecycle
              WHERE project = ?2
              ORDER BY current_days_flaky DESC, cumulative_failures DESC
              LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![now, project, limit as i64], |row| {
            Ok(OffenderRow {
                record: LifecycleRecord {
                    full_name: row.get(0)?,
                    first_detected: row.get(1)?,
                    last_seen: row.get(2)?,
                    fixed_at: row.get(3)?,
                    days_flaky: row.get(4)?,
                    cumulative_failures: row.get(5)?,
                },
                current_days_flaky: row.get(6)?,
            })
        })?;

        let mut offenders = Vec::new();
        for r in rows {
            offenders.push(r?);
        }
        Ok(offenders)
    }
}

fn fetch_open(conn: &Connection, project: &str) -> Result<HashMap<String, LifecycleRecord>> {
    let mut stmt = conn.prepare(
        "SELECT full_name, first_detected, last_seen, fixed_at, days_flaky, cumulative_failures
           FROM flaky_lifecycle
          WHERE project = ?1 AND fixed_at IS NULL",
    )?;
    let rows = stmt.query_map(params![project], |row| {
        Ok(LifecycleRecord {
            full_name: row.get(0)?,
            first_detected: row.get(1)?,
            last_seen: row.get(2)?,
            fixed_at: row.get(3)?,
            days_flaky: row.get(4)?,
            cumulative_failures: row.get(5)?,
        })
    })?;

    let mut out = HashMap::new();
    for r in rows {
        let record = r?;
        out.insert(record.full_name.clone(), record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::flakiness::Classification;
    use crate::storage::open_pool;
    use tempfile::TempDir;

    const DAY: i64 = SECONDS_PER_DAY;

    fn test_tracker() -> (TempDir, LifecycleTracker) {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(&dir.path().join("history.db")).unwrap();
        (dir, LifecycleTracker::new(pool))
    }

    fn record(classification: Classification, fail_count: u32) -> FlakinessRecord {
        FlakinessRecord {
            pass_count: 5,
            fail_count,
            total_runs: 5 + fail_count,
            transitions: 4,
            flake_rate: 0.5,
            confidence_score: 0.8,
            classification,
        }
    }

    fn stats_of(entries: &[(&str, Classification, u32)]) -> HashMap<String, FlakinessRecord> {
        entries
            .iter()
            .map(|(name, c, fails)| (name.to_string(), record(*c, *fails)))
            .collect()
    }

    #[test]
    fn test_new_flaky_test_opens_a_row() {
        let (_dir, tracker) = test_tracker();
        let stats = stats_of(&[("a#t", Classification::TrulyFlaky, 3)]);

        let outcome = tracker.update_tracking("proj", &stats, 1_000).unwrap();
        assert_eq!(outcome.open.len(), 1);
        assert!(outcome.newly_closed.is_empty());

        let row = &outcome.open[0];
        assert_eq!(row.full_name, "a#t");
        assert_eq!(row.first_detected, 1_000);
        assert_eq!(row.last_seen, 1_000);
        assert_eq!(row.cumulative_failures, 3);
        assert!(row.is_open());
    }

    #[test]
    fn test_stable_test_is_a_no_op() {
        let (_dir, tracker) = test_tracker();
        let stats = stats_of(&[("a#t", Classification::Stable, 0)]);

        let outcome = tracker.update_tracking("proj", &stats, 1_000).unwrap();
        assert!(outcome.open.is_empty());
        assert!(outcome.newly_closed.is_empty());
    }

    #[test]
    fn test_repeat_detection_updates_single_open_row() {
        let (_dir, tracker) = test_tracker();
        let stats = stats_of(&[("a#t", Classification::TrulyFlaky, 3)]);

        tracker.update_tracking("proj", &stats, 1_000).unwrap();
        let stats = stats_of(&[("a#t", Classification::AlwaysFailing, 2)]);
        let outcome = tracker
            .update_tracking("proj", &stats, 1_000 + 3 * DAY)
            .unwrap();

        // still exactly one open row
        assert_eq!(outcome.open.len(), 1);
        let row = &outcome.open[0];
        assert_eq!(row.first_detected, 1_000);
        assert_eq!(row.last_seen, 1_000 + 3 * DAY);
        assert_eq!(row.cumulative_failures, 5);
        assert_eq!(row.days_flaky, 3);
    }

    #[test]
    fn test_recovery_closes_the_row() {
        let (_dir, tracker) = test_tracker();
        tracker
            .update_tracking("proj", &stats_of(&[("a#t", Classification::TrulyFlaky, 3)]), 1_000)
            .unwrap();

        let outcome = tracker
            .update_tracking(
                "proj",
                &stats_of(&[("a#t", Classification::Stable, 0)]),
                1_000 + 2 * DAY,
            )
            .unwrap();

        assert!(outcome.open.is_empty());
        assert_eq!(outcome.newly_closed.len(), 1);
        let closed = &outcome.newly_closed[0];
        assert_eq!(closed.fixed_at, Some(1_000 + 2 * DAY));
        assert_eq!(closed.days_flaky, 2);
    }

    #[test]
    fn test_redetection_opens_a_fresh_row_and_leaves_closed_one_alone() {
        let (_dir, tracker) = test_tracker();
        let t1 = 1_000;
        let t2 = t1 + 2 * DAY;
        let t3 = t2 + 5 * DAY;

        tracker
            .update_tracking("proj", &stats_of(&[("a#t", Classification::TrulyFlaky, 3)]), t1)
            .unwrap();
        tracker
            .update_tracking("proj", &stats_of(&[("a#t", Classification::Stable, 0)]), t2)
            .unwrap();
        let outcome = tracker
            .update_tracking("proj", &stats_of(&[("a#t", Classification::TrulyFlaky, 1)]), t3)
            .unwrap();

        // Fresh open row starting at t3
        assert_eq!(outcome.open.len(), 1);
        assert_eq!(outcome.open[0].first_detected, t3);
        assert_eq!(outcome.open[0].cumulative_failures, 1);

        // Both periods persisted; the closed one untouched
        let offenders = tracker.worst_offenders("proj", 10, t3).unwrap();
        assert_eq!(offenders.len(), 2);
        let closed: Vec<_> = offenders.iter().filter(|o| !o.record.is_open()).collect();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].record.first_detected, t1);
        assert_eq!(closed[0].record.fixed_at, Some(t2));
        assert_eq!(closed[0].record.days_flaky, 2);
    }

    #[test]
    fn test_worst_offenders_ranked_by_days_then_failures() {
        let (_dir, tracker) = test_tracker();
        let t0 = 1_000;

        // "old#t" has been flaky for 10 days, "new#t" for 1 day but with
        // more failures, "peer#t" matches new#t's day count with fewer.
        tracker
            .update_tracking("proj", &stats_of(&[("old#t", Classification::TrulyFlaky, 1)]), t0)
            .unwrap();
        tracker
            .update_tracking(
                "proj",
                &stats_of(&[
                    ("old#t", Classification::TrulyFlaky, 1),
                    ("new#t", Classification::TrulyFlaky, 9),
                    ("peer#t", Classification::TrulyFlaky, 2),
                ]),
                t0 + 9 * DAY,
            )
            .unwrap();

        let now = t0 + 10 * DAY;
        let offenders = tracker.worst_offenders("proj", 10, now).unwrap();
        let names: Vec<&str> = offenders.iter().map(|o| o.record.full_name.as_str()).collect();
        assert_eq!(names, vec!["old#t", "new#t", "peer#t"]);
        assert_eq!(offenders[0].current_days_flaky, 10);
        assert_eq!(offenders[1].current_days_flaky, 1);

        let top = tracker.worst_offenders("proj", 1, now).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].record.full_name, "old#t");
    }
}
