//! Full analysis pipeline:
//! 1. Record the run in the history ledger
//! 2. Classify flakiness over the project's history window
//! 3. Reconcile the flaky-lifecycle table
//! 4. Rank worst offenders
//! 5. Cluster this run's failures by root cause

use crate::analysis::clustering::{cluster_failures, FailureCluster};
use crate::analysis::flakiness::{compute_flakiness, Classification, FlakinessRecord};
use crate::analysis::lifecycle::{LifecycleTracker, OffenderRow};
use crate::config::Config;
use crate::model::TestCaseResult;
use crate::storage::{history, Pool};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::info;

/// Flattened per-test entry in the report.
#[derive(Debug, Clone, Serialize)]
pub struct TestReportRow {
    pub full_name: String,
    #[serde(flatten)]
    pub stats: FlakinessRecord,
}

/// Consolidated result of one analysis invocation. Ephemeral; the
/// lifecycle table is the only state the pipeline persists beyond the
/// run ledger itself.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub project: String,
    pub run_id: i64,
    pub generated_at: i64,
    /// Executions ingested in this run.
    pub total_executions: usize,
    /// Suspect tests across the history window.
    pub flaky_count: usize,
    /// Per-test statistics, worst flake rate first.
    pub tests: Vec<TestReportRow>,
    pub worst_offenders: Vec<OffenderRow>,
    /// Root-cause clusters for this run's failures, most severe first.
    pub clusters: Vec<FailureCluster>,
}

impl AnalysisReport {
    /// Suspect tests that clear the display confidence bar. Always-failing
    /// tests score zero confidence by construction, so they pass the bar
    /// unconditionally. Projection only; nothing persisted changes.
    pub fn flaky_at(&self, min_confidence: f64) -> impl Iterator<Item = &TestReportRow> {
        self.tests.iter().filter(move |row| {
            row.stats.is_suspect()
                && (row.stats.classification == Classification::AlwaysFailing
                    || row.stats.confidence_score >= min_confidence)
        })
    }
}

/// Run the pipeline for one batch of parsed executions.
pub fn run_analysis(
    pool: &Pool,
    cfg: &Config,
    results: &[TestCaseResult],
    now: DateTime<Utc>,
) -> Result<AnalysisReport> {
    let now_ts = now.timestamp();

    let meta = serde_json::json!({
        "build_id": cfg.build_id,
        "commit_sha": cfg.commit_sha,
        "executions": results.len(),
    });
    let run_id = history::insert_run(
        pool,
        &cfg.project,
        &cfg.build_id,
        &cfg.commit_sha,
        &meta,
        now_ts,
        results,
    )
    .context("recording run in history ledger")?;
    info!(project = %cfg.project, run_id, executions = results.len(), "Run recorded");

    let raw_rows = history::fetch_recent_statuses(pool, &cfg.project, cfg.run_window)
        .context("fetching history window")?;
    let flake_stats = compute_flakiness(&raw_rows);

    let tracker = LifecycleTracker::new(pool.clone());
    let tracking = tracker
        .update_tracking(&cfg.project, &flake_stats, now_ts)
        .context("updating flaky lifecycle")?;
    info!(
        open = tracking.open.len(),
        closed = tracking.newly_closed.len(),
        "Lifecycle reconciled"
    );

    let worst_offenders = tracker.worst_offenders(&cfg.project, cfg.offender_limit, now_ts)?;

    // Clusters are computed from this run's failures only, not history.
    let mut clusters: Vec<FailureCluster> = cluster_failures(results).into_values().collect();
    clusters.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.signature.cmp(&b.signature))
    });

    let flaky_count = flake_stats.values().filter(|s| s.is_suspect()).count();

    let mut tests: Vec<TestReportRow> = flake_stats
        .into_iter()
        .map(|(full_name, stats)| TestReportRow { full_name, stats })
        .collect();
    tests.sort_by(|a, b| {
        b.stats
            .flake_rate
            .partial_cmp(&a.stats.flake_rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });

    Ok(AnalysisReport {
        project: cfg.project.clone(),
        run_id,
        generated_at: now_ts,
        total_executions: results.len(),
        flaky_count,
        tests,
        worst_offenders,
        clusters,
    })
}
