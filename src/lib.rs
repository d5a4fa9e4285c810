//! FlakeRadar -- flaky test detection and time-to-fix tracking for CI.
//!
//! This crate provides the core library for ingesting JUnit/TestNG
//! results, statistical flakiness classification, root-cause clustering
//! of failures, and lifecycle tracking of how long each test stays flaky.

pub mod analysis;
pub mod config;
pub mod model;
pub mod parsers;
pub mod report;
pub mod storage;

use crate::analysis::runner::{run_analysis, AnalysisReport};
use crate::config::Config;
use crate::model::TestCaseResult;
use crate::parsers::{detect_format, junit, ResultsFormat};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Parse a batch of result files, skipping (and logging) files in formats
/// we do not recognize.
pub fn parse_result_files(paths: &[PathBuf], project: &str) -> Result<Vec<TestCaseResult>> {
    let mut all_results = Vec::new();
    let mut parsed_any = false;

    for path in paths {
        match detect_format(path) {
            ResultsFormat::Junit => {
                let results = junit::parse_junit_xml(path, Some(project))?;
                tracing::info!(path = %path.display(), cases = results.len(), "Parsed results file");
                all_results.extend(results);
                parsed_any = true;
            }
            ResultsFormat::Unknown => {
                tracing::warn!(path = %path.display(), "Skipping unknown format file");
            }
        }
    }

    if !parsed_any {
        bail!("no parseable result files among {} given path(s)", paths.len());
    }
    Ok(all_results)
}

/// Ingest the given result files and run the full analysis pipeline
/// against the project's history database.
pub fn analyze_files(cfg: &Config, paths: &[PathBuf]) -> Result<AnalysisReport> {
    let results = parse_result_files(paths, &cfg.project)?;
    let pool = storage::open_pool(&cfg.db_path)?;
    run_analysis(&pool, cfg, &results, chrono::Utc::now())
}

/// Worst-offender ranking straight from persisted lifecycle rows.
pub fn worst_offenders(
    db_path: &Path,
    project: &str,
    limit: usize,
) -> Result<Vec<analysis::lifecycle::OffenderRow>> {
    let pool = storage::open_pool(db_path)?;
    let tracker = analysis::lifecycle::LifecycleTracker::new(pool);
    tracker.worst_offenders(project, limit, chrono::Utc::now().timestamp())
}
