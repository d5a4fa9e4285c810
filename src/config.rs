//! Runtime configuration assembled from CLI arguments and environment.

use std::path::PathBuf;

/// Settings for one analysis invocation. Built once in `main` and passed
/// down explicitly; there are no process-wide singletons.
#[derive(Debug, Clone)]
pub struct Config {
    pub project: String,
    pub build_id: String,
    pub commit_sha: String,
    pub db_path: PathBuf,
    /// History window: executions from the most recent N runs of the project.
    pub run_window: usize,
    /// Display threshold for the flaky-test summary. Projection only; never
    /// affects what is persisted.
    pub min_confidence: f64,
    /// Cap for the worst-offenders ranking.
    pub offender_limit: usize,
}

pub const DEFAULT_RUN_WINDOW: usize = 50;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_OFFENDER_LIMIT: usize = 10;

impl Config {
    pub fn new(project: impl Into<String>, db_path: PathBuf) -> Self {
        Self {
            project: project.into(),
            build_id: "local-build".to_string(),
            commit_sha: "local".to_string(),
            db_path,
            run_window: DEFAULT_RUN_WINDOW,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            offender_limit: DEFAULT_OFFENDER_LIMIT,
        }
    }
}

/// Resolve the database location: explicit flag, then `FLAKERADAR_DB_PATH`,
/// then `~/.flakeradar/history.db`.
pub fn resolve_db_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(p) = cli_path {
        return p;
    }
    if let Ok(p) = std::env::var("FLAKERADAR_DB_PATH") {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".flakeradar").join("history.db")
}
