//! Core data model for parsed test executions.

use serde::{Deserialize, Serialize};

/// Outcome of a single test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
    Skipped,
}

impl TestStatus {
    /// Failures and errors are merged for flakiness accounting.
    pub fn is_fail_like(self) -> bool {
        matches!(self, TestStatus::Fail | TestStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Error => "error",
            TestStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(TestStatus::Pass),
            "fail" => Ok(TestStatus::Fail),
            "error" => Ok(TestStatus::Error),
            "skipped" => Ok(TestStatus::Skipped),
            other => Err(format!("unknown test status: {other}")),
        }
    }
}

/// One test execution as parsed from a results file.
///
/// `full_name` is the stable identity across runs, canonically
/// `pkg.Class#method`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub full_name: String,
    pub suite: Option<String>,
    pub status: TestStatus,
    pub duration_ms: Option<i64>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl TestCaseResult {
    /// Minimal constructor for a passing case; fields with error context
    /// are filled in by the parsers.
    pub fn passed(full_name: impl Into<String>, suite: Option<String>) -> Self {
        Self {
            full_name: full_name.into(),
            suite,
            status: TestStatus::Pass,
            duration_ms: None,
            error_type: None,
            error_message: None,
            error_details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        for s in [
            TestStatus::Pass,
            TestStatus::Fail,
            TestStatus::Error,
            TestStatus::Skipped,
        ] {
            assert_eq!(TestStatus::from_str(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn test_fail_like() {
        assert!(TestStatus::Fail.is_fail_like());
        assert!(TestStatus::Error.is_fail_like());
        assert!(!TestStatus::Pass.is_fail_like());
        assert!(!TestStatus::Skipped.is_fail_like());
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(TestStatus::from_str("flaky").is_err());
    }
}
