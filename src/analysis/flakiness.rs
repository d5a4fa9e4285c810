//! Statistical flakiness classification over test execution histories.
//!
//! Pure and deterministic: the same status sequences always produce the
//! same records, degenerate inputs simply score zero confidence.

use crate::model::TestStatus;
use serde::Serialize;
use std::collections::HashMap;

/// Confidence at or above which an intermittent test counts as truly flaky.
pub const FLAKY_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Minimum observed runs before an all-failing test counts as always failing.
const ALWAYS_FAILING_MIN_RUNS: u32 = 3;

/// How a test's history reads once the statistics are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Consistent passes, or not enough signal to say otherwise.
    Stable,
    /// Fails every time it runs; broken rather than flaky.
    AlwaysFailing,
    /// Passes and fails intermittently with high statistical confidence.
    TrulyFlaky,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Stable => "stable",
            Classification::AlwaysFailing => "always_failing",
            Classification::TrulyFlaky => "truly_flaky",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-test flakiness statistics for one analysis invocation. Recomputed
/// fresh each time; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct FlakinessRecord {
    pub pass_count: u32,
    /// Failures and errors merged.
    pub fail_count: u32,
    pub total_runs: u32,
    /// Adjacent status changes in the chronological history.
    pub transitions: u32,
    pub flake_rate: f64,
    /// [0, 1] estimate that the variability reflects true flakiness.
    pub confidence_score: f64,
    pub classification: Classification,
}

impl FlakinessRecord {
    /// Both intermittent and always-failing tests need attention.
    pub fn is_suspect(&self) -> bool {
        matches!(
            self.classification,
            Classification::TrulyFlaky | Classification::AlwaysFailing
        )
    }
}

/// Compute per-test flakiness from `(full_name, status)` rows ordered by
/// execution time ascending. Grouping preserves each test's own order, so
/// transition counts reflect true chronology.
pub fn compute_flakiness(raw_rows: &[(String, TestStatus)]) -> HashMap<String, FlakinessRecord> {
    let mut history: HashMap<String, Vec<TestStatus>> = HashMap::new();
    for (full_name, status) in raw_rows {
        history.entry(full_name.clone()).or_default().push(*status);
    }

    history
        .into_iter()
        .map(|(name, statuses)| (name, classify_history(&statuses)))
        .collect()
}

/// Classify one test's chronological status sequence.
pub fn classify_history(statuses: &[TestStatus]) -> FlakinessRecord {
    let pass_count = statuses.iter().filter(|s| **s == TestStatus::Pass).count() as u32;
    let fail_count = statuses.iter().filter(|s| s.is_fail_like()).count() as u32;
    let total = statuses.len() as u32;
    let transitions = statuses.windows(2).filter(|w| w[0] != w[1]).count() as u32;

    let flake_rate = if total > 0 {
        f64::from(fail_count) / f64::from(total)
    } else {
        0.0
    };

    let confidence_score = flakiness_confidence(pass_count, fail_count, total, transitions);

    let truly_flaky =
        pass_count > 0 && fail_count > 0 && confidence_score >= FLAKY_CONFIDENCE_THRESHOLD;
    let always_failing = fail_count > 0 && pass_count == 0 && total >= ALWAYS_FAILING_MIN_RUNS;

    let classification = if truly_flaky {
        Classification::TrulyFlaky
    } else if always_failing {
        Classification::AlwaysFailing
    } else {
        Classification::Stable
    };

    FlakinessRecord {
        pass_count,
        fail_count,
        total_runs: total,
        transitions,
        flake_rate,
        confidence_score,
        classification,
    }
}

/// Statistical confidence that a history is truly flaky, in [0, 1].
///
/// Combines a sample-size factor (plateau at 20 runs), a transition-rate
/// factor (50%+ adjacent changes saturates), and a Wilson score interval
/// check on the failure proportion: a narrow interval away from 0 and 1
/// means the mixed outcomes are unlikely to be noise.
fn flakiness_confidence(pass_count: u32, fail_count: u32, total: u32, transitions: u32) -> f64 {
    if total < 2 {
        return 0.0; // insufficient data
    }
    // A uniform history cannot be flaky
    if pass_count == 0 || fail_count == 0 {
        return 0.0;
    }

    let n = f64::from(total);
    let sample_size_factor = (n / 20.0).min(1.0);

    let transition_rate = f64::from(transitions) / (n - 1.0);
    let transition_factor = (transition_rate * 2.0).min(1.0);

    // Wilson score interval at 95% confidence
    let p = f64::from(fail_count) / n;
    let z: f64 = 1.96;
    let denominator = 1.0 + z * z / n;
    let center = (p + z * z / (2.0 * n)) / denominator;
    let margin = z * ((p * (1.0 - p) + z * z / (4.0 * n)) / n).sqrt() / denominator;

    let interval_width = 2.0 * margin;
    let distance_from_edges = center.min(1.0 - center);
    let statistical_confidence = ((1.0 - interval_width) * distance_from_edges * 2.0).clamp(0.0, 1.0);

    (sample_size_factor * transition_factor * statistical_confidence).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestStatus::{Error, Fail, Pass};

    fn rows(name: &str, statuses: &[TestStatus]) -> Vec<(String, TestStatus)> {
        statuses.iter().map(|s| (name.to_string(), *s)).collect()
    }

    #[test]
    fn test_uniform_pass_is_stable_with_zero_confidence() {
        let record = classify_history(&[Pass; 10]);
        assert_eq!(record.confidence_score, 0.0);
        assert_eq!(record.classification, Classification::Stable);
        assert!(!record.is_suspect());
    }

    #[test]
    fn test_uniform_fail_is_always_failing_with_zero_confidence() {
        let record = classify_history(&[Fail; 5]);
        assert_eq!(record.confidence_score, 0.0);
        assert_eq!(record.classification, Classification::AlwaysFailing);
        assert!(record.is_suspect());
    }

    #[test]
    fn test_always_failing_needs_three_runs() {
        let record = classify_history(&[Fail, Fail]);
        assert_eq!(record.classification, Classification::Stable);

        let record = classify_history(&[Fail, Fail, Fail]);
        assert_eq!(record.classification, Classification::AlwaysFailing);
    }

    #[test]
    fn test_errors_count_as_failures() {
        let record = classify_history(&[Error, Error, Error]);
        assert_eq!(record.fail_count, 3);
        assert_eq!(record.classification, Classification::AlwaysFailing);
    }

    #[test]
    fn test_single_run_scores_zero() {
        let record = classify_history(&[Pass]);
        assert_eq!(record.total_runs, 1);
        assert_eq!(record.confidence_score, 0.0);
        assert_eq!(record.classification, Classification::Stable);
    }

    #[test]
    fn test_alternating_ten_runs_exact_statistics() {
        // pass/fail alternating: 5 passes, 5 fails, 9 transitions
        let statuses: Vec<TestStatus> = (0..10)
            .map(|i| if i % 2 == 0 { Pass } else { Fail })
            .collect();
        let record = classify_history(&statuses);

        assert_eq!(record.pass_count, 5);
        assert_eq!(record.fail_count, 5);
        assert_eq!(record.total_runs, 10);
        assert_eq!(record.transitions, 9);
        assert!((record.flake_rate - 0.5).abs() < 1e-12);

        // sample factor 0.5, transition factor 1.0, Wilson term ~0.47316
        assert!((record.confidence_score - 0.236_59).abs() < 1e-4);
        assert_eq!(record.classification, Classification::Stable);
    }

    #[test]
    fn test_long_alternating_history_is_truly_flaky() {
        // 40 runs of perfect alternation saturates the sample-size factor
        // and pushes the Wilson term past the threshold.
        let statuses: Vec<TestStatus> = (0..40)
            .map(|i| if i % 2 == 0 { Pass } else { Fail })
            .collect();
        let record = classify_history(&statuses);

        assert!(record.confidence_score >= FLAKY_CONFIDENCE_THRESHOLD);
        assert_eq!(record.classification, Classification::TrulyFlaky);
        assert!(record.is_suspect());
    }

    #[test]
    fn test_mixed_history_exact_counts() {
        let statuses = [Pass, Pass, Fail, Pass, Fail, Pass, Fail, Pass];
        let record = classify_history(&statuses);

        assert_eq!(record.pass_count, 5);
        assert_eq!(record.fail_count, 3);
        assert_eq!(record.total_runs, 8);
        assert_eq!(record.transitions, 6);
        assert!((record.flake_rate - 0.375).abs() < 1e-12);
        assert!((record.confidence_score - 0.147_14).abs() < 1e-4);
    }

    #[test]
    fn test_grouping_keeps_per_test_order() {
        let mut input = rows("a#t", &[Pass, Fail, Pass]);
        input.extend(rows("b#t", &[Pass, Pass, Pass]));

        let stats = compute_flakiness(&input);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["a#t"].transitions, 2);
        assert_eq!(stats["b#t"].transitions, 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_flakiness(&[]).is_empty());
    }

    #[test]
    fn test_confidence_never_exceeds_one() {
        // Brute sweep over small histories
        for n in 2..=30u32 {
            for fails in 1..n {
                let mut statuses = Vec::new();
                for i in 0..n {
                    statuses.push(if i < fails { Fail } else { Pass });
                }
                let record = classify_history(&statuses);
                assert!(record.confidence_score >= 0.0);
                assert!(record.confidence_score <= 1.0);
            }
        }
    }
}
