//! Root-cause clustering of failing executions.
//!
//! Groups one run's failures by a signature inferred from error text and
//! stack traces. Pure: works over the batch it is given, no persistence.

use crate::model::TestCaseResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

/// Ordered category table; earlier rows take priority, so a message that
/// mentions both "timeout" and "network" lands in database_connectivity.
/// Match order is load-bearing -- do not sort or reorder.
const SIGNATURE_RULES: &[(&str, &[&str])] = &[
    (
        "database_connectivity",
        &["connection", "timeout", "pool", "database", "sql", "jdbc"],
    ),
    (
        "network_api_issues",
        &["network", "http", "api", "socket", "connection refused", "unreachable"],
    ),
    (
        "timing_race_conditions",
        &["timeout", "wait", "sleep", "race", "timing", "async", "thread"],
    ),
    (
        "resource_constraints",
        &["memory", "disk", "cpu", "resource", "limit", "quota", "space"],
    ),
    (
        "auth_permission_issues",
        &["auth", "permission", "unauthorized", "forbidden", "token", "credential"],
    ),
    (
        "data_state_issues",
        &["data", "state", "null", "empty", "missing", "not found", "invalid"],
    ),
    (
        "environment_config",
        &["config", "environment", "property", "setting", "variable"],
    ),
];

/// Common English words excluded from keyword extraction.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "had", "with", "have", "this", "will", "his", "they", "from", "been", "said", "each", "which",
    "their", "time", "were", "way", "about", "would", "there", "could", "other", "after", "first",
    "well", "water", "call", "who", "may", "down", "side", "now", "find", "head", "long", "too",
    "any", "say", "she", "use", "how", "when", "much", "these", "your", "many",
];

/// Impact tier for a failure cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One group of failing executions sharing an inferred root cause.
#[derive(Debug, Clone, Serialize)]
pub struct FailureCluster {
    pub signature: String,
    pub count: usize,
    pub affected_tests: BTreeSet<String>,
    pub error_types: BTreeSet<String>,
    /// Top keywords from the group's error messages, most frequent first.
    pub common_keywords: Vec<String>,
    pub stack_pattern: String,
    pub severity: Severity,
}

/// Cluster the failing executions of a single run by root-cause signature.
pub fn cluster_failures(results: &[TestCaseResult]) -> HashMap<String, FailureCluster> {
    let mut groups: HashMap<String, Vec<&TestCaseResult>> = HashMap::new();
    for result in results.iter().filter(|r| r.status.is_fail_like()) {
        groups
            .entry(extract_signature(result))
            .or_default()
            .push(result);
    }

    groups
        .into_iter()
        .map(|(signature, failures)| {
            let affected_tests: BTreeSet<String> =
                failures.iter().map(|f| f.full_name.clone()).collect();
            let error_types: BTreeSet<String> = failures
                .iter()
                .filter_map(|f| f.error_type.clone())
                .collect();
            let messages: Vec<&str> = failures
                .iter()
                .filter_map(|f| f.error_message.as_deref())
                .collect();
            let traces: Vec<&str> = failures
                .iter()
                .filter_map(|f| f.error_details.as_deref())
                .collect();

            let severity = cluster_severity(affected_tests.len(), failures.len());
            let cluster = FailureCluster {
                signature: signature.clone(),
                count: failures.len(),
                affected_tests,
                error_types,
                common_keywords: extract_common_keywords(&messages),
                stack_pattern: extract_stack_pattern(&traces),
                severity,
            };
            (signature, cluster)
        })
        .collect()
}

/// Signature representing the root-cause category of one failure.
/// Categories are checked in priority order, first match wins.
pub fn extract_signature(result: &TestCaseResult) -> String {
    let message = result
        .error_message
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    for (signature, keywords) in SIGNATURE_RULES {
        if keywords.iter().any(|k| message.contains(k)) {
            return (*signature).to_string();
        }
    }

    if let Some(error_type) = result.error_type.as_deref() {
        if !error_type.is_empty() {
            let last = error_type.rsplit('.').next().unwrap_or(error_type);
            return format!("error_type_{}", last.to_lowercase());
        }
    }

    "unknown_error_pattern".to_string()
}

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z][a-z0-9_]{2,}\b").expect("hardcoded pattern compiles"))
}

fn exception_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][a-zA-Z]*Exception)\b").expect("hardcoded pattern compiles")
    })
}

/// Top five meaningful words across the group's error messages, ranked by
/// frequency with ties broken by first appearance.
fn extract_common_keywords(messages: &[&str]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut index = 0usize;

    for msg in messages {
        let lowered = msg.to_lowercase();
        for m in word_pattern().find_iter(&lowered) {
            let word = m.as_str();
            if STOP_WORDS.contains(&word) {
                continue;
            }
            *counts.entry(word.to_string()).or_insert(0) += 1;
            first_seen.entry(word.to_string()).or_insert(index);
            index += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(a_word, a_count), (b_word, b_count)| {
        b_count
            .cmp(a_count)
            .then_with(|| first_seen[a_word].cmp(&first_seen[b_word]))
    });
    ranked.into_iter().take(5).map(|(word, _)| word).collect()
}

/// Most frequent `<Name>Exception` token across the group's stack traces.
fn extract_stack_pattern(traces: &[&str]) -> String {
    let traces: Vec<&str> = traces.iter().copied().filter(|t| !t.is_empty()).collect();
    if traces.is_empty() {
        return "no_stack_trace".to_string();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut index = 0usize;
    for trace in &traces {
        for m in exception_pattern().find_iter(trace) {
            let class = m.as_str();
            *counts.entry(class).or_insert(0) += 1;
            first_seen.entry(class).or_insert(index);
            index += 1;
        }
    }

    let best = counts
        .into_iter()
        .max_by(|(a_class, a_count), (b_class, b_count)| {
            a_count
                .cmp(b_count)
                .then_with(|| first_seen[b_class].cmp(&first_seen[a_class]))
        });

    match best {
        Some((class, _)) => format!("exception_{}", class.to_lowercase()),
        None => "generic_stack_trace".to_string(),
    }
}

/// Severity from failure spread (distinct tests) and volume (executions).
fn cluster_severity(distinct_tests: usize, failure_count: usize) -> Severity {
    if distinct_tests >= 5 && failure_count >= 10 {
        Severity::Critical
    } else if distinct_tests >= 3 && failure_count >= 5 {
        Severity::High
    } else if distinct_tests >= 2 || failure_count >= 3 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Remediation hint for a cluster signature.
pub fn recommend(signature: &str) -> &'static str {
    match signature {
        "database_connectivity" => {
            "Check connection pool settings, database server health, and network connectivity"
        }
        "network_api_issues" => {
            "Verify API endpoints, check network connectivity, review timeout settings"
        }
        "timing_race_conditions" => {
            "Add proper waits, review async operations, check for race conditions"
        }
        "resource_constraints" => {
            "Monitor memory/CPU usage, check disk space, review resource limits"
        }
        "auth_permission_issues" => {
            "Verify credentials, check permissions, review token expiration"
        }
        "data_state_issues" => {
            "Check data consistency, review null handling, verify test data setup"
        }
        "environment_config" => {
            "Review environment variables, check configuration files, verify settings"
        }
        _ => "Manual investigation required",
    }
}
