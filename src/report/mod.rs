//! Report rendering -- console summary and standalone HTML.

use crate::analysis::clustering::recommend;
use crate::analysis::runner::AnalysisReport;
use anyhow::{Context, Result};
use askama::Template;
use std::path::Path;

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    project: String,
    generated_at: String,
    total_executions: usize,
    flaky_count: usize,
    tests: Vec<TestRowView>,
    offenders: Vec<OffenderView>,
    clusters: Vec<ClusterView>,
}

struct TestRowView {
    full_name: String,
    pass_count: u32,
    fail_count: u32,
    total_runs: u32,
    transitions: u32,
    flake_rate_pct: String,
    confidence: String,
    classification: &'static str,
    suspect: bool,
}

struct OffenderView {
    full_name: String,
    days_flaky: i64,
    failures: i64,
    status: &'static str,
}

struct ClusterView {
    signature: String,
    severity: String,
    count: usize,
    affected: usize,
    keywords: String,
    stack_pattern: String,
    recommendation: &'static str,
}

fn unix_to_rfc3339(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn build_template(report: &AnalysisReport) -> ReportTemplate {
    let tests = report
        .tests
        .iter()
        .map(|row| TestRowView {
            full_name: row.full_name.clone(),
            pass_count: row.stats.pass_count,
            fail_count: row.stats.fail_count,
            total_runs: row.stats.total_runs,
            transitions: row.stats.transitions,
            flake_rate_pct: format!("{:.1}%", row.stats.flake_rate * 100.0),
            confidence: format!("{:.2}", row.stats.confidence_score),
            classification: row.stats.classification.as_str(),
            suspect: row.stats.is_suspect(),
        })
        .collect();

    let offenders = report
        .worst_offenders
        .iter()
        .map(|o| OffenderView {
            full_name: o.record.full_name.clone(),
            days_flaky: o.current_days_flaky,
            failures: o.record.cumulative_failures,
            status: if o.record.is_open() { "Still Flaky" } else { "Fixed" },
        })
        .collect();

    let clusters = report
        .clusters
        .iter()
        .map(|c| ClusterView {
            signature: c.signature.clone(),
            severity: c.severity.to_string(),
            count: c.count,
            affected: c.affected_tests.len(),
            keywords: c.common_keywords.join(", "),
            stack_pattern: c.stack_pattern.clone(),
            recommendation: recommend(&c.signature),
        })
        .collect();

    ReportTemplate {
        project: report.project.clone(),
        generated_at: unix_to_rfc3339(report.generated_at),
        total_executions: report.total_executions,
        flaky_count: report.flaky_count,
        tests,
        offenders,
        clusters,
    }
}

/// Render the standalone HTML report.
pub fn render_html(report: &AnalysisReport, out_path: &Path) -> Result<()> {
    let html = build_template(report)
        .render()
        .context("rendering HTML report")?;
    std::fs::write(out_path, html)
        .with_context(|| format!("writing report to {}", out_path.display()))?;
    Ok(())
}

/// Print the CLI summary: per-test table, worst offenders, and clusters.
pub fn print_summary(report: &AnalysisReport, min_confidence: f64) {
    println!(
        "\nFlakeRadar analysis for '{}' (run #{}): {} executions, {} suspect tests",
        report.project, report.run_id, report.total_executions, report.flaky_count
    );

    println!(
        "\n{:<60} | {:>5} | {:>5} | {:>5} | {:>5} | {:>7} | Flaky?",
        "Test", "Pass", "Fail", "Total", "Trans", "Rate"
    );
    println!(
        "{:-<60}-|-{:-<5}-|-{:-<5}-|-{:-<5}-|-{:-<5}-|-{:-<7}-|-------",
        "", "", "", "", "", ""
    );
    for row in report.tests.iter().take(50) {
        println!(
            "{:<60} | {:>5} | {:>5} | {:>5} | {:>5} | {:>6.1}% | {}",
            row.full_name,
            row.stats.pass_count,
            row.stats.fail_count,
            row.stats.total_runs,
            row.stats.transitions,
            row.stats.flake_rate * 100.0,
            if row.stats.is_suspect() { "YES" } else { "NO" }
        );
    }

    let high_confidence = report.flaky_at(min_confidence).count();
    println!(
        "\nSuspect tests at confidence >= {:.2}: {}",
        min_confidence, high_confidence
    );

    if !report.worst_offenders.is_empty() {
        println!("\nWorst flaky offenders (time-to-fix):");
        for o in report.worst_offenders.iter().take(5) {
            let status = if o.record.is_open() { "Still Flaky" } else { "Fixed" };
            println!(
                "  {}: {} days flaky, {} failures ({})",
                o.record.full_name, o.current_days_flaky, o.record.cumulative_failures, status
            );
        }
    }

    if !report.clusters.is_empty() {
        println!("\nRoot cause clusters:");
        for c in report.clusters.iter().take(3) {
            println!(
                "  [{}] {}: {} failures, {} tests affected",
                c.severity,
                c.signature,
                c.count,
                c.affected_tests.len()
            );
            println!("      -> {}", recommend(&c.signature));
        }
    }
}
