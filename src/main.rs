use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use flakeradar::config::{self, Config};
use flakeradar::report;

#[derive(Parser)]
#[command(
    name = "flakeradar",
    about = "Flaky test detection, root-cause clustering, and time-to-fix tracking",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest result files, analyze flakiness, and emit reports
    Analyze {
        /// Project name label
        #[arg(long)]
        project: String,

        /// JUnit/TestNG XML result files
        #[arg(long, required = true, num_args = 1..)]
        results: Vec<PathBuf>,

        /// Build ID (CI)
        #[arg(long, default_value = "local-build")]
        build: String,

        /// Git commit SHA
        #[arg(long, default_value = "local")]
        commit: String,

        /// History database path (defaults to FLAKERADAR_DB_PATH or ~/.flakeradar/history.db)
        #[arg(long)]
        db: Option<PathBuf>,

        /// HTML report output path
        #[arg(long, default_value = "flakeradar_report.html")]
        report_out: PathBuf,

        /// Confidence bar for the flaky summary (display only)
        #[arg(long, default_value_t = config::DEFAULT_MIN_CONFIDENCE)]
        min_confidence: f64,

        /// Number of recent runs in the history window
        #[arg(long, default_value_t = config::DEFAULT_RUN_WINDOW)]
        run_window: usize,
    },

    /// Show the worst flaky offenders from tracked lifecycle data
    Offenders {
        /// Project name label
        #[arg(long)]
        project: String,

        /// Maximum number of tests to show
        #[arg(long, default_value_t = config::DEFAULT_OFFENDER_LIMIT)]
        limit: usize,

        /// History database path (defaults to FLAKERADAR_DB_PATH or ~/.flakeradar/history.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            project,
            results,
            build,
            commit,
            db,
            report_out,
            min_confidence,
            run_window,
        } => {
            tracing::info!(%project, files = results.len(), "Starting analysis");

            let mut cfg = Config::new(project, config::resolve_db_path(db));
            cfg.build_id = build;
            cfg.commit_sha = commit;
            cfg.min_confidence = min_confidence;
            cfg.run_window = run_window;

            let analysis = flakeradar::analyze_files(&cfg, &results)?;
            report::print_summary(&analysis, cfg.min_confidence);

            report::render_html(&analysis, &report_out)?;
            println!("\nReport written: {}", report_out.display());
        }
        Commands::Offenders { project, limit, db } => {
            let db_path = config::resolve_db_path(db);
            let offenders = flakeradar::worst_offenders(&db_path, &project, limit)?;

            if offenders.is_empty() {
                println!("No flaky lifecycle data for project '{}'.", project);
            } else {
                println!(
                    "{:<60} | {:>10} | {:>8} | Status",
                    "Test", "Days", "Failures"
                );
                println!("{:-<60}-|-{:-<10}-|-{:-<8}-|------------", "", "", "");
                for o in offenders {
                    let status = if o.record.is_open() { "Still Flaky" } else { "Fixed" };
                    println!(
                        "{:<60} | {:>10} | {:>8} | {}",
                        o.record.full_name, o.current_days_flaky, o.record.cumulative_failures, status
                    );
                }
            }
        }
    }

    Ok(())
}
