mod classify;
mod config;
mod metrics;
mod report;
mod session;

use clap::Parser;
use config::{AnalyzerConfig, ReportFormat};
use report::Report;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "worklens.toml";

const RED: &str = "\x1b[0;31m";
const GREEN: &str = "\x1b[0;32m";
const NC: &str = "\x1b[0m";

/// A Rust CLI tool that analyzes a multi-worker download job log:
/// per-worker task throughput, wall-clock utilization, wasted time,
/// and straggler detection.
#[derive(Parser, Debug)]
#[command(name = "worklens", version, about)]
pub struct Cli {
    /// Log file to analyze (overrides config)
    #[arg(value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Config file path (default: worklens.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wasted-time warning threshold in seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    warn_threshold: Option<u64>,

    /// Report format (overrides config)
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-line classification, dropped events)
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = match config::load(&config_path, cli.config.is_some()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{RED}Error: {e}{NC}");
            std::process::exit(1);
        }
    };
    config.apply_overrides(cli.log_file, cli.warn_threshold, cli.format);

    if cli.dry_run {
        print_resolved(&config, &config_path);
        return;
    }

    if let Err(e) = run(&config) {
        eprintln!("{RED}Error: {e}{NC}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    // RUST_LOG wins over the flag-derived level when set.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: &AnalyzerConfig) -> Result<(), String> {
    let path = config.input.log_file.as_path();
    let reader = session::open_log(path).map_err(|e| e.to_string())?;
    match config.report.format {
        ReportFormat::Text => run_text(path, reader, config),
        ReportFormat::Json => run_json(path, reader, config),
    }
}

/// Text mode: banner first, notices streamed mid-pass, sections after.
fn run_text(path: &Path, reader: impl BufRead, config: &AnalyzerConfig) -> Result<(), String> {
    println!("--- Analyzing {} ---\n", path.display());
    let session = session::analyze_reader(reader, |notice| {
        println!("{GREEN}{}{NC}", report::render_notice(&notice));
    })
    .map_err(|e| e.to_string())?;
    let metrics = metrics::compute(&session, &config.thresholds);
    let report = Report::new(path, Vec::new(), &session, metrics);
    print!("{}", report::render_sections(&report));
    Ok(())
}

/// JSON mode: nothing prints until the pass finishes, then one document.
fn run_json(path: &Path, reader: impl BufRead, config: &AnalyzerConfig) -> Result<(), String> {
    let mut notices = Vec::new();
    let session = session::analyze_reader(reader, |notice| notices.push(notice))
        .map_err(|e| e.to_string())?;
    let metrics = metrics::compute(&session, &config.thresholds);
    let report = Report::new(path, notices, &session, metrics);
    let json =
        report::render_json(&report).map_err(|e| format!("cannot serialize report: {e}"))?;
    println!("{json}");
    Ok(())
}

fn print_resolved(config: &AnalyzerConfig, config_path: &Path) {
    println!("worklens v{}", env!("CARGO_PKG_VERSION"));
    println!("Config file: {}", config_path.display());
    println!("Log file: {}", config.input.log_file.display());
    println!(
        "Wasted-time warn threshold: {}s",
        config.thresholds.wasted_warn_secs
    );
    println!("Report format: {}", config.report.format);
    println!("Dry run: config validated, not analyzing.");
}
