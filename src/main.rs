use anyhow::Result;
use attrstats::{AttributeSet, RunConfig};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "attrstats")]
#[command(about = "Counts attribute values across a directory of JSON files and writes XML statistics")]
#[command(version)]
struct Args {
    /// Directory containing *.json files (not searched recursively)
    root_dir: PathBuf,

    /// Comma-separated attribute names, e.g. genre,author
    attributes: String,

    /// Directory the statistics_by_<attribute>.xml files are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Worker pool size (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Abort stragglers when a phase takes longer than this
    #[arg(long)]
    phase_timeout_secs: Option<u64>,

    /// Exit with an error if any file fails to parse
    #[arg(long)]
    fail_fast: bool,

    /// Suppress console progress bar
    #[arg(long)]
    no_progress: bool,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats_out: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    info!("Starting attrstats");
    info!(?args, "Parsed CLI arguments");

    // WHY: the directory check runs before any worker starts
    if !args.root_dir.is_dir() {
        anyhow::bail!("Root path is not a directory: {}", args.root_dir.display());
    }

    let attributes = AttributeSet::parse(&args.attributes);
    if attributes.is_empty() {
        info!("Attribute list is empty; no reports will be produced");
    }

    let mut config = RunConfig::new(args.root_dir.clone(), attributes);
    config.output_dir = args.output_dir.clone();
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.phase_timeout = args.phase_timeout_secs.map(Duration::from_secs);
    config.fail_fast = args.fail_fast;
    config.show_progress = !args.no_progress && std::io::stderr().is_terminal();

    let summary = attrstats::run(&config).await?;

    if let Some(ref stats_out) = args.stats_out {
        summary.save(stats_out).await?;
        info!("Run statistics written to {}", stats_out.display());
    }

    println!("attrstats v{} - run complete", env!("CARGO_PKG_VERSION"));
    println!(
        "Files processed: {}, failed: {}",
        summary.files_processed,
        summary.files_failed + summary.files_timed_out
    );
    for report in &summary.reports {
        match &report.status {
            attrstats::ReportStatus::Written { path, rows } => {
                println!("Statistics file created: {path} ({rows} values)");
            }
            attrstats::ReportStatus::Failed { error } => {
                println!("Statistics for '{}' not written: {error}", report.attribute);
            }
            attrstats::ReportStatus::TimedOut => {
                println!("Statistics for '{}' timed out", report.attribute);
            }
        }
    }

    Ok(())
}
