use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::attributes::AttributeSet;
use crate::dispatch::{extract_directory, ExtractOptions, FileOutcome, FileStatus};
use crate::pool::WorkerPool;
use crate::report::{write_reports, ReportOptions, ReportOutcome};

/// Everything a run needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root_dir: PathBuf,
    pub attributes: AttributeSet,
    /// Directory for `statistics_by_<attribute>.xml` files
    pub output_dir: PathBuf,
    /// Concurrent jobs per phase
    pub workers: usize,
    /// Liveness bound on each phase barrier
    pub phase_timeout: Option<Duration>,
    pub fail_fast: bool,
    pub show_progress: bool,
}

impl RunConfig {
    pub fn new(root_dir: impl Into<PathBuf>, attributes: AttributeSet) -> Self {
        Self {
            root_dir: root_dir.into(),
            attributes,
            output_dir: PathBuf::from("."),
            workers: num_cpus::get(),
            phase_timeout: None,
            fail_fast: false,
            show_progress: false,
        }
    }
}

/// Aggregate run statistics, serializable as the stats file
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    /// Unix timestamp (seconds) the run started at
    pub run_start: u64,
    pub total_processing_time_ms: u64,
    pub workers: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_timed_out: usize,
    pub total_occurrences: u64,
    pub reports_written: usize,
    pub reports_failed: usize,
    pub file_stats: Vec<FileOutcome>,
    pub reports: Vec<ReportOutcome>,
}

impl RunSummary {
    /// Write as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write stats file {}", path.display()))?;
        Ok(())
    }
}

/// Extract every file under `config.root_dir`, then write one report per
/// matched attribute.
///
/// The report phase starts only after every extraction task has been joined.
/// Per-file and per-report failures are recorded in the summary; the run
/// itself fails only when the directory cannot be listed (or, with
/// `fail_fast`, when a file failed).
pub async fn run(config: &RunConfig) -> Result<RunSummary> {
    let run_start = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let start = Instant::now();

    let pool = WorkerPool::new(config.workers).with_phase_timeout(config.phase_timeout);
    let attributes = Arc::new(config.attributes.clone());
    info!(
        "Counting {} attributes in {} with {} workers",
        attributes.len(),
        config.root_dir.display(),
        pool.size()
    );

    let extract_options = ExtractOptions {
        fail_fast: config.fail_fast,
        show_progress: config.show_progress,
    };
    let extraction = extract_directory(&config.root_dir, attributes, &pool, &extract_options).await?;

    let report_options = ReportOptions {
        output_dir: config.output_dir.clone(),
    };
    let reports = write_reports(&extraction.counts, &pool, &report_options).await;

    let count_status = |status: FileStatus| {
        extraction.files.iter().filter(|f| f.status == status).count()
    };
    let reports_written = reports.iter().filter(|r| r.is_written()).count();

    let summary = RunSummary {
        run_start,
        total_processing_time_ms: start.elapsed().as_millis() as u64,
        workers: pool.size(),
        files_processed: count_status(FileStatus::Success),
        files_failed: count_status(FileStatus::Failed),
        files_timed_out: count_status(FileStatus::TimedOut),
        total_occurrences: extraction.counts.total_occurrences(),
        reports_written,
        reports_failed: reports.len() - reports_written,
        file_stats: extraction.files,
        reports,
    };

    info!(
        "Run completed in {}ms: {} files processed, {} failed, {} reports written",
        summary.total_processing_time_ms,
        summary.files_processed,
        summary.files_failed + summary.files_timed_out,
        summary.reports_written
    );
    Ok(summary)
}
