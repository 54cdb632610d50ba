use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::attributes::AttributeSet;
use crate::counter::{AttributeCounter, FrozenCounts};
use crate::discovery::discover_json_files;
use crate::extractor::Extractor;
use crate::pool::{CancelFlag, TaskResult, WorkerPool};

/// Configuration for the extraction phase
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Abort the run after the barrier if any file failed
    pub fail_fast: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    Failed,
    TimedOut,
}

/// Per-file extraction outcome
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileOutcome {
    pub path: String,
    pub status: FileStatus,
    /// Top-level objects walked
    pub objects: u64,
    /// Values recorded, including a prefix recorded before a failure
    pub occurrences: u64,
    pub processing_time_ms: u64,
    pub error: Option<String>,
}

impl FileOutcome {
    fn unfinished(path: String, status: FileStatus, error: Option<String>) -> Self {
        Self {
            path,
            status,
            objects: 0,
            occurrences: 0,
            processing_time_ms: 0,
            error,
        }
    }
}

/// Everything the extraction phase hands to the report phase
#[derive(Debug)]
pub struct ExtractionPhase {
    pub counts: FrozenCounts,
    pub files: Vec<FileOutcome>,
}

impl ExtractionPhase {
    pub fn failed_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.status != FileStatus::Success)
    }
}

/// Lists `root_dir` and extracts every JSON file in it on `pool`.
///
/// Returns once every extraction task has finished, so the counts in the
/// returned phase are complete. A failing file is logged and recorded in its
/// [`FileOutcome`]; it never stops the other files.
///
/// # Errors
/// Fails when `root_dir` cannot be listed, or with `fail_fast` set when any
/// file failed.
pub async fn extract_directory(
    root_dir: impl AsRef<Path>,
    attributes: Arc<AttributeSet>,
    pool: &WorkerPool,
    options: &ExtractOptions,
) -> Result<ExtractionPhase> {
    let files = discover_json_files(root_dir).await?;
    let phase = extract_files(files, attributes, pool, options).await;

    if options.fail_fast {
        if let Some(failed) = phase.failed_files().next() {
            anyhow::bail!(
                "Extraction failed for {}: {}",
                failed.path,
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    Ok(phase)
}

/// Runs one extraction task per file and waits for all of them.
pub async fn extract_files(
    files: Vec<PathBuf>,
    attributes: Arc<AttributeSet>,
    pool: &WorkerPool,
    options: &ExtractOptions,
) -> ExtractionPhase {
    let phase_start = Instant::now();
    let counter = Arc::new(AttributeCounter::new());
    let progress = progress_bar(files.len() as u64, options.show_progress);

    info!(
        "Starting extraction of {} files with {} workers",
        files.len(),
        pool.size()
    );

    let mut group = pool.group();
    let cancel = group.cancel_flag();
    for path in files {
        let attributes = Arc::clone(&attributes);
        let counter = Arc::clone(&counter);
        let progress = progress.clone();
        let cancel = cancel.clone();
        group.spawn_blocking(path.display().to_string(), move || {
            let outcome = extract_one(&path, &attributes, &counter, cancel);
            progress.inc(1);
            outcome
        });
    }

    // Barrier: no extraction job is running past this point.
    let reports = group.join().await;
    progress.finish_and_clear();

    let outcomes: Vec<FileOutcome> = reports
        .into_iter()
        .map(|report| match report.result {
            TaskResult::Completed(outcome) => outcome,
            TaskResult::Panicked(reason) => {
                warn!("Extraction task for {} panicked: {}", report.label, reason);
                FileOutcome::unfinished(report.label, FileStatus::Failed, Some(reason))
            }
            TaskResult::TimedOut => {
                warn!("Extraction of {} timed out", report.label);
                FileOutcome::unfinished(
                    report.label,
                    FileStatus::TimedOut,
                    Some("extraction timed out".to_string()),
                )
            }
        })
        .collect();

    let counts = AttributeCounter::freeze(counter).unwrap_or_else(|shared| {
        // Jobs drop their handle when they return, so this only happens if one leaked it.
        warn!("Counter still shared after the extraction barrier; copying its counts");
        shared.copy_counts()
    });

    let failed = outcomes.iter().filter(|f| f.status != FileStatus::Success).count();
    info!(
        "Extraction completed in {}ms: {} files succeeded, {} failed, {} attributes matched",
        phase_start.elapsed().as_millis(),
        outcomes.len() - failed,
        failed,
        counts.attributes().len()
    );

    ExtractionPhase {
        counts,
        files: outcomes,
    }
}

/// Extract a single file, turning any error into a failed outcome.
fn extract_one(
    path: &Path,
    attributes: &AttributeSet,
    counter: &AttributeCounter,
    cancel: CancelFlag,
) -> FileOutcome {
    let start = Instant::now();
    let mut extractor = Extractor::new(attributes, counter).with_cancel_flag(cancel);
    let result = extractor.extract_file(path);
    let stats = extractor.stats();

    let (status, error) = match result {
        Ok(()) => {
            debug!(
                "Extracted {}: {} objects, {} occurrences",
                path.display(),
                stats.objects,
                stats.occurrences
            );
            (FileStatus::Success, None)
        }
        Err(e) => {
            let error = format!("{e:#}");
            warn!(
                "Skipping rest of {} after {} occurrences: {}",
                path.display(),
                stats.occurrences,
                error
            );
            (FileStatus::Failed, Some(error))
        }
    };

    FileOutcome {
        path: path.display().to_string(),
        status,
        objects: stats.objects,
        occurrences: stats.occurrences,
        processing_time_ms: start.elapsed().as_millis() as u64,
        error,
    }
}

fn progress_bar(len: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} files ({eta})") {
        bar.set_style(style);
    }
    bar
}
