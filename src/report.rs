use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::counter::FrozenCounts;
use crate::pool::{TaskResult, WorkerPool};

/// One `(value, count)` line of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub value: String,
    pub count: u64,
}

/// Sorted value counts for a single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub attribute: String,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Rows are ordered by count descending, then by value so output is reproducible.
    pub fn from_counts(attribute: impl Into<String>, values: HashMap<String, u64>) -> Self {
        let mut rows: Vec<ReportRow> = values
            .into_iter()
            .map(|(value, count)| ReportRow { value, count })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        Self {
            attribute: attribute.into(),
            rows,
        }
    }

    /// Render as the `<statistics>` document. Values are written verbatim.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(16 + self.rows.len() * 64);
        xml.push_str("<statistics>\n");
        for row in &self.rows {
            xml.push_str("  <item>\n   <value>");
            xml.push_str(&row.value);
            xml.push_str("</value>\n   <count>");
            xml.push_str(&row.count.to_string());
            xml.push_str("</count>\n  </item>\n");
        }
        xml.push_str("</statistics>");
        xml
    }
}

/// `statistics_by_<attribute>.xml`
pub fn report_file_name(attribute: &str) -> String {
    format!("statistics_by_{attribute}.xml")
}

/// Configuration for the report phase
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Directory the report files are created in
    pub output_dir: PathBuf,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportStatus {
    Written { path: String, rows: usize },
    Failed { error: String },
    TimedOut,
}

/// Per-attribute report outcome
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub attribute: String,
    #[serde(flatten)]
    pub status: ReportStatus,
}

impl ReportOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self.status, ReportStatus::Written { .. })
    }
}

/// Write one report to `path` with buffered async I/O.
pub async fn write_report(path: &Path, report: &Report) -> Result<()> {
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(report.to_xml().as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .await
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

/// Writes one report per attribute in `counts`, each as its own task on `pool`.
///
/// Must only be called with counts from a finished extraction phase. Each
/// task owns its attribute's rows; a failed write is logged and reported in
/// its [`ReportOutcome`] without affecting the other attributes.
pub async fn write_reports(
    counts: &FrozenCounts,
    pool: &WorkerPool,
    options: &ReportOptions,
) -> Vec<ReportOutcome> {
    let mut group = pool.group();
    for attribute in counts.attributes() {
        let Some(values) = counts.values(&attribute) else {
            continue;
        };
        let report = Report::from_counts(attribute.clone(), values);
        let path = options.output_dir.join(report_file_name(&attribute));

        group.spawn(attribute, async move {
            match write_report(&path, &report).await {
                Ok(()) => {
                    debug!("Wrote {} rows to {}", report.rows.len(), path.display());
                    ReportStatus::Written {
                        path: path.display().to_string(),
                        rows: report.rows.len(),
                    }
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    warn!("Report for {} not written: {}", report.attribute, error);
                    ReportStatus::Failed { error }
                }
            }
        });
    }

    let outcomes: Vec<ReportOutcome> = group
        .join()
        .await
        .into_iter()
        .map(|report| {
            let status = match report.result {
                TaskResult::Completed(status) => status,
                TaskResult::Panicked(reason) => {
                    warn!("Report task for {} panicked: {}", report.label, reason);
                    ReportStatus::Failed { error: reason }
                }
                TaskResult::TimedOut => {
                    warn!("Report for {} timed out", report.label);
                    ReportStatus::TimedOut
                }
            };
            ReportOutcome {
                attribute: report.label,
                status,
            }
        })
        .collect();

    let written = outcomes.iter().filter(|o| o.is_written()).count();
    info!(
        "Report phase completed: {} written, {} failed",
        written,
        outcomes.len() - written
    );
    outcomes
}
