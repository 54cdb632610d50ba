pub mod attributes;
pub mod counter;
pub mod discovery;
pub mod dispatch;
pub mod extractor;
pub mod pipeline;
pub mod pool;
pub mod report;

// Re-export main types for convenient access
pub use attributes::AttributeSet;
pub use counter::{AttributeCounter, FrozenCounts};
pub use extractor::{ExtractStats, Extractor};
pub use pool::{CancelFlag, WorkerPool};

// Re-export phase entry points
pub use dispatch::{extract_directory, extract_files, ExtractOptions, ExtractionPhase, FileOutcome, FileStatus};
pub use pipeline::{run, RunConfig, RunSummary};
pub use report::{report_file_name, write_reports, Report, ReportOptions, ReportOutcome, ReportRow, ReportStatus};
