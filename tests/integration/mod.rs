// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests

#![allow(dead_code)]

pub mod fixtures;

use attrstats::{AttributeSet, RunConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test fixture with separate input and output directories
pub struct TestFixture {
    pub input_dir: TempDir,
    pub output_dir: TempDir,
    pub root_path: PathBuf,
    pub out_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directories
    pub fn new() -> Self {
        let input_dir = TempDir::new().expect("Failed to create input directory");
        let output_dir = TempDir::new().expect("Failed to create output directory");
        let root_path = input_dir.path().to_path_buf();
        let out_path = output_dir.path().to_path_buf();

        Self {
            input_dir,
            output_dir,
            root_path,
            out_path,
        }
    }

    /// Create an input file with given content
    pub fn create_json_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    /// Run configuration reading from the input and writing to the output directory
    pub fn config(&self, attributes: &str, workers: usize) -> RunConfig {
        let mut config = RunConfig::new(self.root_path.clone(), AttributeSet::parse(attributes));
        config.output_dir = self.out_path.clone();
        config.workers = workers;
        config
    }

    pub fn report_path(&self, attribute: &str) -> PathBuf {
        self.out_path.join(attrstats::report_file_name(attribute))
    }

    /// Parsed rows of a written report, in file order
    pub fn read_report(&self, attribute: &str) -> Vec<(String, u64)> {
        let xml = fs::read_to_string(self.report_path(attribute)).expect("Failed to read report");
        parse_report(&xml)
    }

    /// Names of every file in the output directory, sorted
    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.out_path)
            .expect("Failed to list output directory")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

/// Pull `(value, count)` rows out of a statistics document
pub fn parse_report(xml: &str) -> Vec<(String, u64)> {
    let mut rows = Vec::new();
    let mut value = None;
    for line in xml.lines().map(str::trim) {
        if let Some(v) = line.strip_prefix("<value>").and_then(|l| l.strip_suffix("</value>")) {
            value = Some(v.to_string());
        } else if let Some(c) = line.strip_prefix("<count>").and_then(|l| l.strip_suffix("</count>")) {
            let count = c.parse().expect("count should be an integer");
            rows.push((value.take().expect("count without value"), count));
        }
    }
    rows
}

/// Sort rows by value for order-insensitive comparison
pub fn sorted(mut rows: Vec<(String, u64)>) -> Vec<(String, u64)> {
    rows.sort();
    rows
}

pub fn rows(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
    sorted(pairs.iter().map(|(v, c)| (v.to_string(), *c)).collect())
}
