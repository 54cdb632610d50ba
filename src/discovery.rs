use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// True when the file name ends in `.json`, ignoring case
pub fn is_json_file_name(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Lists the regular `*.json` files directly inside `root_dir`.
///
/// Subdirectories are not descended into. Entries whose metadata cannot be
/// read are logged and skipped. The result is sorted by path.
///
/// # Errors
/// Fails when the directory cannot be opened or reading its entries fails
/// partway through, so a run never proceeds on a partial file list.
pub async fn discover_json_files(root_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root_dir = root_dir.as_ref();
    debug!("Listing JSON files in: {}", root_dir.display());

    let entries = fs::read_dir(root_dir)
        .await
        .with_context(|| format!("Cannot list directory {}", root_dir.display()))?;
    collect_json_files(root_dir, entries).await
}

/// Something that yields directory entry paths one at a time
trait EntrySource {
    async fn next_path(&mut self) -> io::Result<Option<PathBuf>>;
}

impl EntrySource for fs::ReadDir {
    async fn next_path(&mut self) -> io::Result<Option<PathBuf>> {
        Ok(self.next_entry().await?.map(|entry| entry.path()))
    }
}

async fn collect_json_files(root_dir: &Path, mut entries: impl EntrySource) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    while let Some(path) = entries
        .next_path()
        .await
        .with_context(|| format!("Failed while listing directory {}", root_dir.display()))?
    {
        if !is_json_file_name(&path) {
            continue;
        }

        // WHY: follow symlinks so a linked *.json file counts as a regular file
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {
                debug!("Found matching file: {}", path.display());
                files.push(path);
            }
            Ok(_) => debug!("Skipping non-file entry: {}", path.display()),
            Err(e) => warn!("Cannot access {} (skipping): {}", path.display(), e),
        }
    }

    files.sort();
    info!("Discovered {} JSON files in {}", files.len(), root_dir.display());
    Ok(files)
}
