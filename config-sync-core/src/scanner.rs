//! Module for discovering configuration files under the config root.
//!
//! Every call to [`FileScanner::scan`] is a fresh, full walk; nothing is cached
//! between calls. Symbolic links are followed, so mounted or shared config files
//! are picked up. A file that cannot be read (including a dangling link) is
//! logged and skipped so one bad entry never aborts the rest of the walk.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::path_info::extension_of;

/// A raw file resource found by the scanner.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Path relative to the scan root, always `/`-separated.
    pub relative_path: String,
    pub content: Vec<u8>,
    pub modified: DateTime<Utc>,
}

#[derive(Debug)]
pub enum ScanError {
    Io(std::io::Error),
    OutsideRoot(PathBuf),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Io(e) => write!(f, "io error: {e}"),
            ScanError::OutsideRoot(p) => write!(f, "path {} is outside the scan root", p.display()),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        ScanError::Io(e)
    }
}

/// Walks a root directory and yields files with a recognised extension.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    fn matches(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        match extension_of(name) {
            Some(ext) => self.extensions.iter().any(|e| *e == ext),
            None => false,
        }
    }

    /// Walk the root and read every matching file, in file-name order.
    pub fn scan(&self) -> Vec<ScannedFile> {
        info!(root = %self.root.display(), extensions = ?self.extensions, "[SCAN] Scanning config files");

        if !self.root.is_dir() {
            warn!(root = %self.root.display(), "[SCAN] Config root is missing or not a directory");
            return Vec::new();
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "[SCAN] Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }
            match self.read_file(entry.path()) {
                Ok(file) => {
                    debug!(path = %file.relative_path, size = file.content.len(), "[SCAN] Read config file");
                    files.push(file);
                }
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "[SCAN] Failed to read config file, skipping");
                }
            }
        }

        info!(count = files.len(), "[SCAN] Scan complete");
        files
    }

    fn read_file(&self, path: &Path) -> Result<ScannedFile, ScanError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| ScanError::OutsideRoot(path.to_path_buf()))?;
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let content = std::fs::read(path)?;
        let modified = std::fs::metadata(path)?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(ScannedFile {
            relative_path,
            content,
            modified,
        })
    }
}
