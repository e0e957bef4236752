// Raw-file lifecycle: space accounting and age-based eviction for the
// upload directory. Deliberately decoupled from the vector index; deleting
// a raw file never invalidates already-indexed chunks.


use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::Result;

/// Fixed eviction policy; files older than this are deleted by cleanup.
pub const RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub files: Vec<StoredFile>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CleanupReport {
    pub deleted_files: usize,
    pub freed_space_bytes: u64,
}

/// Accounts for and ages out raw uploaded files. All operations tolerate a
/// missing upload directory (nothing uploaded yet).
#[derive(Debug, Clone)]
pub struct StorageManager {
    upload_dir: PathBuf,
}

impl StorageManager {
    #[inline]
    pub fn new(upload_dir: &Path) -> Self {
        Self {
            upload_dir: upload_dir.to_path_buf(),
        }
    }

    #[inline]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Enumerate the upload directory. Read-only; never mutates anything.
    #[inline]
    pub fn stats(&self) -> Result<StorageStats> {
        let mut files = Vec::new();
        let mut total_size_bytes = 0u64;

        for (path, metadata) in self.regular_files()? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let modified = metadata.modified().map(DateTime::<Utc>::from)?;

            total_size_bytes += metadata.len();
            files.push(StoredFile {
                name,
                size_bytes: metadata.len(),
                size_mb: metadata.len() as f64 / (1024.0 * 1024.0),
                modified,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(StorageStats {
            total_files: files.len(),
            total_size_bytes,
            total_size_mb: total_size_bytes as f64 / (1024.0 * 1024.0),
            files,
        })
    }

    /// Delete files older than the fixed retention window.
    #[inline]
    pub fn cleanup(&self) -> Result<CleanupReport> {
        self.cleanup_before(Utc::now() - Duration::days(RETENTION_DAYS))
    }

    /// Delete every file whose modification time is strictly before
    /// `cutoff`. A file modified exactly at the cutoff is kept. Individual
    /// deletion failures are logged and skipped; the report covers what did
    /// succeed.
    #[inline]
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport> {
        let mut deleted_files = 0usize;
        let mut freed_space_bytes = 0u64;

        for (path, metadata) in self.regular_files()? {
            let modified = match metadata.modified() {
                Ok(time) => DateTime::<Utc>::from(time),
                Err(e) => {
                    warn!("Skipping {}: cannot read mtime: {e}", path.display());
                    continue;
                }
            };

            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    deleted_files += 1;
                    freed_space_bytes += metadata.len();
                    info!("Evicted {} ({} bytes)", path.display(), metadata.len());
                }
                Err(e) => {
                    warn!("Failed to delete {}: {e}", path.display());
                }
            }
        }

        info!(
            "Cleanup complete: {} files deleted, {} bytes freed",
            deleted_files, freed_space_bytes
        );

        Ok(CleanupReport {
            deleted_files,
            freed_space_bytes,
        })
    }

    fn regular_files(&self) -> Result<Vec<(PathBuf, fs::Metadata)>> {
        let mut files = Vec::new();

        if !self.upload_dir.exists() {
            return Ok(files);
        }

        for entry in fs::read_dir(&self.upload_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                files.push((entry.path(), metadata));
            }
        }

        Ok(files)
    }
}
