//! Durable storage for uploaded originals and generated results.
//!
//! Layout:
//! - `uploads/original_<uuid>_<sanitized-name>`: bytes exactly as received
//! - `results/result_<uuid>.png`: contrast-adjusted PNG
//!
//! Every write uses a fresh v4 UUID and `create_new`, so concurrent
//! requests never collide and an existing file is never overwritten.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::imaging::upload::{is_plain_filename, sanitize_filename};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A file written by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Bare file name (no directory).
    pub name: String,
    pub path: PathBuf,
}

/// Upload and result directories.
#[derive(Debug, Clone)]
pub struct ImageStore {
    upload_dir: PathBuf,
    result_dir: PathBuf,
}

impl ImageStore {
    pub fn new(upload_dir: PathBuf, result_dir: PathBuf) -> Self {
        Self {
            upload_dir,
            result_dir,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    /// Persist an original upload under `original_<uuid>_<sanitized>`.
    pub fn save_original(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let name = format!("original_{}_{}", Uuid::new_v4(), sanitize_filename(filename));
        write_new(&self.upload_dir, name, bytes)
    }

    /// Persist a PNG result under `result_<uuid>.png`.
    pub fn save_result(&self, png_bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let name = format!("result_{}.png", Uuid::new_v4());
        write_new(&self.result_dir, name, png_bytes)
    }

    /// Resolve a result file by bare name.
    ///
    /// Anything that is not a single plain path component is reported as
    /// not found without touching the filesystem.
    pub fn result_path(&self, filename: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_filename(filename) {
            return Err(StorageError::NotFound(filename.to_string()));
        }
        let path = self.result_dir.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StorageError::NotFound(filename.to_string()))
        }
    }

    /// Delete stored files whose modification time is older than `max_age`.
    /// Returns the number of files removed.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize, StorageError> {
        let now = SystemTime::now();
        let mut removed = 0;
        for dir in [&self.upload_dir, &self.result_dir] {
            removed += purge_dir(dir, now, max_age)?;
        }
        Ok(removed)
    }
}

fn write_new(dir: &Path, name: String, bytes: &[u8]) -> Result<StoredFile, StorageError> {
    std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    let path = dir.join(&name);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| StorageError::io(&path, e))?;
    fill_new_file(file, &path, bytes)?;
    Ok(StoredFile { name, path })
}

/// Write `bytes` to a freshly created file, removing it again if the
/// write fails so no truncated artifact is left behind.
fn fill_new_file<W: Write>(mut file: W, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let result = file.write_all(bytes).and_then(|()| file.flush());
    drop(file);
    result.map_err(|e| {
        if let Err(remove_err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "Failed to remove partial file: {remove_err}");
        }
        StorageError::io(path, e)
    })
}

fn purge_dir(dir: &Path, now: SystemTime, max_age: Duration) -> Result<usize, StorageError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StorageError::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), "Failed to purge stored file: {e}"),
        }
    }
    Ok(removed)
}
