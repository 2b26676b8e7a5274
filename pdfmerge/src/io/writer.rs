//! PDF writing and saving operations.
//!
//! Output is always written atomically: the bytes go to a uniquely named
//! temporary file next to the target, which is flushed, synced and then
//! renamed over the target. A failed write never leaves a partial file.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::io::PdfWriter;
//! use pdfmerge::pdf::Document;
//! use std::path::Path;
//!
//! # async fn example(doc: Document) -> Result<(), Box<dyn std::error::Error>> {
//! let writer = PdfWriter::new();
//! writer.save(&doc, Path::new("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task;

use crate::error::{MergeError, Result};
use crate::pdf::{Document, writer};
use crate::utils::format_file_size;

/// Distinguishes temp files of concurrent writes within one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Buffer size for writing (in bytes).
    pub buffer_size: usize,

    /// Sync file contents to disk before the rename.
    pub sync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            sync: true,
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to write the file.
    pub write_time: Duration,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Path where the file was written.
    pub output_path: PathBuf,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// PDF writer with configurable behavior.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a new PDF writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with custom options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Serialize a document and save it to `path`.
    ///
    /// # Errors
    ///
    /// See [`save_bytes`](Self::save_bytes).
    pub async fn save(&self, doc: &Document, path: &Path) -> Result<WriteStatistics> {
        let doc = doc.clone();
        let bytes = task::spawn_blocking(move || writer::to_bytes(&doc)).await?;
        self.save_bytes(bytes, path).await
    }

    /// Atomically write `bytes` to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directory or temp file cannot be created
    ///   ([`MergeError::FailedToCreateOutput`])
    /// - Writing, syncing or renaming fails ([`MergeError::FailedToWrite`])
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfmerge::io::PdfWriter;
    /// # use std::path::Path;
    /// # async fn example(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
    /// let writer = PdfWriter::new();
    /// let stats = writer.save_bytes(bytes, Path::new("output.pdf")).await?;
    /// println!("Wrote {} in {:?}", stats.format_file_size(), stats.write_time);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn save_bytes(&self, bytes: Vec<u8>, path: &Path) -> Result<WriteStatistics> {
        let path_buf = path.to_path_buf();
        let options = self.options.clone();

        let stats = task::spawn_blocking(move || {
            let start = Instant::now();
            write_atomic(&bytes, &path_buf, &options)?;
            Ok::<_, MergeError>(WriteStatistics {
                write_time: start.elapsed(),
                file_size: bytes.len() as u64,
                output_path: path_buf,
            })
        })
        .await??;

        log::debug!(
            "wrote {} to {} in {:?}",
            stats.format_file_size(),
            stats.output_path.display(),
            stats.write_time
        );
        Ok(stats)
    }

    /// Check if a file can be written to the given path.
    ///
    /// Performs pre-flight checks without writing. A missing parent
    /// directory is fine as long as it could be created.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is a directory, or the nearest
    /// existing ancestor is not a directory or is read-only.
    pub async fn can_write(&self, path: &Path) -> Result<()> {
        if let Ok(metadata) = tokio::fs::metadata(path).await
            && metadata.is_dir()
        {
            return Err(MergeError::invalid_config(format!(
                "Output path is a directory: {}",
                path.display()
            )));
        }

        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
            match tokio::fs::metadata(dir).await {
                Ok(metadata) if !metadata.is_dir() => {
                    return Err(MergeError::invalid_config(format!(
                        "Output location is not a directory: {}",
                        dir.display()
                    )));
                }
                Ok(metadata) if metadata.permissions().readonly() => {
                    return Err(MergeError::invalid_config(format!(
                        "Output directory is not writable: {}",
                        dir.display()
                    )));
                }
                Ok(_) => return Ok(()),
                Err(_) => ancestor = dir.parent(),
            }
        }
        Ok(())
    }

    /// Check if output file exists.
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }
}

pub(crate) fn write_atomic(bytes: &[u8], path: &Path, options: &WriteOptions) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|source| MergeError::FailedToCreateOutput {
        path: path.to_path_buf(),
        source,
    })?;

    let temp_path = parent.join(temp_name(path));
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|source| MergeError::FailedToCreateOutput {
            path: path.to_path_buf(),
            source,
        })?;

    let written = (|| {
        let mut out = std::io::BufWriter::with_capacity(options.buffer_size, file);
        out.write_all(bytes)?;
        out.flush()?;
        if options.sync {
            out.get_ref().sync_all()?;
        }
        drop(out);
        std::fs::rename(&temp_path, path)
    })();

    written.map_err(|source| {
        // Best effort; the original error is what matters.
        let _ = std::fs::remove_file(&temp_path);
        MergeError::FailedToWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn temp_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(".{name}.{}-{counter}.tmp", std::process::id())
}
