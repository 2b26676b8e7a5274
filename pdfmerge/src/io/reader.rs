//! PDF reading and loading operations.
//!
//! Files are checked and read with `tokio::fs`, then parsed on the blocking
//! pool. Several files load concurrently through an order-preserving
//! bounded stream, so results line up with the input paths.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::io::PdfReader;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PdfReader::new();
//! let paths = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let loaded = reader.load_all(&paths, 4).await?;
//! assert_eq!(loaded.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{MergeError, Result};
use crate::pdf::Document;

/// Every PDF starts with this.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A loaded PDF document with its source bytes.
#[derive(Debug)]
pub struct LoadedPdf {
    /// Path to the source file.
    pub path: PathBuf,

    /// The parsed document.
    pub document: Document,

    /// Raw file contents, kept for verbatim single-file output.
    pub bytes: Vec<u8>,

    /// File size in bytes.
    pub file_size: u64,

    /// Time taken to read and parse the file.
    pub load_time: Duration,
}

impl LoadedPdf {
    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }
}

/// Loads PDF files from disk.
#[derive(Debug, Clone, Default)]
pub struct PdfReader;

impl PdfReader {
    /// Create a new PDF reader.
    pub fn new() -> Self {
        Self
    }

    /// Check that `path` is an existing, accessible regular file and return
    /// its size.
    ///
    /// # Errors
    ///
    /// [`MergeError::FileNotFound`], [`MergeError::NotAFile`] or
    /// [`MergeError::FileNotAccessible`].
    pub async fn check_file(&self, path: &Path) -> Result<u64> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| access_error(path, source))?;
        if !metadata.is_file() {
            return Err(MergeError::not_a_file(path.to_path_buf()));
        }
        Ok(metadata.len())
    }

    /// Read a file and check its `%PDF-` signature.
    ///
    /// # Errors
    ///
    /// Everything [`check_file`](Self::check_file) reports, plus
    /// [`MergeError::NotAPdf`].
    pub async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.check_file(path).await?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| access_error(path, source))?;
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(MergeError::not_a_pdf(path.to_path_buf()));
        }
        Ok(bytes)
    }

    /// Load a single PDF document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File is missing, not a regular file or unreadable
    /// - File does not carry a PDF header
    /// - PDF is encrypted or structurally broken ([`MergeError::InvalidPdf`])
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfmerge::io::PdfReader;
    /// # use std::path::Path;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let reader = PdfReader::new();
    /// let loaded = reader.load(Path::new("document.pdf")).await?;
    /// println!("Loaded {} pages in {:?}", loaded.page_count(), loaded.load_time);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load(&self, path: &Path) -> Result<LoadedPdf> {
        let start = Instant::now();
        let bytes = self.read_bytes(path).await?;
        let file_size = bytes.len() as u64;

        // Parsing is CPU-bound; keep it off the async workers.
        let (document, bytes) = tokio::task::spawn_blocking(move || {
            Document::parse(&bytes).map(|document| (document, bytes))
        })
        .await?
        .map_err(|source| MergeError::invalid_pdf(path.to_path_buf(), source))?;

        let load_time = start.elapsed();
        log::debug!(
            "loaded {} ({} pages, {} bytes) in {:?}",
            path.display(),
            document.page_count(),
            file_size,
            load_time
        );

        Ok(LoadedPdf {
            path: path.to_path_buf(),
            document,
            bytes,
            file_size,
            load_time,
        })
    }

    /// Load several PDFs with at most `workers` in flight.
    ///
    /// Results keep the order of `paths`. Loading stops at the first failure.
    ///
    /// # Errors
    ///
    /// The first error in input order among the files loaded so far.
    pub async fn load_all(&self, paths: &[PathBuf], workers: usize) -> Result<Vec<LoadedPdf>> {
        stream::iter(paths.iter().map(|path| self.load(path)))
            .buffered(workers.max(1))
            .try_collect()
            .await
    }
}

fn access_error(path: &Path, source: std::io::Error) -> MergeError {
    match source.kind() {
        ErrorKind::NotFound => MergeError::file_not_found(path.to_path_buf()),
        _ => MergeError::FileNotAccessible {
            path: path.to_path_buf(),
            source,
        },
    }
}
