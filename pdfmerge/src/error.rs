//! Error types for pdfmerge.
//!
//! Errors are layered the same way the engine is:
//!
//! - [`RangeError`](crate::range::RangeError): page-range syntax and bounds
//! - [`PdfError`](crate::pdf::PdfError): malformed or unsupported PDF input
//! - [`MergeError`]: everything the orchestrator reports, carrying the file
//!   path (and where applicable the byte offset or object number) needed to
//!   render an actionable message.

use std::io;
use std::path::PathBuf;

use crate::pdf::{ObjectId, PdfError};
use crate::range::RangeError;

/// Result type alias for pdfmerge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Main error type for merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Input file was not found.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Input path exists but is not a regular file.
    #[error("Not a file: {}", path.display())]
    NotAFile {
        /// Path that is not a file.
        path: PathBuf,
    },

    /// Input file is not readable (permission denied, locked, ...).
    #[error("Cannot access file: {}\n  Reason: {source}", path.display())]
    FileNotAccessible {
        /// Path to the inaccessible file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Input file does not start with a `%PDF-` header.
    #[error("Not a PDF file: {}\n  Hint: the file does not start with a %PDF- header", path.display())]
    NotAPdf {
        /// Path to the offending file.
        path: PathBuf,
    },

    /// A page-range expression is malformed or exceeds the document.
    #[error("Invalid page range for {}: {source}", path.display())]
    InvalidPageRange {
        /// File the expression was given for.
        path: PathBuf,
        /// The syntax or bounds failure.
        source: RangeError,
    },

    /// Input file could not be parsed as a PDF.
    #[error("Invalid PDF: {}\n  Details: {source}", path.display())]
    InvalidPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Parse, structure or encryption failure.
        source: PdfError,
    },

    /// The merged object graph references an object it does not contain.
    ///
    /// This is an engine bug, never a recoverable state.
    #[error(
        "Reference integrity violated: object {} {} references missing object {} {}",
        object.0, object.1, target.0, target.1
    )]
    ReferenceIntegrity {
        /// Object holding the dangling reference (`(0, 0)` for the trailer).
        object: ObjectId,
        /// The missing target.
        target: ObjectId,
    },

    /// No inputs were given.
    #[error("No input files specified for merging")]
    NoFilesToMerge,

    /// Output file already exists and overwrite is not allowed.
    #[error(
        "Output file already exists: {}\n  Use --force to overwrite or choose a different output path",
        path.display()
    )]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// Failed to create the output file or its directory.
    #[error("Failed to create output file: {}\n  Reason: {source}", path.display())]
    FailedToCreateOutput {
        /// Path where output should be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed while writing or committing the output file.
    #[error("Failed to write to output file: {}\n  Reason: {source}", path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to read an input manifest.
    #[error("Failed to read input list file: {}\n  Reason: {reason}", path.display())]
    InvalidInputList {
        /// Path to the manifest.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Recent-files store could not be read or persisted.
    #[error("Recent files store error: {}\n  Reason: {reason}", path.display())]
    RecentFiles {
        /// Path of the store file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// The operation was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// A blocking worker task failed to complete.
    #[error("Worker task failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
}

impl MergeError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: PathBuf) -> Self {
        Self::NotAFile { path }
    }

    /// Create a NotAPdf error.
    pub fn not_a_pdf(path: PathBuf) -> Self {
        Self::NotAPdf { path }
    }

    /// Attach a file path to a PDF-level failure.
    pub fn invalid_pdf(path: PathBuf, source: PdfError) -> Self {
        Self::InvalidPdf { path, source }
    }

    /// Attach a file path to a page-range failure.
    pub fn invalid_page_range(path: PathBuf, source: RangeError) -> Self {
        Self::InvalidPageRange { path, source }
    }

    /// Create an OutputExists error.
    pub fn output_exists(path: PathBuf) -> Self {
        Self::OutputExists { path }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a RecentFiles error.
    pub fn recent_files(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::RecentFiles {
            path,
            reason: reason.into(),
        }
    }

    /// Path of the input or output file this error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::FileNotFound { path }
            | Self::NotAFile { path }
            | Self::FileNotAccessible { path, .. }
            | Self::NotAPdf { path }
            | Self::InvalidPageRange { path, .. }
            | Self::InvalidPdf { path, .. }
            | Self::OutputExists { path }
            | Self::FailedToCreateOutput { path, .. }
            | Self::FailedToWrite { path, .. }
            | Self::InvalidInputList { path, .. }
            | Self::RecentFiles { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Check if this error only concerns one input file.
    ///
    /// Such failures abort the request they occur in but say nothing about
    /// other, independent requests.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::NotAFile { .. }
                | Self::FileNotAccessible { .. }
                | Self::NotAPdf { .. }
                | Self::InvalidPageRange { .. }
                | Self::InvalidPdf { .. }
        )
    }

    /// Check if this error should stop all processing immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoFilesToMerge
                | Self::ReferenceIntegrity { .. }
                | Self::FailedToCreateOutput { .. }
                | Self::FailedToWrite { .. }
                | Self::Cancelled
        )
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } => 2,
            Self::NotAFile { .. } => 2,
            Self::FileNotAccessible { .. } => 2,
            Self::InvalidInputList { .. } => 2,
            Self::NotAPdf { .. } => 3,
            Self::InvalidPdf { .. } => 3,
            Self::NoFilesToMerge => 1,
            Self::InvalidPageRange { .. } => 1,
            Self::InvalidConfig { .. } => 1,
            Self::OutputExists { .. } => 4,
            Self::FailedToCreateOutput { .. } => 5,
            Self::FailedToWrite { .. } => 5,
            Self::Io { .. } => 5,
            Self::RecentFiles { .. } => 5,
            Self::ReferenceIntegrity { .. } => 6,
            Self::Task { .. } => 6,
            Self::Cancelled => 130,
        }
    }
}

impl From<tokio::task::JoinError> for MergeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            message: err.to_string(),
        }
    }
}
