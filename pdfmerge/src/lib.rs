//! pdfmerge - Merge PDF files and page ranges into a single document.
//!
//! This library combines pages selected from several PDF files into one new
//! PDF. It supports:
//!
//! - Page range expressions such as `1-3,5,8-6`
//! - Self-contained page extraction with renumbered, relinked objects
//! - Atomic file output or in-memory results
//! - Concurrent loading of inputs and cancellation
//! - Input inspection, batch validation and a recent-files list
//!
//! # Examples
//!
//! ## Basic Merge
//!
//! ```no_run
//! use pdfmerge::merge::{CancellationToken, MergeInput, MergeRequest, Merger};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = MergeRequest::to_file(
//!     vec![MergeInput::all("a.pdf"), MergeInput::new("b.pdf", "3,1")?],
//!     "merged.pdf",
//! );
//!
//! let outcome = Merger::new().merge(&request, &CancellationToken::new()).await?;
//! println!("Created {} page document", outcome.statistics.total_pages);
//! # Ok(())
//! # }
//! ```
//!
//! ## Using Individual Components
//!
//! ```no_run
//! use pdfmerge::io::{PdfReader, PdfWriter};
//! use pdfmerge::validation::Validator;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Inspect input
//! let info = Validator::new().file_info(Path::new("input.pdf")).await?;
//! println!("PDF has {} pages", info.page_count);
//!
//! // Load PDF
//! let loaded = PdfReader::new().load(Path::new("input.pdf")).await?;
//!
//! // Save PDF
//! PdfWriter::new().save(&loaded.document, Path::new("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod io;
pub mod merge;
pub mod output;
pub mod pdf;
pub mod range;
pub mod store;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{MergeError, Result};
pub use merge::{CancellationToken, MergeInput, MergeRequest, Merger};
pub use range::{PageRange, RangeError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
