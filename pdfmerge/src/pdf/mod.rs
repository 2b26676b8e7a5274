//! In-memory PDF engine: object model, reader and serializer.
//!
//! The reader turns raw bytes into a [`Document`]: an arena of indirect
//! objects keyed by [`ObjectId`], the trailer, and the flattened page list.
//! All links between objects are [`Object::Reference`] keys into that arena,
//! so shared and cyclic structures need no owning pointers.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::pdf::{Document, writer};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("input.pdf")?;
//! let doc = Document::parse(&bytes)?;
//! println!("{} pages", doc.page_count());
//!
//! let copy = writer::to_bytes(&doc);
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod filter;
pub mod object;
pub mod parser;
pub mod writer;
pub mod xref;

pub use document::{Document, PageEntry};
pub use object::{Dictionary, Object, ObjectId, Stream, StringFormat};

/// Failure while reading a PDF.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PdfError {
    /// Malformed syntax at a byte offset of the input.
    #[error("parse error at byte {offset}: {reason}")]
    Parse {
        /// Byte offset into the file (or into a decoded object stream).
        offset: usize,
        /// What the parser expected or found.
        reason: String,
    },

    /// The object graph does not form a usable document.
    #[error("invalid document structure: {reason}")]
    Structure {
        /// Missing root, page-tree cycle, missing kid, ...
        reason: String,
    },

    /// The document is encrypted; decryption is not supported.
    #[error("document is encrypted; decrypt it first (e.g. 'qpdf --decrypt')")]
    Encrypted,

    /// A stream filter failed or is not supported.
    #[error("cannot decode stream: {reason}")]
    Filter {
        /// Filter name and failure.
        reason: String,
    },
}

impl PdfError {
    /// Create a Parse error.
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Create a Structure error.
    pub fn structure(reason: impl Into<String>) -> Self {
        Self::Structure {
            reason: reason.into(),
        }
    }

    /// Create a Filter error.
    pub fn filter(reason: impl Into<String>) -> Self {
        Self::Filter {
            reason: reason.into(),
        }
    }
}

/// Result type alias for the PDF layer.
pub type PdfResult<T> = std::result::Result<T, PdfError>;
