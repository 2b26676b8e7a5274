//! Input inspection and validation.
//!
//! [`Validator::file_info`] reports basic facts about one PDF, and
//! [`Validator::validate_files`] checks many files at once, reporting a
//! verdict per file instead of stopping at the first failure.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::validation::Validator;
//! use std::path::{Path, PathBuf};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = Validator::new();
//! let info = validator.file_info(Path::new("test.pdf")).await?;
//! println!("PDF {} has {} pages", info.version, info.page_count);
//!
//! let report = validator
//!     .validate_files(&[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")])
//!     .await;
//! println!("{} of {} valid", report.files_valid, report.files.len());
//! # Ok(())
//! # }
//! ```

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::{LoadedPdf, PdfReader};
use crate::pdf::{Document, Object};
use crate::utils::{display_name, format_file_size};

/// Facts about one PDF file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfInfo {
    /// Path to the file.
    pub path: PathBuf,

    /// File name.
    pub name: String,

    /// Size of the file in bytes.
    pub size: u64,

    /// Number of pages in the PDF.
    pub page_count: u32,

    /// PDF version, e.g. `"1.7"`.
    pub version: String,

    /// Number of indirect objects.
    pub object_count: usize,

    /// First page's media box size (width, height) in points, if known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page_dimensions: Option<(f64, f64)>,
}

impl PdfInfo {
    fn from_loaded(loaded: &LoadedPdf) -> Self {
        let doc = &loaded.document;
        Self {
            path: loaded.path.clone(),
            name: display_name(&loaded.path),
            size: loaded.file_size,
            page_count: doc.page_count(),
            version: doc.version().to_string(),
            object_count: doc.objects().len(),
            page_dimensions: first_page_dimensions(doc),
        }
    }

    /// Format file size as human-readable string.
    pub fn format_size(&self) -> String {
        format_file_size(self.size)
    }
}

/// Verdict for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValidation {
    /// Path to the validated file.
    pub path: PathBuf,

    /// Whether the file is a usable PDF.
    pub valid: bool,

    /// Page count of a valid file.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page_count: Option<u32>,

    /// Why the file is not valid.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,

    #[serde(skip)]
    size: u64,
}

/// Summary of validation results for multiple files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Individual verdicts, in input order.
    pub files: Vec<FileValidation>,

    /// Total number of pages across valid files.
    pub total_pages: u64,

    /// Total size of valid files in bytes.
    pub total_size: u64,

    /// Number of files that passed validation.
    pub files_valid: usize,

    /// Number of files that failed validation.
    pub files_failed: usize,
}

impl ValidationReport {
    /// Create a report from per-file verdicts.
    pub fn from_files(files: Vec<FileValidation>) -> Self {
        let valid: Vec<&FileValidation> = files.iter().filter(|f| f.valid).collect();
        let total_pages = valid.iter().filter_map(|f| f.page_count).map(u64::from).sum();
        let total_size = valid.iter().map(|f| f.size).sum();
        let files_valid = valid.len();
        let files_failed = files.len() - files_valid;

        Self {
            files,
            total_pages,
            total_size,
            files_valid,
            files_failed,
        }
    }

    /// True if every file passed.
    pub fn all_valid(&self) -> bool {
        self.files_failed == 0
    }

    /// Format the total file size as a human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// Validator for PDF files.
#[derive(Debug, Clone)]
pub struct Validator {
    reader: PdfReader,
    jobs: usize,
}

impl Validator {
    /// Create a new validator checking up to one file per CPU at a time.
    pub fn new() -> Self {
        Self {
            reader: PdfReader::new(),
            jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }

    /// Limit how many files are checked concurrently.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Report basic facts about one PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File does not exist or is not accessible
    /// - File is not a PDF
    /// - PDF is encrypted or its structure is corrupted
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfmerge::validation::Validator;
    /// # use std::path::Path;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let info = Validator::new().file_info(Path::new("doc.pdf")).await?;
    /// println!("{}: {} pages, {}", info.name, info.page_count, info.format_size());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn file_info(&self, path: &Path) -> Result<PdfInfo> {
        let loaded = self.reader.load(path).await?;
        Ok(PdfInfo::from_loaded(&loaded))
    }

    /// Validate multiple PDF files.
    ///
    /// Every file gets a verdict; failures are recorded with their reason
    /// and never abort the remaining checks.
    pub async fn validate_files(&self, paths: &[PathBuf]) -> ValidationReport {
        let files = stream::iter(paths.iter().map(|path| self.validate_file(path)))
            .buffered(self.jobs)
            .collect()
            .await;
        ValidationReport::from_files(files)
    }

    async fn validate_file(&self, path: &Path) -> FileValidation {
        match self.reader.load(path).await {
            Ok(loaded) => FileValidation {
                path: path.to_path_buf(),
                valid: true,
                page_count: Some(loaded.page_count()),
                reason: None,
                size: loaded.file_size,
            },
            Err(e) => {
                log::debug!("{} failed validation: {e}", path.display());
                FileValidation {
                    path: path.to_path_buf(),
                    valid: false,
                    page_count: None,
                    reason: Some(e.to_string()),
                    size: 0,
                }
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn first_page_dimensions(doc: &Document) -> Option<(f64, f64)> {
    let page = doc.page(1)?;
    let media_box = doc
        .get_dict(page.id)
        .and_then(|dict| dict.get(b"MediaBox"))
        .or_else(|| page.inherited.get(b"MediaBox"))?;
    let values: Vec<f64> = doc
        .resolve(media_box)
        .as_array()?
        .iter()
        .map(|v| match doc.resolve(v) {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        })
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [llx, lly, urx, ury] => Some(((urx - llx).abs(), (ury - lly).abs())),
        _ => None,
    }
}
