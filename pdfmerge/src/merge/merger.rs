//! Merge orchestration.
//!
//! A request is processed in stages: inputs are checked and parsed
//! concurrently, page selectors are resolved against the real page counts,
//! then extraction, assembly and serialization run on the blocking pool.
//! File output is committed atomically, so a failed request never leaves a
//! partial file behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task;

use crate::error::{MergeError, Result};
use crate::io::{LoadedPdf, PdfReader, PdfWriter};
use crate::merge::builder::MergeBuilder;
use crate::merge::cancel::CancellationToken;
use crate::merge::extract::extract_pages;
use crate::pdf::writer;
use crate::range::PageRange;
use crate::store::RecentFiles;
use crate::utils::format_file_size;

/// One source file and the pages to take from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeInput {
    /// Source file.
    #[serde(rename = "filePath")]
    pub path: PathBuf,

    /// Pages to take, in order. Defaults to every page.
    #[serde(rename = "pageRange", default)]
    pub pages: PageRange,
}

impl MergeInput {
    /// Input with a selector expression such as `"1-3,5"`.
    ///
    /// # Errors
    ///
    /// [`MergeError::InvalidPageRange`] if the expression is malformed.
    pub fn new(path: impl Into<PathBuf>, expression: &str) -> Result<Self> {
        let path = path.into();
        let pages = PageRange::parse(expression)
            .map_err(|e| MergeError::invalid_page_range(path.clone(), e))?;
        Ok(Self { path, pages })
    }

    /// Input taking every page.
    pub fn all(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pages: PageRange::All,
        }
    }
}

/// Where merged output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to this file.
    File(PathBuf),
    /// Return the bytes.
    Memory,
}

/// A complete merge request.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Sources in output order.
    pub inputs: Vec<MergeInput>,

    /// Output destination.
    pub output: OutputTarget,

    /// Replace an existing output file.
    pub overwrite: bool,
}

impl MergeRequest {
    /// Request writing to `path`, refusing to replace an existing file.
    pub fn to_file(inputs: Vec<MergeInput>, path: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            output: OutputTarget::File(path.into()),
            overwrite: false,
        }
    }

    /// Request returning the merged bytes.
    pub fn to_memory(inputs: Vec<MergeInput>) -> Self {
        Self {
            inputs,
            output: OutputTarget::Memory,
            overwrite: false,
        }
    }

    /// Allow replacing an existing output file.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// The produced document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutput {
    /// Written to this path.
    File(PathBuf),
    /// In-memory PDF.
    Memory(Vec<u8>),
}

/// Statistics about a merge operation.
#[derive(Debug, Clone)]
pub struct MergeStatistics {
    /// Number of inputs merged.
    pub files_merged: usize,

    /// Total number of pages in merged document.
    pub total_pages: usize,

    /// Total size of input files.
    pub input_size: u64,

    /// Size of the merged document.
    pub output_size: u64,

    /// Time taken to load all PDFs.
    pub load_time: Duration,

    /// Total time taken for merge.
    pub merge_time: Duration,

    /// Whether the single input was copied byte for byte.
    pub copied_verbatim: bool,

    /// Number of indirect objects in the output.
    pub objects_written: usize,
}

impl MergeStatistics {
    /// Format input size as human-readable string.
    pub fn format_input_size(&self) -> String {
        format_file_size(self.input_size)
    }

    /// Format output size as human-readable string.
    pub fn format_output_size(&self) -> String {
        format_file_size(self.output_size)
    }
}

/// Result of a merge operation.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged document.
    pub output: MergeOutput,

    /// Statistics about the merge.
    pub statistics: MergeStatistics,
}

/// One input as it would be merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedInput {
    /// Source file.
    pub path: PathBuf,
    /// Pages in the source.
    pub page_count: u32,
    /// Resolved 1-based page indices, in output order.
    pub selected: Vec<u32>,
    /// File size in bytes.
    pub size: u64,
}

/// What a request would produce, computed without writing anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePlan {
    /// Inputs in output order.
    pub inputs: Vec<PlannedInput>,
    /// Pages in the output.
    pub total_pages: usize,
}

/// Serialized output plus what the statistics need to know about it.
struct Rendered {
    bytes: Vec<u8>,
    objects_written: usize,
    copied_verbatim: bool,
}

/// PDF merger that combines multiple documents.
#[derive(Debug, Clone)]
pub struct Merger {
    reader: PdfReader,
    writer: PdfWriter,
    jobs: usize,
    recent: Option<Arc<RecentFiles>>,
}

impl Merger {
    /// Create a new merger loading up to one file per CPU at a time.
    pub fn new() -> Self {
        let jobs = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            reader: PdfReader::new(),
            writer: PdfWriter::new(),
            jobs,
            recent: None,
        }
    }

    /// Limit how many inputs load concurrently.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Report every written output file to `store`.
    pub fn with_recent_store(mut self, store: Arc<RecentFiles>) -> Self {
        self.recent = Some(store);
        self
    }

    /// Merge the inputs of `request` into its output.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request has no inputs
    /// - The output file exists and `overwrite` is off
    /// - Any input cannot be loaded or its selector exceeds its page count
    /// - Writing the output fails
    /// - `cancel` fires before the output is committed
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfmerge::merge::{CancellationToken, MergeInput, MergeRequest, Merger};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let request = MergeRequest::to_file(
    ///     vec![MergeInput::all("a.pdf"), MergeInput::new("b.pdf", "3,1")?],
    ///     "merged.pdf",
    /// );
    /// let outcome = Merger::new().merge(&request, &CancellationToken::new()).await?;
    /// println!("Merged {} files into {} pages",
    ///          outcome.statistics.files_merged,
    ///          outcome.statistics.total_pages);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn merge(
        &self,
        request: &MergeRequest,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome> {
        let merge_start = Instant::now();
        if request.inputs.is_empty() {
            return Err(MergeError::NoFilesToMerge);
        }
        if let OutputTarget::File(path) = &request.output
            && !request.overwrite
            && self.writer.exists(path).await
        {
            return Err(MergeError::output_exists(path.clone()));
        }
        cancel.check()?;

        let load_start = Instant::now();
        let mut loaded = self.load(request).await?;
        let load_time = load_start.elapsed();
        cancel.check()?;

        let selections = resolve_selections(&request.inputs, &loaded)?;
        let files_merged = loaded.len();
        let total_pages: usize = selections.iter().map(Vec::len).sum();
        let input_size: u64 = loaded.iter().map(|pdf| pdf.file_size).sum();

        let verbatim = request.inputs.len() == 1 && request.inputs.iter().all(|i| i.pages.is_all());
        let rendered = match loaded.pop() {
            Some(pdf) if verbatim => {
                log::debug!("copying {} verbatim", pdf.path.display());
                Rendered {
                    objects_written: pdf.document.objects().len(),
                    bytes: pdf.bytes,
                    copied_verbatim: true,
                }
            }
            last => {
                loaded.extend(last);
                let cancel = cancel.clone();
                task::spawn_blocking(move || render(&loaded, &selections, &cancel)).await??
            }
        };
        cancel.check()?;

        let output_size = rendered.bytes.len() as u64;
        let output = match &request.output {
            OutputTarget::File(path) => {
                self.writer.save_bytes(rendered.bytes, path).await?;
                self.remember(path, total_pages).await;
                MergeOutput::File(path.clone())
            }
            OutputTarget::Memory => MergeOutput::Memory(rendered.bytes),
        };

        let statistics = MergeStatistics {
            files_merged,
            total_pages,
            input_size,
            output_size,
            load_time,
            merge_time: merge_start.elapsed(),
            copied_verbatim: rendered.copied_verbatim,
            objects_written: rendered.objects_written,
        };
        log::info!(
            "merged {} files into {} pages ({}) in {:?}",
            statistics.files_merged,
            statistics.total_pages,
            statistics.format_output_size(),
            statistics.merge_time
        );

        Ok(MergeOutcome { output, statistics })
    }

    /// Load and resolve every input without producing output.
    ///
    /// Fails exactly where [`merge`](Self::merge) would fail before writing,
    /// including an unusable output location.
    ///
    /// # Errors
    ///
    /// Same as [`merge`](Self::merge), except cancellation and write errors.
    pub async fn plan(&self, request: &MergeRequest) -> Result<MergePlan> {
        if request.inputs.is_empty() {
            return Err(MergeError::NoFilesToMerge);
        }
        if let OutputTarget::File(path) = &request.output {
            if !request.overwrite && self.writer.exists(path).await {
                return Err(MergeError::output_exists(path.clone()));
            }
            self.writer.can_write(path).await?;
        }

        let loaded = self.load(request).await?;
        let selections = resolve_selections(&request.inputs, &loaded)?;
        let total_pages = selections.iter().map(Vec::len).sum();
        let inputs = loaded
            .iter()
            .zip(selections)
            .map(|(pdf, selected)| PlannedInput {
                path: pdf.path.clone(),
                page_count: pdf.page_count(),
                selected,
                size: pdf.file_size,
            })
            .collect();

        Ok(MergePlan {
            inputs,
            total_pages,
        })
    }

    async fn load(&self, request: &MergeRequest) -> Result<Vec<LoadedPdf>> {
        let paths: Vec<PathBuf> = request.inputs.iter().map(|i| i.path.clone()).collect();
        self.reader.load_all(&paths, self.jobs).await
    }

    /// Record a written file in the recent store. Failures only warn.
    async fn remember(&self, path: &Path, total_pages: usize) {
        let Some(store) = self.recent.clone() else {
            return;
        };
        let path = path.to_path_buf();
        let page_count = u32::try_from(total_pages).unwrap_or(u32::MAX);
        let recorded = task::spawn_blocking(move || {
            let entry = RecentFiles::file_entry(&path, page_count)?;
            store.add(entry)
        })
        .await;

        match recorded {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("could not update recent files: {e}"),
            Err(e) => log::warn!("could not update recent files: {e}"),
        }
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_selections(inputs: &[MergeInput], loaded: &[LoadedPdf]) -> Result<Vec<Vec<u32>>> {
    inputs
        .iter()
        .zip(loaded)
        .map(|(input, pdf)| {
            input
                .pages
                .resolve(pdf.page_count())
                .map_err(|e| MergeError::invalid_page_range(input.path.clone(), e))
        })
        .collect()
}

fn render(
    loaded: &[LoadedPdf],
    selections: &[Vec<u32>],
    cancel: &CancellationToken,
) -> Result<Rendered> {
    let mut builder = MergeBuilder::new();
    for (pdf, indices) in loaded.iter().zip(selections) {
        let pages = extract_pages(&pdf.document, &pdf.path, indices, cancel)?;
        builder.add_source(&pdf.document, &pages, cancel)?;
    }
    let document = builder.finish()?;
    cancel.check()?;

    Ok(Rendered {
        objects_written: document.objects().len(),
        bytes: writer::to_bytes(&document),
        copied_verbatim: false,
    })
}
