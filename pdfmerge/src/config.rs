//! Configuration module for pdfmerge.
//!
//! This module turns command-line input into a validated, normalized
//! configuration that drives a merge. It handles:
//! - `FILE[:RANGE]` input specs and JSON input manifests
//! - Validation of argument combinations
//! - Application of defaults

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{MergeError, Result};
use crate::merge::{MergeInput, MergeRequest, Merger};
use crate::store::RecentFiles;

/// Output file overwrite behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// Prompt the user before overwriting (default).
    #[default]
    Prompt,
    /// Always overwrite without prompting.
    Force,
    /// Never overwrite, error if file exists.
    NoClobber,
}

impl FromStr for OverwriteMode {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "prompt" => Ok(Self::Prompt),
            "force" => Ok(Self::Force),
            "no-clobber" | "noclobber" => Ok(Self::NoClobber),
            _ => Err(MergeError::invalid_config(format!(
                "Invalid overwrite mode: '{s}'. Valid options: prompt, force, no-clobber"
            ))),
        }
    }
}

/// Complete configuration for a merge operation.
///
/// This structure contains all settings needed to perform a merge,
/// derived and validated from CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    /// Inputs in merge order.
    pub inputs: Vec<MergeInput>,

    /// Output PDF file path.
    pub output: PathBuf,

    /// Dry run mode - validate without creating output.
    pub dry_run: bool,

    /// Verbose output mode.
    pub verbose: bool,

    /// Quiet mode - suppress non-error output.
    pub quiet: bool,

    /// File overwrite behavior.
    pub overwrite_mode: OverwriteMode,

    /// Number of concurrently loaded inputs (None = auto-detect).
    pub jobs: Option<usize>,

    /// Recent-files store to report the output to.
    pub recent_store: Option<PathBuf>,
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// [`MergeError::InvalidConfig`] if:
    /// - No input files are specified
    /// - Verbose and quiet modes are both enabled
    /// - Jobs count is zero
    /// - The output path is also an input
    pub fn validate(&self) -> Result<()> {
        self.check()
            .map_err(|e| MergeError::invalid_config(format!("{e:#}")))
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.inputs.is_empty() {
            bail!("No input files specified");
        }

        if self.verbose && self.quiet {
            bail!("Cannot use both --verbose and --quiet");
        }

        if let Some(jobs) = self.jobs
            && jobs == 0
        {
            bail!("Number of jobs must be at least 1");
        }

        if self.output.as_os_str().is_empty() {
            bail!("Output path cannot be empty");
        }

        for input in &self.inputs {
            if input.path == self.output {
                bail!(
                    "Output file cannot be the same as an input file: {}",
                    self.output.display()
                );
            }
        }

        Ok(())
    }

    /// Get the effective number of parallel jobs.
    ///
    /// Returns the configured job count, or the number of CPU cores if auto-detect.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Merge request for this configuration.
    ///
    /// `overwrite` is the caller's decision for [`OverwriteMode::Prompt`];
    /// the other modes decide on their own.
    pub fn request(&self, overwrite: bool) -> MergeRequest {
        let overwrite = match self.overwrite_mode {
            OverwriteMode::Force => true,
            OverwriteMode::NoClobber => false,
            OverwriteMode::Prompt => overwrite,
        };
        MergeRequest::to_file(self.inputs.clone(), &self.output).overwrite(overwrite)
    }

    /// Merger configured with the job count and recent store.
    ///
    /// # Errors
    ///
    /// [`MergeError::RecentFiles`] if the store exists but cannot be read.
    pub fn merger(&self) -> Result<Merger> {
        let merger = Merger::new().with_jobs(self.effective_jobs());
        match &self.recent_store {
            Some(path) => Ok(merger.with_recent_store(Arc::new(RecentFiles::open(path)?))),
            None => Ok(merger),
        }
    }
}

/// Parse a `FILE[:RANGE]` input spec.
///
/// The text after the last `:` is a range only if it looks like one
/// (digits, `,`, `-`, spaces, or `all`); otherwise the whole spec is a path,
/// so drive letters and colons in file names keep working.
///
/// # Errors
///
/// [`MergeError::InvalidPageRange`] if the range part is malformed.
pub fn parse_input_spec(spec: &str) -> Result<MergeInput> {
    if let Some((file, range)) = spec.rsplit_once(':')
        && !file.is_empty()
        && looks_like_range(range)
    {
        return MergeInput::new(file, range);
    }
    Ok(MergeInput::all(spec))
}

fn looks_like_range(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("all")
        || (!trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ',' | '-' | ' ')))
}

/// Read a JSON input manifest.
///
/// The manifest is an array of `{ "filePath": ..., "pageRange": ... }`
/// objects; other fields are ignored and a missing `pageRange` selects every
/// page. Relative paths are resolved against the manifest's directory.
///
/// # Errors
///
/// [`MergeError::InvalidInputList`] if the file cannot be read or parsed.
pub fn read_input_list(path: &Path) -> Result<Vec<MergeInput>> {
    load_input_list(path).map_err(|e| MergeError::InvalidInputList {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })
}

fn load_input_list(path: &Path) -> anyhow::Result<Vec<MergeInput>> {
    let data = std::fs::read(path).context("could not read file")?;
    let mut inputs: Vec<MergeInput> = serde_json::from_slice(&data)
        .context("expected a JSON array of {\"filePath\", \"pageRange\"} entries")?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for input in &mut inputs {
        if input.path.is_relative() {
            input.path = base.join(&input.path);
        }
    }
    Ok(inputs)
}
