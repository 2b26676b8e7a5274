//! CLI argument parsing for pdfmerge.
//!
//! This module defines the command-line interface structure using `clap`.
//! It is also compiled by the build script to render the man page, so it
//! only depends on `clap` and the library.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use pdfmerge::config::{Config, OverwriteMode};
use pdfmerge::error::{MergeError, Result};
use pdfmerge::merge::MergeInput;

/// Merge PDF files and page ranges into a single document.
///
/// pdfmerge copies the selected pages of each input, in order, into one new
/// PDF. Every page keeps its content, fonts and images.
#[derive(Parser, Debug)]
#[command(name = "pdfmerge")]
#[command(version)]
#[command(about = "Merge PDF files and page ranges into a single document", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Verbose output - show details and statistics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Recent-files list location
    ///
    /// Defaults to recent.json in the pdfmerge configuration directory.
    #[arg(long, global = true, value_name = "FILE", env = "PDFMERGE_RECENT_FILE")]
    pub recent_store: Option<PathBuf>,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge inputs into one PDF
    Merge(MergeArgs),

    /// Show page count, version and size of PDF files
    Info(InspectArgs),

    /// Check that files are readable PDFs
    Validate(InspectArgs),

    /// Show or edit the recent-files list
    Recent(RecentArgs),
}

/// Arguments of `pdfmerge merge`.
#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Input PDF files to merge (in order), each optionally FILE:RANGE
    ///
    /// RANGE is a comma-separated list of pages and ranges such as
    /// "1-3,5" or "4-1" (reversed). Glob patterns are expanded and
    /// matching files are merged in name order.
    ///
    /// Examples:
    ///   pdfmerge merge a.pdf b.pdf:2-3 -o out.pdf
    ///   pdfmerge merge 'chapter*.pdf' -o book.pdf
    #[arg(value_name = "FILE[:RANGE]")]
    pub inputs: Vec<String>,

    /// Output PDF file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Dry run - resolve inputs and ranges without creating output
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Force overwrite of existing output file without confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Never overwrite existing output file
    #[arg(long, conflicts_with = "force")]
    pub no_clobber: bool,

    /// Number of PDFs loaded concurrently (default: CPU count)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Read inputs from a JSON list of {"filePath", "pageRange"} entries
    ///
    /// Entries are appended after inputs given on the command line.
    #[arg(long, value_name = "FILE")]
    pub input_list: Option<PathBuf>,

    /// Do not record the output in the recent-files list
    #[arg(long)]
    pub no_recent: bool,

    /// Print the dry-run plan as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,
}

/// Arguments of `pdfmerge info` and `pdfmerge validate`.
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// PDF files to inspect
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `pdfmerge recent`.
#[derive(Args, Debug, Clone)]
pub struct RecentArgs {
    /// Remove one file from the list
    #[arg(long, value_name = "PATH", conflicts_with = "clear")]
    pub remove: Option<PathBuf>,

    /// Remove every entry
    #[arg(long)]
    pub clear: bool,

    /// Print the list as JSON
    #[arg(long)]
    pub json: bool,
}

impl MergeArgs {
    /// Overwrite behavior selected by the flags.
    pub fn overwrite_mode(&self) -> OverwriteMode {
        if self.force {
            OverwriteMode::Force
        } else if self.no_clobber {
            OverwriteMode::NoClobber
        } else {
            OverwriteMode::Prompt
        }
    }

    /// Build and validate a [`Config`] from already expanded inputs.
    ///
    /// # Errors
    ///
    /// [`MergeError::InvalidConfig`] if the combination is invalid.
    pub fn to_config(
        &self,
        inputs: Vec<MergeInput>,
        verbose: bool,
        quiet: bool,
        recent_store: Option<PathBuf>,
    ) -> Result<Config> {
        if inputs.is_empty() {
            return Err(MergeError::NoFilesToMerge);
        }

        let config = Config {
            inputs,
            output: self.output.clone(),
            dry_run: self.dry_run,
            verbose,
            quiet,
            overwrite_mode: self.overwrite_mode(),
            jobs: self.jobs,
            recent_store: if self.no_recent { None } else { recent_store },
        };
        config.validate()?;
        Ok(config)
    }
}
