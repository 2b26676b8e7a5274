//! pdfmerge - Merge PDF files and page ranges into a single document.

mod cli;

use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use crate::cli::{Cli, Command, InspectArgs, MergeArgs, RecentArgs};
use pdfmerge::config::{Config, OverwriteMode, parse_input_spec, read_input_list};
use pdfmerge::error::{MergeError, Result};
use pdfmerge::merge::{CancellationToken, MergeInput};
use pdfmerge::output::{
    OutputFormatter, display_info, display_merge_outcome, display_plan, display_recent,
    display_validation_report, to_json,
};
use pdfmerge::store::RecentFiles;
use pdfmerge::validation::Validator;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(err.exit_code());
        }
    }
}

/// `RUST_LOG` wins over the verbosity flags.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Run the selected subcommand, returning the process exit code.
async fn run(cli: Cli) -> Result<i32> {
    let formatter = OutputFormatter::new(cli.quiet, cli.verbose);
    let recent_store = cli.recent_store.clone().or_else(default_recent_store);

    match &cli.command {
        Command::Merge(args) => {
            let inputs = collect_inputs(args)?;
            let config = args.to_config(inputs, cli.verbose, cli.quiet, recent_store)?;
            run_merge(&config, args.json).await?;
            Ok(0)
        }
        Command::Info(args) => run_info(&formatter, args).await,
        Command::Validate(args) => run_validate(&formatter, args).await,
        Command::Recent(args) => {
            let path = recent_store.ok_or_else(|| {
                MergeError::invalid_config(
                    "No recent-files location; pass --recent-store or set PDFMERGE_RECENT_FILE",
                )
            })?;
            run_recent(&formatter, args, &path)?;
            Ok(0)
        }
    }
}

fn default_recent_store() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pdfmerge").join("recent.json"))
}

/// Parse `FILE[:RANGE]` specs, expand glob patterns and append the input list.
fn collect_inputs(args: &MergeArgs) -> Result<Vec<MergeInput>> {
    let mut inputs = Vec::new();
    for spec in &args.inputs {
        inputs.extend(expand_glob(parse_input_spec(spec)?)?);
    }
    if let Some(list) = &args.input_list {
        inputs.extend(read_input_list(list)?);
    }
    Ok(inputs)
}

/// Expand a pattern path into one input per match, sharing its range.
///
/// Paths without glob characters, or patterns matching nothing, are kept
/// as given so the missing file is reported by the merge itself.
fn expand_glob(input: MergeInput) -> Result<Vec<MergeInput>> {
    let pattern = input.path.to_string_lossy().into_owned();
    if !pattern.contains(['*', '?', '[']) {
        return Ok(vec![input]);
    }

    let mut matches = glob::glob(&pattern)
        .map_err(|e| MergeError::invalid_config(format!("Invalid pattern '{pattern}': {e}")))?
        .collect::<std::result::Result<Vec<PathBuf>, _>>()
        .map_err(|e| MergeError::invalid_config(format!("Cannot expand '{pattern}': {e}")))?;
    if matches.is_empty() {
        log::warn!("pattern '{pattern}' matched no files");
        return Ok(vec![input]);
    }

    matches.sort();
    log::debug!("pattern '{pattern}' matched {} file(s)", matches.len());
    Ok(matches
        .into_iter()
        .map(|path| MergeInput {
            path,
            pages: input.pages.clone(),
        })
        .collect())
}

async fn run_merge(config: &Config, json: bool) -> Result<()> {
    let formatter = OutputFormatter::from_config(config);
    let merger = config.merger()?;

    if config.dry_run {
        let plan = merger.plan(&config.request(true)).await?;
        if json {
            formatter.raw(&to_json(&plan)?);
        } else {
            display_plan(&formatter, &plan);
        }
        return Ok(());
    }

    let overwrite = confirm_overwrite(config, &formatter)?;
    formatter.debug(&format!(
        "Merging {} input(s) into {}",
        config.inputs.len(),
        config.output.display()
    ));
    let outcome = merger
        .merge(&config.request(overwrite), &CancellationToken::new())
        .await?;
    display_merge_outcome(&formatter, &outcome);
    Ok(())
}

/// Ask before replacing an existing output in prompt mode.
///
/// Quiet runs never prompt and behave like no-clobber.
fn confirm_overwrite(config: &Config, formatter: &OutputFormatter) -> Result<bool> {
    if config.overwrite_mode != OverwriteMode::Prompt || !config.output.exists() {
        return Ok(false);
    }
    if formatter.is_quiet() {
        return Err(MergeError::output_exists(config.output.clone()));
    }

    formatter.warning(&format!(
        "Output file already exists: {}",
        config.output.display()
    ));
    print!("Overwrite? [y/N]: ");
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    if is_yes(&response) {
        Ok(true)
    } else {
        Err(MergeError::Cancelled)
    }
}

fn is_yes(response: &str) -> bool {
    matches!(response.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn run_info(formatter: &OutputFormatter, args: &InspectArgs) -> Result<i32> {
    let validator = Validator::new();
    let mut infos = Vec::with_capacity(args.files.len());
    for path in &args.files {
        infos.push(validator.file_info(path).await?);
    }

    if args.json {
        formatter.raw(&to_json(&infos)?);
    } else {
        for info in &infos {
            display_info(formatter, info);
        }
    }
    Ok(0)
}

async fn run_validate(formatter: &OutputFormatter, args: &InspectArgs) -> Result<i32> {
    let report = Validator::new().validate_files(&args.files).await;
    if args.json {
        formatter.raw(&to_json(&report)?);
    } else {
        display_validation_report(formatter, &report);
    }
    Ok(if report.all_valid() { 0 } else { 3 })
}

fn run_recent(formatter: &OutputFormatter, args: &RecentArgs, path: &Path) -> Result<()> {
    let store = RecentFiles::open(path)?;

    if args.clear {
        store.clear()?;
        formatter.success("Cleared recent files");
        return Ok(());
    }
    if let Some(target) = &args.remove {
        if store.remove(target)? {
            formatter.success(&format!("Removed {}", target.display()));
        } else {
            formatter.warning(&format!("Not in recent files: {}", target.display()));
        }
        return Ok(());
    }

    let entries = store.list();
    if args.json {
        formatter.raw(&to_json(&entries)?);
    } else {
        display_recent(formatter, &entries);
    }
    Ok(())
}
