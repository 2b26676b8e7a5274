//! PDF merging operations.
//!
//! The merge pipeline is split into:
//! - [`extract`]: one page plus the objects it transitively references
//! - [`builder`]: renumbering and relinking pages from many sources into a
//!   fresh document with a flat page tree
//! - [`merger`]: the async orchestrator tying reading, range resolution,
//!   assembly and output together
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::merge::{CancellationToken, MergeInput, MergeRequest, Merger};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = MergeRequest::to_file(
//!     vec![MergeInput::all("a.pdf"), MergeInput::new("b.pdf", "2-1")?],
//!     "merged.pdf",
//! );
//! let outcome = Merger::new().merge(&request, &CancellationToken::new()).await?;
//! println!("Merged {} pages", outcome.statistics.total_pages);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cancel;
pub mod extract;
pub mod merger;

pub use builder::{MergeBuilder, verify_references};
pub use cancel::CancellationToken;
pub use extract::{ExtractedPage, extract_page, extract_pages};
pub use merger::{
    MergeInput, MergeOutcome, MergeOutput, MergePlan, MergeRequest, MergeStatistics, Merger,
    OutputTarget, PlannedInput,
};

use crate::error::Result;

/// Merge `inputs` into an in-memory PDF.
///
/// Convenience function that creates a merger and performs the merge.
///
/// # Errors
///
/// Returns an error if any merge step fails.
///
/// # Examples
///
/// ```no_run
/// use pdfmerge::merge::{merge_to_bytes, MergeInput};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (bytes, stats) = merge_to_bytes(vec![MergeInput::all("a.pdf")]).await?;
/// println!("Created {} page document ({} bytes)", stats.total_pages, bytes.len());
/// # Ok(())
/// # }
/// ```
pub async fn merge_to_bytes(inputs: Vec<MergeInput>) -> Result<(Vec<u8>, MergeStatistics)> {
    let request = MergeRequest::to_memory(inputs);
    let outcome = Merger::new().merge(&request, &CancellationToken::new()).await?;
    match outcome.output {
        MergeOutput::Memory(bytes) => Ok((bytes, outcome.statistics)),
        MergeOutput::File(path) => Ok((tokio::fs::read(path).await?, outcome.statistics)),
    }
}
