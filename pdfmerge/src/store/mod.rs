//! Metadata stores shared across operations.

pub mod recent;

pub use recent::{MAX_RECENT_FILES, RecentFile, RecentFiles};
