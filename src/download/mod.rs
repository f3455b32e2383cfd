//! Concurrent download orchestration.

mod manager;
mod pipeline;

pub use manager::{BatchSummary, DownloadManager};
pub use pipeline::{DownloadError, DownloadPhase};
