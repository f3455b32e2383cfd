//! tunedl library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod convert;
pub mod download;
pub mod fetch;
pub mod gather;
pub mod matching;
pub mod progress;
pub mod providers;
pub mod song;
pub mod tag;
pub mod tracking;

// Re-export commonly used types for convenience
pub use config::{CliConfig, DownloadConfig, FileConfig};
pub use convert::AudioFormat;
pub use download::{BatchSummary, DownloadManager};
pub use gather::{GatherQuery, SongGatherer};
pub use song::Song;
pub use tracking::{DownloadTracker, TRACKING_EXTENSION};
