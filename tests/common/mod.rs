//! Common test infrastructure
//!
//! This module provides the fakes and fixtures needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{manager_for, song, FakeFetcher};
//!
//! #[tokio::test]
//! async fn test_download() {
//!     let out = tempfile::TempDir::new().unwrap();
//!     let tmp = tempfile::TempDir::new().unwrap();
//!     let (manager, _fetcher) = manager_for(out.path(), tmp.path(), 4, FakeFetcher::new());
//!     let summary = manager.run_all(vec![song("One")]).await.unwrap();
//!     assert_eq!(summary.counts.completed, 1);
//! }
//! ```

mod fakes;
mod fixtures;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use fakes::{FakeFetcher, FakeSearchProvider, FakeTranscoder, NoopTagWriter};
#[allow(unused_imports)]
pub use fixtures::{manager_for, manager_with, song};
