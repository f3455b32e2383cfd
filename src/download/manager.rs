//! The batch orchestrator.
//!
//! Owns the admission gate, the shared tracker and the display, spawns one
//! pipeline task per song and waits for all of them. Per-song failures are
//! absorbed here; a batch always runs to the end.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use tracing::error;

use crate::config::DownloadConfig;
use crate::convert::Transcoder;
use crate::fetch::AudioFetcher;
use crate::progress::{DisplayManager, FailureReport, ProgressCounts};
use crate::providers::SearchProvider;
use crate::song::Song;
use crate::tag::TagWriter;
use crate::tracking::{self, DownloadTracker, TrackingError};

use super::pipeline::SongPipeline;

/// Outcome of one batch: terminal counts plus the failure reports gathered
/// along the way.
#[derive(Debug)]
pub struct BatchSummary {
    pub counts: ProgressCounts,
    pub failures: Vec<FailureReport>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.counts.failed == 0
    }
}

/// Orchestrates concurrent song downloads over a shared pool.
pub struct DownloadManager {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn AudioFetcher>,
    transcoder: Arc<dyn Transcoder>,
    tags: Arc<dyn TagWriter>,
    tracker: Arc<Mutex<DownloadTracker>>,
    display: Arc<DisplayManager>,
    /// Admission gate: at most `pool_size` songs in flight end to end.
    admission: Arc<Semaphore>,
    /// Worker gate for the heavy sub-steps, same width as admission.
    workers: Arc<Semaphore>,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(
        config: DownloadConfig,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn AudioFetcher>,
        transcoder: Arc<dyn Transcoder>,
        tags: Arc<dyn TagWriter>,
        display: Arc<DisplayManager>,
    ) -> Self {
        let admission = Arc::new(Semaphore::new(config.pool_size));
        let workers = Arc::new(Semaphore::new(config.pool_size));
        Self {
            search,
            fetcher,
            transcoder,
            tags,
            tracker: Arc::new(Mutex::new(DownloadTracker::new())),
            display,
            admission,
            workers,
            config,
        }
    }

    /// Download one song, tracked like a one-song batch.
    pub async fn download_single(&self, song: Song) -> Result<BatchSummary, TrackingError> {
        self.run_all(vec![song]).await
    }

    /// Download a fresh list of songs. The tracking snapshot is written
    /// before the first download starts, so a crash at any point leaves a
    /// resumable file behind.
    pub async fn run_all(&self, songs: Vec<Song>) -> Result<BatchSummary, TrackingError> {
        self.prepare_dirs().await?;
        {
            let mut tracker = self.tracker.lock().await;
            tracker.clear();
            if let Some(path) = tracking::snapshot_path(&self.config.output_dir, &songs) {
                tracker.set_save_file(path);
            }
            tracker.load_songs(songs.clone())?;
        }
        Ok(self.run(songs).await)
    }

    /// Resume a previous run from its tracking file. Only the songs still
    /// recorded as pending are downloaded.
    pub async fn resume_from_tracking(&self, path: &Path) -> Result<BatchSummary, TrackingError> {
        self.prepare_dirs().await?;
        let songs = {
            let mut tracker = self.tracker.lock().await;
            tracker.clear();
            tracker.load_snapshot(path)?;
            tracker.songs().to_vec()
        };
        Ok(self.run(songs).await)
    }

    async fn prepare_dirs(&self) -> Result<(), TrackingError> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        Ok(())
    }

    async fn run(&self, songs: Vec<Song>) -> BatchSummary {
        self.display.begin(songs.len());

        let mut handles = Vec::with_capacity(songs.len());
        for song in songs {
            let admission = self.admission.clone();
            let display = self.display.clone();
            let mut pipeline = SongPipeline::new(
                self.search.clone(),
                self.fetcher.clone(),
                self.transcoder.clone(),
                self.tags.clone(),
                self.tracker.clone(),
                self.workers.clone(),
                self.config.output_dir.clone(),
                self.config.temp_dir.clone(),
                self.config.format,
            );

            handles.push(tokio::spawn(async move {
                // The permit brackets the whole pipeline run: resolution,
                // fetch, convert and tag all count against the pool.
                let _permit = admission
                    .acquire_owned()
                    .await
                    .expect("admission gate closed");

                let mut progress = display.tracker_for(&song);
                let display_name = song.display_name();
                if let Err(e) = pipeline.run(song, &mut progress).await {
                    progress.on_error(&e.to_string());
                    error!("\"{}\" failed: {}", display_name, e);
                }
            }));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("download task panicked: {}", e);
            }
        }

        self.display.finish();
        BatchSummary {
            counts: self.display.counts(),
            failures: self.display.failures(),
        }
    }
}
