//! The per-song state machine.
//!
//! Drives one song from source resolution through fetch, conversion and
//! tagging to completion, with skip/fail side exits. All per-song errors
//! stop at this boundary; the orchestrator only ever observes a terminal
//! phase.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use crate::convert::{AudioFormat, ConversionError, Transcoder};
use crate::fetch::{clean_partials, AudioFetcher, FetchError};
use crate::matching::MatchSelector;
use crate::progress::SongTracker;
use crate::providers::SearchProvider;
use crate::song::Song;
use crate::tag::TagWriter;
use crate::tracking::DownloadTracker;

/// Lifecycle states of one song. Strictly forward-moving; no state is ever
/// revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Pending,
    SourceResolving,
    SourceResolved,
    Fetching,
    Fetched,
    Converting,
    Converted,
    Tagging,
    Complete,
    Skipped,
    Failed,
}

/// Per-song failure reasons. These are reported, never propagated to the
/// orchestrator.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("no source matched \"{0}\"")]
    NoMatch(String),

    #[error("audio fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("conversion failed: {0}")]
    Convert(#[from] ConversionError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// One song's pipeline. Owns the song's mutable fields while running.
pub(crate) struct SongPipeline {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn AudioFetcher>,
    transcoder: Arc<dyn Transcoder>,
    tags: Arc<dyn TagWriter>,
    tracker: Arc<Mutex<DownloadTracker>>,
    /// Gate for network/process-bound sub-steps, sized like the admission
    /// gate so heavy work cannot oversubscribe.
    workers: Arc<Semaphore>,
    output_dir: PathBuf,
    temp_dir: PathBuf,
    format: AudioFormat,
    phase: DownloadPhase,
}

impl SongPipeline {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn AudioFetcher>,
        transcoder: Arc<dyn Transcoder>,
        tags: Arc<dyn TagWriter>,
        tracker: Arc<Mutex<DownloadTracker>>,
        workers: Arc<Semaphore>,
        output_dir: PathBuf,
        temp_dir: PathBuf,
        format: AudioFormat,
    ) -> Self {
        Self {
            search,
            fetcher,
            transcoder,
            tags,
            tracker,
            workers,
            output_dir,
            temp_dir,
            format,
            phase: DownloadPhase::Pending,
        }
    }

    /// Run the state machine to a terminal phase.
    ///
    /// The pristine snapshot of the song is what gets removed from the
    /// tracker: the tracking queue stores songs as submitted, and removal
    /// is by structural equality.
    pub(crate) async fn run(
        &mut self,
        song: Song,
        progress: &mut SongTracker,
    ) -> Result<DownloadPhase, DownloadError> {
        let pristine = song.clone();
        let mut song = song;

        let base_name = song.file_name();
        let final_path = self
            .output_dir
            .join(format!("{}.{}", base_name, self.format));

        // Idempotence: re-running over an already-populated output
        // directory is a per-song no-op, checked before any network work.
        if final_path.is_file() {
            self.phase = DownloadPhase::Skipped;
            info!("skipping \"{}\", already downloaded", song.display_name());
            progress.on_skip();
            self.mark_complete(&pristine).await;
            return Ok(self.phase);
        }

        if song.source_link.is_none() {
            self.phase = DownloadPhase::SourceResolving;
            let link = self.resolve_source(&song).await?;
            progress.set_source_link(&link);
            song.source_link = Some(link);
            self.phase = DownloadPhase::SourceResolved;
        }

        let source_link = song
            .source_link
            .clone()
            .ok_or_else(|| DownloadError::NoMatch(song.display_name()))?;
        let temp_path = self.temp_dir.join(format!("{}.download", base_name));

        self.phase = DownloadPhase::Fetching;
        {
            let _permit = self
                .workers
                .acquire()
                .await
                .expect("worker gate closed");
            let on_progress = |read: u64, total: Option<u64>| {
                progress.on_fetch_progress(read, total);
            };
            if let Err(e) = self
                .fetcher
                .fetch(&source_link, &temp_path, &on_progress)
                .await
            {
                // The song stays in the tracking queue for the next run.
                if let Err(cleanup) = clean_partials(&self.temp_dir, &base_name) {
                    warn!("could not clean partial files for '{}': {}", base_name, cleanup);
                }
                self.phase = DownloadPhase::Failed;
                return Err(e.into());
            }
        }
        self.phase = DownloadPhase::Fetched;
        progress.on_fetch_done();

        self.phase = DownloadPhase::Converting;
        {
            let _permit = self
                .workers
                .acquire()
                .await
                .expect("worker gate closed");
            if let Err(e) = self
                .transcoder
                .transcode(&temp_path, &final_path, self.format)
                .await
            {
                // Never leave a corrupt partial artifact at the final path.
                if final_path.exists() {
                    if let Err(cleanup) = std::fs::remove_file(&final_path) {
                        warn!(
                            "could not remove partial artifact {}: {}",
                            final_path.display(),
                            cleanup
                        );
                    }
                }
                self.phase = DownloadPhase::Failed;
                return Err(e.into());
            }
        }
        self.phase = DownloadPhase::Converted;
        progress.on_convert_done();

        self.phase = DownloadPhase::Tagging;
        if let Err(e) = self.tags.embed(&final_path, &song, self.format).await {
            // Best-effort: a failed tag write does not revert the convert.
            warn!("tag embedding failed for \"{}\": {}", song.display_name(), e);
        }

        self.phase = DownloadPhase::Complete;
        if temp_path.is_file() {
            if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                warn!("could not remove temp file {}: {}", temp_path.display(), e);
            }
        }
        progress.on_complete();
        self.mark_complete(&pristine).await;

        info!("downloaded \"{}\"", song.display_name());
        Ok(self.phase)
    }

    /// Ask the search provider for candidates and let the selector pick.
    /// No candidate above threshold is a definite no-match, reported and
    /// not retried.
    async fn resolve_source(&self, song: &Song) -> Result<String, DownloadError> {
        let candidates = self
            .search
            .find_candidates(
                &song.track.name,
                &song.contributing_artists(),
                Some(&song.track.album.name),
                song.duration_secs(),
                song.track.isrc.as_deref(),
            )
            .await
            .map_err(|e| DownloadError::NoMatch(format!("{}: {}", song.display_name(), e)))?;

        MatchSelector
            .select(song, &candidates)
            .map(|best| best.link)
            .ok_or_else(|| DownloadError::NoMatch(song.display_name()))
    }

    async fn mark_complete(&self, song: &Song) {
        if let Err(e) = self.tracker.lock().await.mark_complete(song) {
            warn!(
                "failed to update tracking file after \"{}\": {}",
                song.display_name(),
                e
            );
        }
    }
}
