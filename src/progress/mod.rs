//! Progress aggregation across concurrently running pipelines.
//!
//! Each pipeline gets a [`SongTracker`] handle; the shared totals are plain
//! atomic counters so updates from different songs compose in any
//! interleaving. The aggregator observes, it never influences control flow.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::error;

use crate::song::Song;

/// Each song counts for 100 points of overall progress: 90 for the fetch,
/// 5 for conversion, 5 for tagging. The constants are the cumulative
/// positions a song's bar sits at after each stage.
const SONG_POINTS: u64 = 100;
const FETCH_POINTS: u64 = 90;
const CONVERT_DONE_POINTS: u64 = FETCH_POINTS + 5;

/// Final tallies of a batch, queryable once the orchestrator returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressCounts {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A reported per-song failure with enough context to be actionable.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub display_name: String,
    pub source_link: Option<String>,
    pub reason: String,
}

#[derive(Default)]
struct Totals {
    completed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    overall: AtomicU64,
    failures: Mutex<Vec<FailureReport>>,
}

/// Aggregates lifecycle events from all pipelines into one overall view.
pub struct DisplayManager {
    totals: Arc<Totals>,
    bars: MultiProgress,
    overall: Mutex<Option<ProgressBar>>,
}

impl DisplayManager {
    /// A manager rendering to the terminal.
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    /// A headless manager; counters still aggregate, nothing is drawn.
    /// Used by tests and by quiet mode.
    pub fn hidden() -> Self {
        Self::with_quiet(true)
    }

    fn with_quiet(quiet: bool) -> Self {
        let bars = if quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        Self {
            totals: Arc::new(Totals::default()),
            bars,
            overall: Mutex::new(None),
        }
    }

    /// Start a new batch of `total_songs`: reset the totals and size the
    /// overall bar. Counts and failures always describe the current batch,
    /// even when one manager runs several in sequence.
    pub fn begin(&self, total_songs: usize) {
        self.totals.completed.store(0, Ordering::SeqCst);
        self.totals.skipped.store(0, Ordering::SeqCst);
        self.totals.failed.store(0, Ordering::SeqCst);
        self.totals.overall.store(0, Ordering::SeqCst);
        self.totals
            .failures
            .lock()
            .expect("progress lock poisoned")
            .clear();

        let bar = self.bars.add(ProgressBar::new(total_songs as u64 * SONG_POINTS));
        bar.set_style(overall_style());
        bar.set_message("Total");
        *self.overall.lock().expect("progress lock poisoned") = Some(bar);
    }

    /// New per-song tracker handle for one pipeline.
    pub fn tracker_for(&self, song: &Song) -> SongTracker {
        let bar = self.bars.add(ProgressBar::new(SONG_POINTS));
        bar.set_style(song_style());
        bar.set_message(song.display_name());
        SongTracker {
            totals: self.totals.clone(),
            overall: self.overall_bar(),
            bar,
            display_name: song.display_name(),
            source_link: song.source_link.clone(),
            points: AtomicU64::new(0),
        }
    }

    /// Final counts; commutative counters, safe to read any time.
    pub fn counts(&self) -> ProgressCounts {
        ProgressCounts {
            completed: self.totals.completed.load(Ordering::SeqCst),
            skipped: self.totals.skipped.load(Ordering::SeqCst),
            failed: self.totals.failed.load(Ordering::SeqCst),
        }
    }

    /// Failures recorded so far, in completion order.
    pub fn failures(&self) -> Vec<FailureReport> {
        self.totals
            .failures
            .lock()
            .expect("progress lock poisoned")
            .clone()
    }

    fn overall_bar(&self) -> Option<ProgressBar> {
        self.overall
            .lock()
            .expect("progress lock poisoned")
            .clone()
    }

    /// Finish the overall bar; call after the batch settles.
    pub fn finish(&self) {
        if let Some(bar) = self.overall_bar() {
            bar.finish();
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:20} {bar:40} {percent:>3}%")
        .expect("valid progress template")
}

fn song_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:40!} {bar:30} {percent:>3}%")
        .expect("valid progress template")
}

/// Handle through which one pipeline reports its lifecycle events.
pub struct SongTracker {
    totals: Arc<Totals>,
    overall: Option<ProgressBar>,
    bar: ProgressBar,
    display_name: String,
    source_link: Option<String>,
    /// Points this song has contributed so far, 0..=100.
    points: AtomicU64,
}

impl SongTracker {
    /// Bytes received out of an optional known total; advances the fetch
    /// share of this song's points.
    pub fn on_fetch_progress(&self, bytes_read: u64, total_bytes: Option<u64>) {
        let target = match total_bytes {
            Some(total) if total > 0 => {
                (bytes_read.min(total) * FETCH_POINTS / total).min(FETCH_POINTS)
            }
            // Unknown size: hold at the fetch boundary until on_fetch_done.
            _ => 0,
        };
        self.advance_to(target, "Downloading");
    }

    pub fn on_fetch_done(&self) {
        self.advance_to(FETCH_POINTS, "Converting");
    }

    pub fn on_convert_done(&self) {
        self.advance_to(CONVERT_DONE_POINTS, "Tagging");
    }

    /// The final artifact already existed; the song is done without work.
    pub fn on_skip(&self) {
        self.totals.skipped.fetch_add(1, Ordering::SeqCst);
        self.advance_to(SONG_POINTS, "Skipped");
        self.bar.finish();
    }

    pub fn on_complete(&self) {
        self.totals.completed.fetch_add(1, Ordering::SeqCst);
        self.advance_to(SONG_POINTS, "Done");
        self.bar.finish();
    }

    /// Record a per-song failure. The bar freezes where it was.
    pub fn on_error(&self, reason: &str) {
        self.totals.failed.fetch_add(1, Ordering::SeqCst);
        self.totals
            .failures
            .lock()
            .expect("progress lock poisoned")
            .push(FailureReport {
                display_name: self.display_name.clone(),
                source_link: self.source_link.clone(),
                reason: reason.to_string(),
            });
        error!("{}: {}", self.display_name, reason);
        self.bar.abandon_with_message(format!("Error: {}", reason));
    }

    /// Set the source link once resolution succeeds, so failure reports
    /// after this point carry it.
    pub fn set_source_link(&mut self, link: &str) {
        self.source_link = Some(link.to_string());
    }

    /// Move this song's points monotonically forward to `target` and push
    /// the delta into the overall bar. Deltas from different songs sum in
    /// any order.
    fn advance_to(&self, target: u64, status: &str) {
        let previous = self
            .points
            .fetch_max(target, Ordering::SeqCst)
            .min(target);
        let delta = target - previous;

        self.bar.set_position(target);
        self.bar.set_message(format!("{} - {}", self.display_name, status));
        if delta > 0 {
            self.totals.overall.fetch_add(delta, Ordering::SeqCst);
            if let Some(overall) = &self.overall {
                overall.inc(delta);
            }
        }
    }
}
