//! In-memory stand-ins for the network and process seams.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use tunedl::convert::{AudioFormat, ConversionError, Transcoder};
use tunedl::fetch::{AudioFetcher, FetchError, ProgressFn};
use tunedl::matching::Candidate;
use tunedl::providers::SearchProvider;
use tunedl::tag::{TagError, TagWriter};

/// Returns one perfect candidate per request, linked as `fake://<title>`.
pub struct FakeSearchProvider;

#[async_trait]
impl SearchProvider for FakeSearchProvider {
    async fn find_candidates(
        &self,
        title: &str,
        artists: &[String],
        album: Option<&str>,
        duration_secs: f64,
        _isrc: Option<&str>,
    ) -> Result<Vec<Candidate>> {
        Ok(vec![Candidate {
            name: title.to_string(),
            artist: artists.join(", "),
            album: album.map(str::to_string),
            duration_secs,
            link: format!("fake://{}", title),
        }])
    }
}

/// Writes a small payload after a short pause, tracking how many fetches
/// were in flight at once. Songs whose link contains a configured marker
/// fail with a server error.
pub struct FakeFetcher {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_markers: Vec<String>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::failing_on(&[])
    }

    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_markers: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Highest number of concurrently running fetches observed so far.
    pub fn max_seen(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioFetcher for FakeFetcher {
    async fn fetch(
        &self,
        source_link: &str,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        // Long enough for other fetches to overlap.
        tokio::time::sleep(Duration::from_millis(25)).await;

        let result = if self
            .fail_markers
            .iter()
            .any(|marker| source_link.contains(marker.as_str()))
        {
            Err(FetchError::Status(500))
        } else {
            let payload = b"fake audio bytes";
            std::fs::write(dest, payload)?;
            on_progress(payload.len() as u64, Some(payload.len() as u64));
            Ok(payload.len() as u64)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Copies input to output; optionally fails after leaving a partial file
/// behind, the way a crashed converter would.
pub struct FakeTranscoder {
    fail: bool,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _format: AudioFormat,
    ) -> Result<(), ConversionError> {
        if self.fail {
            std::fs::write(output, b"partial")?;
            return Err(ConversionError::ConversionFailed(
                "simulated converter crash".to_string(),
            ));
        }
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Tag writer that does nothing; tagging is exercised separately.
pub struct NoopTagWriter;

#[async_trait]
impl TagWriter for NoopTagWriter {
    async fn embed(
        &self,
        _path: &Path,
        _song: &tunedl::song::Song,
        _format: AudioFormat,
    ) -> Result<(), TagError> {
        Ok(())
    }
}
