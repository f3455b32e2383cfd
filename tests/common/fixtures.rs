//! Song fixtures and wiring helpers.

use std::path::Path;
use std::sync::Arc;

use tunedl::config::DownloadConfig;
use tunedl::convert::AudioFormat;
use tunedl::download::DownloadManager;
use tunedl::progress::DisplayManager;
use tunedl::song::{AlbumMetadata, ArtistMetadata, ArtistRef, Song, TrackMetadata};

use super::fakes::{FakeFetcher, FakeSearchProvider, FakeTranscoder, NoopTagWriter};

/// A song by "Artist" on "Album" named after `name`. Unresolved: the
/// pipeline has to find its source first.
pub fn song(name: &str) -> Song {
    Song::new(
        TrackMetadata {
            id: format!("id-{}", name),
            name: name.to_string(),
            artists: vec![ArtistRef {
                id: "artist-1".to_string(),
                name: "Artist".to_string(),
            }],
            album: AlbumMetadata {
                name: "Album".to_string(),
                artists: vec![],
                release_date: "2021-01-01".to_string(),
                cover_url: None,
            },
            duration_ms: 180_000,
            track_number: 1,
            disc_number: 1,
            isrc: None,
        },
        ArtistMetadata::default(),
    )
}

/// A manager wired to fakes, downloading mp3s into `output_dir`. Returns
/// the fetcher handle so tests can inspect observed concurrency.
pub fn manager_for(
    output_dir: &Path,
    temp_dir: &Path,
    pool_size: usize,
    fetcher: FakeFetcher,
) -> (DownloadManager, Arc<FakeFetcher>) {
    manager_with(output_dir, temp_dir, pool_size, fetcher, FakeTranscoder::new())
}

pub fn manager_with(
    output_dir: &Path,
    temp_dir: &Path,
    pool_size: usize,
    fetcher: FakeFetcher,
    transcoder: FakeTranscoder,
) -> (DownloadManager, Arc<FakeFetcher>) {
    let config = DownloadConfig {
        output_dir: output_dir.to_path_buf(),
        temp_dir: temp_dir.to_path_buf(),
        format: AudioFormat::Mp3,
        pool_size,
        ffmpeg_path: "ffmpeg".to_string(),
    };
    let fetcher = Arc::new(fetcher);
    let manager = DownloadManager::new(
        config,
        Arc::new(FakeSearchProvider),
        fetcher.clone(),
        Arc::new(transcoder),
        Arc::new(NoopTagWriter),
        Arc::new(DisplayManager::hidden()),
    );
    (manager, fetcher)
}
