//! Durable tracking of songs that are not yet downloaded.
//!
//! The tracker holds the in-memory queue of pending songs and mirrors it to
//! a snapshot file after every completion, so a crash loses at most the
//! in-flight work of songs still running. The snapshot is a versioned JSON
//! envelope parsed back through serde, never an evaluable blob.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::song::Song;

/// File extension of tracking snapshots; resume input is recognized by it.
pub const TRACKING_EXTENSION: &str = "tunedl-tracking.json";

const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised by snapshot load/save operations.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("no such tracking file: {0}")]
    NotFound(PathBuf),

    #[error("corrupt tracking file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("unsupported tracking file version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("tracking file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    songs: Vec<Song>,
}

/// The durable work queue.
///
/// There is a single logical writer: rewrites happen only from completion
/// callbacks, which the orchestrator serializes relative to each other.
#[derive(Debug, Default)]
pub struct DownloadTracker {
    songs: Vec<Song>,
    save_file: Option<PathBuf>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the in-memory queue and forget the backing file reference.
    pub fn clear(&mut self) {
        self.songs.clear();
        self.save_file = None;
    }

    /// Songs yet to be downloaded.
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Pin the snapshot to an explicit location before loading songs.
    pub fn set_save_file(&mut self, path: PathBuf) {
        self.save_file = Some(path);
    }

    /// Read a persisted snapshot and adopt it as the live queue. The file
    /// becomes the backing file for subsequent rewrites.
    pub fn load_snapshot(&mut self, path: &Path) -> Result<(), TrackingError> {
        if !path.is_file() {
            return Err(TrackingError::NotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| TrackingError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TrackingError::UnsupportedVersion {
                found: snapshot.version,
            });
        }

        info!(
            "resuming {} pending songs from {}",
            snapshot.songs.len(),
            path.display()
        );

        self.songs = snapshot.songs;
        self.save_file = Some(path.to_path_buf());
        Ok(())
    }

    /// Adopt a fresh song list (not from disk) and persist it immediately.
    pub fn load_songs(&mut self, songs: Vec<Song>) -> Result<(), TrackingError> {
        self.songs = songs;
        self.backup_to_disk()
    }

    /// Remove a completed song from the queue by structural equality and
    /// rewrite the snapshot. When the queue drains the backing file is
    /// deleted rather than left as an empty record.
    pub fn mark_complete(&mut self, song: &Song) -> Result<(), TrackingError> {
        if let Some(position) = self.songs.iter().position(|s| s == song) {
            self.songs.remove(position);
        }
        self.backup_to_disk()
    }

    /// Whole-file replace-on-write of the current queue.
    fn backup_to_disk(&mut self) -> Result<(), TrackingError> {
        if self.songs.is_empty() {
            if let Some(file) = &self.save_file {
                if file.is_file() {
                    debug!("queue drained, removing {}", file.display());
                    std::fs::remove_file(file)?;
                }
            }
            return Ok(());
        }

        let file = match &self.save_file {
            Some(file) => file.clone(),
            None => {
                let file = PathBuf::from(format!(
                    "{}.{}",
                    derive_snapshot_stem(&self.songs[0].track.name),
                    TRACKING_EXTENSION
                ));
                self.save_file = Some(file.clone());
                file
            }
        };

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            songs: self.songs.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|e| TrackingError::Corrupt {
            path: file.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&file, bytes)?;
        Ok(())
    }
}

/// Default snapshot location for a fresh batch: named after the first
/// song's title, placed in `dir`. `None` for an empty batch.
pub fn snapshot_path(dir: &Path, songs: &[Song]) -> Option<PathBuf> {
    songs.first().map(|song| {
        dir.join(format!(
            "{}.{}",
            derive_snapshot_stem(&song.track.name),
            TRACKING_EXTENSION
        ))
    })
}

/// Snapshot names are derived from a song title, with path-hostile
/// characters stripped and quote/colon substituted rather than dropped.
fn derive_snapshot_stem(song_name: &str) -> String {
    let stripped: String = song_name
        .chars()
        .filter(|c| !"/?\\*|<>".contains(*c))
        .collect();
    stripped.replace('"', "'").replace(':', " - ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{AlbumMetadata, ArtistMetadata, ArtistRef, TrackMetadata};
    use tempfile::TempDir;

    fn song(name: &str) -> Song {
        Song::new(
            TrackMetadata {
                id: name.to_string(),
                name: name.to_string(),
                artists: vec![ArtistRef {
                    id: "a".to_string(),
                    name: "Artist".to_string(),
                }],
                album: AlbumMetadata {
                    name: "Album".to_string(),
                    artists: vec![],
                    release_date: String::new(),
                    cover_url: None,
                },
                duration_ms: 1000,
                track_number: 1,
                disc_number: 1,
                isrc: None,
            },
            ArtistMetadata::default(),
        )
    }

    fn tracker_in(dir: &TempDir, name: &str) -> (DownloadTracker, PathBuf) {
        let path = dir.path().join(name);
        let mut tracker = DownloadTracker::new();
        tracker.save_file = Some(path.clone());
        (tracker, path)
    }

    #[test]
    fn load_songs_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let (mut tracker, path) = tracker_in(&dir, "queue.tunedl-tracking.json");
        tracker.load_songs(vec![song("one"), song("two")]).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn resume_yields_exactly_the_incomplete_songs() {
        let dir = TempDir::new().unwrap();
        let (mut tracker, path) = tracker_in(&dir, "queue.tunedl-tracking.json");
        let songs = vec![song("one"), song("two"), song("three")];
        tracker.load_songs(songs.clone()).unwrap();
        tracker.mark_complete(&songs[1]).unwrap();

        let mut resumed = DownloadTracker::new();
        resumed.load_snapshot(&path).unwrap();
        assert_eq!(resumed.songs(), &[songs[0].clone(), songs[2].clone()]);
    }

    #[test]
    fn snapshot_deleted_once_queue_drains() {
        let dir = TempDir::new().unwrap();
        let (mut tracker, path) = tracker_in(&dir, "queue.tunedl-tracking.json");
        let songs = vec![song("one"), song("two")];
        tracker.load_songs(songs.clone()).unwrap();

        tracker.mark_complete(&songs[0]).unwrap();
        assert!(path.is_file());
        tracker.mark_complete(&songs[1]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut tracker = DownloadTracker::new();
        let err = tracker
            .load_snapshot(&dir.path().join("nope.tunedl-tracking.json"))
            .unwrap_err();
        assert!(matches!(err, TrackingError::NotFound(_)));
    }

    #[test]
    fn corrupt_snapshot_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.tunedl-tracking.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let mut tracker = DownloadTracker::new();
        let err = tracker.load_snapshot(&path).unwrap_err();
        assert!(matches!(err, TrackingError::Corrupt { .. }));
    }

    #[test]
    fn future_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v9.tunedl-tracking.json");
        std::fs::write(&path, br#"{"version":9,"songs":[]}"#).unwrap();

        let mut tracker = DownloadTracker::new();
        let err = tracker.load_snapshot(&path).unwrap_err();
        assert!(matches!(
            err,
            TrackingError::UnsupportedVersion { found: 9 }
        ));
    }

    #[test]
    fn snapshot_stem_substitutes_rather_than_drops() {
        assert_eq!(
            derive_snapshot_stem("What: \"Why\"? <x>/|y\\*"),
            "What -  'Why' xy"
        );
    }

    #[test]
    fn clear_forgets_the_backing_file() {
        let dir = TempDir::new().unwrap();
        let (mut tracker, path) = tracker_in(&dir, "queue.tunedl-tracking.json");
        tracker.load_songs(vec![song("one")]).unwrap();
        tracker.clear();
        assert!(tracker.songs().is_empty());
        // The file stays on disk; only the reference is forgotten.
        assert!(path.is_file());
    }
}
