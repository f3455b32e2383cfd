//! Metadata tag embedding into finished artifacts.
//!
//! Best-effort by contract: a tagging failure is logged and never reverts a
//! successful conversion.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::{Accessor, TagExt};
use lofty::tag::{ItemKey, Tag, TagType};
use thiserror::Error;
use tracing::debug;

use crate::convert::AudioFormat;
use crate::song::Song;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("tag write failed: {0}")]
    Write(#[from] lofty::error::LoftyError),

    #[error("tag task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The tag-embedding seam, invoked only after a successful transcode.
#[async_trait]
pub trait TagWriter: Send + Sync {
    async fn embed(&self, path: &Path, song: &Song, format: AudioFormat) -> Result<(), TagError>;
}

/// lofty-backed tag writer; also fetches cover art when the album carries a
/// cover URL.
pub struct LoftyTagWriter {
    client: reqwest::Client,
}

impl LoftyTagWriter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Cover art bytes, or `None` on any failure — art is decoration, not a
    /// reason to fail the song.
    async fn fetch_cover_art(&self, url: &str) -> Option<Vec<u8>> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            debug!("cover art fetch returned {}", response.status());
            return None;
        }
        response.bytes().await.ok().map(|b| b.to_vec())
    }
}

impl Default for LoftyTagWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn tag_type_for(format: AudioFormat) -> TagType {
    match format {
        AudioFormat::Mp3 => TagType::Id3v2,
        AudioFormat::M4a => TagType::Mp4Ilst,
        AudioFormat::Flac | AudioFormat::Ogg | AudioFormat::Opus => TagType::VorbisComments,
    }
}

#[async_trait]
impl TagWriter for LoftyTagWriter {
    async fn embed(&self, path: &Path, song: &Song, format: AudioFormat) -> Result<(), TagError> {
        let mut tag = Tag::new(tag_type_for(format));

        tag.set_title(song.track.name.clone());
        tag.set_artist(song.contributing_artists().join(", "));
        tag.set_album(song.track.album.name.clone());
        tag.set_track(song.track.track_number);
        tag.set_disk(song.track.disc_number);

        if let Some(album_artist) = song.track.album.artists.first() {
            tag.insert_text(ItemKey::AlbumArtist, album_artist.name.clone());
        }
        if !song.track.album.release_date.is_empty() {
            tag.insert_text(ItemKey::RecordingDate, song.track.album.release_date.clone());
        }
        if let Some(genre) = song.genres().first() {
            tag.set_genre(genre.clone());
        }
        if let Some(lyrics) = &song.lyrics {
            tag.insert_text(ItemKey::Lyrics, lyrics.clone());
        }

        if let Some(cover_url) = &song.track.album.cover_url {
            if let Some(bytes) = self.fetch_cover_art(cover_url).await {
                tag.push_picture(Picture::new_unchecked(
                    PictureType::CoverFront,
                    Some(MimeType::Jpeg),
                    None,
                    bytes,
                ));
            }
        }

        // lofty writes synchronously; keep it off the async threads
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || tag.save_to_path(&path, WriteOptions::default()))
            .await??;

        Ok(())
    }
}
