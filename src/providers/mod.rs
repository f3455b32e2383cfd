//! External collaborator interfaces and their HTTP-backed implementations.

mod lyrics;
mod spotify;
mod ytmusic;

pub use lyrics::HttpLyricsProvider;
pub use spotify::SpotifyCatalogProvider;
pub use ytmusic::YtMusicSearchProvider;

use anyhow::Result;
use async_trait::async_trait;

use crate::matching::Candidate;
use crate::song::{ArtistMetadata, TrackMetadata};

/// One page of a paginated catalog listing. The caller follows `next`
/// cursors until exhausted.
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// The catalog metadata provider: resolves ids into typed metadata and
/// enumerates track ids for collections.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Full metadata for one track, `None` when the id is unknown.
    async fn track_by_id(&self, id: &str) -> Result<Option<(TrackMetadata, ArtistMetadata)>>;

    /// Track ids of an album, one page at a time.
    async fn album_tracks(&self, album_id: &str, cursor: Option<&str>) -> Result<Page<String>>;

    /// Track ids of a playlist, one page at a time.
    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<String>>;

    /// Track ids across an artist's albums and singles, one page at a time.
    async fn artist_tracks(&self, artist_id: &str, cursor: Option<&str>) -> Result<Page<String>>;

    /// Track ids of the authorized user's saved tracks, one page at a time.
    async fn saved_tracks(&self, cursor: Option<&str>) -> Result<Page<String>>;

    /// Ranked track ids for a free-text query.
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// The audio source search provider.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Candidates for a track, in the provider's ranking order. The order
    /// matters: the selector uses it as the deterministic tie-breaker.
    async fn find_candidates(
        &self,
        title: &str,
        artists: &[String],
        album: Option<&str>,
        duration_secs: f64,
        isrc: Option<&str>,
    ) -> Result<Vec<Candidate>>;
}

/// The lyrics text provider. Failures are swallowed by implementations and
/// logged; absent lyrics is a normal outcome.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    async fn fetch(&self, title: &str, artists: &[String]) -> Option<String>;
}
