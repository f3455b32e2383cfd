//! Turning user queries into concrete song lists.
//!
//! A query is either a catalog URL (track, album, playlist, artist), the
//! saved-tracks request, or a free-text search term. The gatherer resolves
//! each into full metadata, following pagination to exhaustion, and attaches
//! lyrics where available. Source resolution is left to the download
//! pipeline.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::providers::{CatalogProvider, LyricsProvider};
use crate::song::Song;

/// A parsed user query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatherQuery {
    Track(String),
    Album(String),
    Playlist(String),
    Artist(String),
    Saved,
    Search(String),
}

impl GatherQuery {
    /// Classify a raw query string. Catalog URLs are recognized by their
    /// path segment; anything else is a search term.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains("open.spotify.com") {
            if let Some(id) = url_id(raw, "/track/") {
                return GatherQuery::Track(id);
            }
            if let Some(id) = url_id(raw, "/album/") {
                return GatherQuery::Album(id);
            }
            if let Some(id) = url_id(raw, "/playlist/") {
                return GatherQuery::Playlist(id);
            }
            if let Some(id) = url_id(raw, "/artist/") {
                return GatherQuery::Artist(id);
            }
        }
        GatherQuery::Search(raw.to_string())
    }
}

/// The id segment following `segment` in `url`, cut at the next delimiter.
fn url_id(url: &str, segment: &str) -> Option<String> {
    let start = url.find(segment)? + segment.len();
    let rest = &url[start..];
    let end = rest
        .find(['?', '/', '&', '#'])
        .unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then(|| id.to_string())
}

/// Resolves queries into songs ready for the download manager.
pub struct SongGatherer {
    catalog: Arc<dyn CatalogProvider>,
    lyrics: Arc<dyn LyricsProvider>,
}

impl SongGatherer {
    pub fn new(catalog: Arc<dyn CatalogProvider>, lyrics: Arc<dyn LyricsProvider>) -> Self {
        Self { catalog, lyrics }
    }

    pub async fn from_query(&self, raw: &str) -> Result<Vec<Song>> {
        match GatherQuery::parse(raw) {
            GatherQuery::Track(id) => self.from_track_id(&id).await,
            GatherQuery::Album(id) => self.from_album(&id).await,
            GatherQuery::Playlist(id) => self.from_playlist(&id).await,
            GatherQuery::Artist(id) => self.from_artist(&id).await,
            GatherQuery::Saved => self.from_saved().await,
            GatherQuery::Search(term) => self.from_search_term(&term).await,
        }
    }

    /// A single track by catalog id. Unknown ids gather nothing.
    pub async fn from_track_id(&self, track_id: &str) -> Result<Vec<Song>> {
        Ok(self.song_for(track_id).await?.into_iter().collect())
    }

    pub async fn from_album(&self, album_id: &str) -> Result<Vec<Song>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .catalog
                .album_tracks(album_id, cursor.as_deref())
                .await?;
            ids.extend(page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        self.gather_all(ids).await
    }

    pub async fn from_playlist(&self, playlist_id: &str) -> Result<Vec<Song>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .catalog
                .playlist_tracks(playlist_id, cursor.as_deref())
                .await?;
            ids.extend(page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        self.gather_all(ids).await
    }

    pub async fn from_artist(&self, artist_id: &str) -> Result<Vec<Song>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .catalog
                .artist_tracks(artist_id, cursor.as_deref())
                .await?;
            ids.extend(page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        self.gather_all(ids).await
    }

    pub async fn from_saved(&self) -> Result<Vec<Song>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.catalog.saved_tracks(cursor.as_deref()).await?;
            ids.extend(page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        self.gather_all(ids).await
    }

    /// Free-text search: the first resolvable result wins.
    pub async fn from_search_term(&self, term: &str) -> Result<Vec<Song>> {
        for id in self.catalog.search(term).await? {
            if let Some(song) = self.song_for(&id).await? {
                return Ok(vec![song]);
            }
        }
        info!("no track found for \"{}\"", term);
        Ok(Vec::new())
    }

    async fn gather_all(&self, ids: Vec<String>) -> Result<Vec<Song>> {
        let mut songs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(song) = self.song_for(&id).await? {
                songs.push(song);
            }
        }
        Ok(songs)
    }

    async fn song_for(&self, track_id: &str) -> Result<Option<Song>> {
        let Some((track, artist)) = self.catalog.track_by_id(track_id).await? else {
            warn!("track {} not found in catalog, skipping", track_id);
            return Ok(None);
        };
        let mut song = Song::new(track, artist);
        song.lyrics = self
            .lyrics
            .fetch(&song.track.name, &song.contributing_artists())
            .await;
        Ok(Some(song))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Page;
    use crate::song::{AlbumMetadata, ArtistMetadata, ArtistRef, TrackMetadata};
    use async_trait::async_trait;

    #[test]
    fn track_urls_are_classified_with_query_strings_stripped() {
        assert_eq!(
            GatherQuery::parse("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            GatherQuery::Track("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            GatherQuery::parse("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3"),
            GatherQuery::Album("1DFixLWuPkv3KT3TnV35m3".to_string())
        );
        assert_eq!(
            GatherQuery::parse("https://open.spotify.com/playlist/37i9dQZF1DX0XUsuxWHRQd/"),
            GatherQuery::Playlist("37i9dQZF1DX0XUsuxWHRQd".to_string())
        );
        assert_eq!(
            GatherQuery::parse("https://open.spotify.com/artist/0OdUWJ0sBjDrqHygGUXeCF"),
            GatherQuery::Artist("0OdUWJ0sBjDrqHygGUXeCF".to_string())
        );
    }

    #[test]
    fn anything_else_is_a_search_term() {
        assert_eq!(
            GatherQuery::parse("ruelle madness"),
            GatherQuery::Search("ruelle madness".to_string())
        );
        assert_eq!(
            GatherQuery::parse("  https://example.com/track/zzz  "),
            GatherQuery::Search("https://example.com/track/zzz".to_string())
        );
    }

    struct FakeCatalog {
        /// Album track ids split into pages.
        pages: Vec<Vec<String>>,
    }

    #[async_trait]
    impl CatalogProvider for FakeCatalog {
        async fn track_by_id(
            &self,
            id: &str,
        ) -> Result<Option<(TrackMetadata, ArtistMetadata)>> {
            if id == "missing" {
                return Ok(None);
            }
            Ok(Some((
                TrackMetadata {
                    id: id.to_string(),
                    name: format!("Song {}", id),
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
            )))
        }

        async fn album_tracks(&self, _: &str, cursor: Option<&str>) -> Result<Page<String>> {
            let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let next = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(Page {
                items: self.pages[index].clone(),
                next,
            })
        }

        async fn playlist_tracks(&self, _: &str, _: Option<&str>) -> Result<Page<String>> {
            Ok(Page::last(vec![]))
        }

        async fn artist_tracks(&self, _: &str, _: Option<&str>) -> Result<Page<String>> {
            Ok(Page::last(vec![]))
        }

        async fn saved_tracks(&self, _: Option<&str>) -> Result<Page<String>> {
            Ok(Page::last(vec![]))
        }

        async fn search(&self, _: &str) -> Result<Vec<String>> {
            Ok(vec!["missing".to_string(), "hit".to_string()])
        }
    }

    struct NoLyrics;

    #[async_trait]
    impl LyricsProvider for NoLyrics {
        async fn fetch(&self, _: &str, _: &[String]) -> Option<String> {
            None
        }
    }

    fn gatherer(pages: Vec<Vec<String>>) -> SongGatherer {
        SongGatherer::new(Arc::new(FakeCatalog { pages }), Arc::new(NoLyrics))
    }

    #[tokio::test]
    async fn album_pagination_is_followed_to_exhaustion() {
        let gatherer = gatherer(vec![
            vec!["t1".to_string(), "t2".to_string()],
            vec!["t3".to_string()],
            vec!["t4".to_string(), "t5".to_string()],
        ]);
        let songs = gatherer.from_album("whatever").await.unwrap();
        let ids: Vec<_> = songs.iter().map(|s| s.track.id.as_str()).collect();
        assert_eq!(ids, ["t1", "t2", "t3", "t4", "t5"]);
    }

    #[tokio::test]
    async fn unknown_tracks_are_skipped_not_fatal() {
        let gatherer = gatherer(vec![vec![
            "t1".to_string(),
            "missing".to_string(),
            "t2".to_string(),
        ]]);
        let songs = gatherer.from_album("whatever").await.unwrap();
        assert_eq!(songs.len(), 2);
    }

    #[tokio::test]
    async fn search_takes_the_first_resolvable_result() {
        let gatherer = gatherer(vec![]);
        let songs = gatherer.from_search_term("anything").await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].track.id, "hit");
    }
}
