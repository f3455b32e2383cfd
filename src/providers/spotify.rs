//! Spotify Web API catalog provider.
//!
//! One explicit client object holds the HTTP client and the access token;
//! it is constructed once and passed by reference into every collaborator
//! call. There is no ambient global.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::song::{AlbumMetadata, ArtistMetadata, ArtistRef, TrackMetadata};

use super::{CatalogProvider, Page};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Catalog provider backed by the Spotify Web API.
pub struct SpotifyCatalogProvider {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiArtistRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtistRef>,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiExternalIds {
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: String,
    name: String,
    artists: Vec<ApiArtistRef>,
    album: ApiAlbum,
    duration_ms: u64,
    #[serde(default)]
    track_number: u32,
    #[serde(default)]
    disc_number: u32,
    #[serde(default)]
    external_ids: ApiExternalIds,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    #[serde(default)]
    genres: Vec<String>,
}

/// Generic offset-based paging envelope; `next` is a full URL the caller
/// can follow directly.
#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    track: Option<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct SavedEntry {
    track: Option<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Paging<IdOnly>,
}

impl SpotifyCatalogProvider {
    /// Exchange client credentials for an access token and build the
    /// provider. Fails fast when the credentials are rejected.
    pub async fn connect(client_id: &str, client_secret: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let response = client
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("Failed to reach the Spotify token endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Spotify token request failed with status: {}",
                response.status()
            );
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse Spotify token response")?;

        Ok(Self {
            client,
            access_token: token.access_token,
            base_url: API_BASE.to_string(),
        })
    }

    /// Provider pointed at a different base URL; used by tests.
    #[allow(dead_code)]
    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("{} returned status {}", url, response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Follow an explicit cursor when present, otherwise start at `first`.
    async fn page_of<T: serde::de::DeserializeOwned>(
        &self,
        first: String,
        cursor: Option<&str>,
    ) -> Result<Paging<T>> {
        let url = cursor.map(str::to_string).unwrap_or(first);
        self.get_json(&url).await
    }
}

fn track_from_api(track: ApiTrack) -> TrackMetadata {
    TrackMetadata {
        id: track.id,
        name: track.name,
        artists: track
            .artists
            .into_iter()
            .map(|a| ArtistRef {
                id: a.id,
                name: a.name,
            })
            .collect(),
        album: AlbumMetadata {
            name: track.album.name,
            artists: track
                .album
                .artists
                .into_iter()
                .map(|a| ArtistRef {
                    id: a.id,
                    name: a.name,
                })
                .collect(),
            release_date: track.album.release_date,
            cover_url: track.album.images.first().map(|i| i.url.clone()),
        },
        duration_ms: track.duration_ms,
        track_number: track.track_number,
        disc_number: track.disc_number,
        isrc: track.external_ids.isrc,
    }
}

#[async_trait]
impl CatalogProvider for SpotifyCatalogProvider {
    async fn track_by_id(&self, id: &str) -> Result<Option<(TrackMetadata, ArtistMetadata)>> {
        let url = format!("{}/tracks/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch track {}", id))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch track {}: status {}", id, response.status());
        }

        let api_track: ApiTrack = response
            .json()
            .await
            .context("Failed to parse track response")?;

        // Genres live on the artist object, not the track.
        let artist_meta = match api_track.artists.first() {
            Some(primary) => {
                let artist: ApiArtist = self
                    .get_json(&format!("{}/artists/{}", self.base_url, primary.id))
                    .await
                    .unwrap_or(ApiArtist { genres: vec![] });
                ArtistMetadata {
                    genres: artist.genres,
                }
            }
            None => ArtistMetadata::default(),
        };

        Ok(Some((track_from_api(api_track), artist_meta)))
    }

    async fn album_tracks(&self, album_id: &str, cursor: Option<&str>) -> Result<Page<String>> {
        let first = format!("{}/albums/{}/tracks?limit=50", self.base_url, album_id);
        let page: Paging<IdOnly> = self.page_of(first, cursor).await?;
        Ok(Page {
            items: page.items.into_iter().filter_map(|t| t.id).collect(),
            next: page.next,
        })
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<String>> {
        let first = format!("{}/playlists/{}/tracks?limit=100", self.base_url, playlist_id);
        let page: Paging<PlaylistEntry> = self.page_of(first, cursor).await?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .filter_map(|e| e.track.and_then(|t| t.id))
                .collect(),
            next: page.next,
        })
    }

    async fn artist_tracks(&self, artist_id: &str, cursor: Option<&str>) -> Result<Page<String>> {
        // One page of albums per call; every album's tracks are expanded in
        // full before the next album cursor is handed back.
        let first = format!(
            "{}/artists/{}/albums?include_groups=album,single&limit=20",
            self.base_url, artist_id
        );
        let albums: Paging<IdOnly> = self.page_of(first, cursor).await?;

        let mut track_ids = Vec::new();
        for album in albums.items.into_iter().filter_map(|a| a.id) {
            let mut cursor: Option<String> = None;
            loop {
                let page = self.album_tracks(&album, cursor.as_deref()).await?;
                track_ids.extend(page.items);
                match page.next {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        Ok(Page {
            items: track_ids,
            next: albums.next,
        })
    }

    async fn saved_tracks(&self, cursor: Option<&str>) -> Result<Page<String>> {
        let first = format!("{}/me/tracks?limit=50", self.base_url);
        let page: Paging<SavedEntry> = self.page_of(first, cursor).await?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .filter_map(|e| e.track.and_then(|t| t.id))
                .collect(),
            next: page.next,
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/search?type=track&limit=20&q={}",
            self.base_url,
            urlencoding::encode(query)
        );
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response
            .tracks
            .items
            .into_iter()
            .filter_map(|t| t.id)
            .collect())
    }
}
