//! Best-effort lyrics lookup.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::LyricsProvider;

const API_BASE: &str = "https://api.lyrics.ovh/v1";

/// Lyrics provider over a public lyrics API. Every failure path collapses
/// to `None` with a debug log; missing lyrics never fail a song.
pub struct HttpLyricsProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    lyrics: Option<String>,
}

impl HttpLyricsProvider {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for HttpLyricsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LyricsProvider for HttpLyricsProvider {
    async fn fetch(&self, title: &str, artists: &[String]) -> Option<String> {
        let artist = artists.first().map(String::as_str).unwrap_or_default();
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(artist),
            urlencoding::encode(title)
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("lyrics lookup failed for '{}': {}", title, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(
                "lyrics lookup for '{}' returned {}",
                title,
                response.status()
            );
            return None;
        }

        match response.json::<LyricsResponse>().await {
            Ok(body) => body.lyrics.filter(|l| !l.trim().is_empty()),
            Err(e) => {
                debug!("lyrics response for '{}' unparseable: {}", title, e);
                None
            }
        }
    }
}
