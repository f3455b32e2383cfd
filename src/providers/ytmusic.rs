//! YouTube Music search provider.
//!
//! Talks to the internal `youtubei` search endpoint the web client uses and
//! picks candidates out of its deeply nested renderer JSON. The response
//! shape is not a stable API, so extraction is defensive: anything that does
//! not yield a video id is dropped.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::matching::{parse_duration, Candidate};

use super::SearchProvider;

const API_BASE: &str = "https://music.youtube.com/youtubei/v1";
const CLIENT_NAME: &str = "WEB_REMIX";
const CLIENT_VERSION: &str = "1.20240101.00.00";

/// Search filter params, as sent by the YTM web client.
const SONGS_FILTER: &str = "EgWKAQIIAWoKEAkQBRAKEAMQBA%3D%3D";
const VIDEOS_FILTER: &str = "EgWKAQIQAWoKEAkQBRAKEAMQBA%3D%3D";

/// Search provider backed by YouTube Music.
pub struct YtMusicSearchProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YtMusicSearchProvider {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn search(&self, query: &str, filter_params: &str) -> Result<Vec<Candidate>> {
        let body = json!({
            "context": {
                "client": {
                    "clientName": CLIENT_NAME,
                    "clientVersion": CLIENT_VERSION,
                }
            },
            "query": query,
            "params": filter_params,
        });

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Failed to reach YouTube Music search")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "YouTube Music search failed with status: {}",
                response.status()
            );
        }

        let payload: Value = response
            .json()
            .await
            .context("Failed to parse YouTube Music search response")?;

        Ok(candidates_from_response(&payload))
    }
}

impl Default for YtMusicSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for YtMusicSearchProvider {
    async fn find_candidates(
        &self,
        title: &str,
        artists: &[String],
        _album: Option<&str>,
        _duration_secs: f64,
        isrc: Option<&str>,
    ) -> Result<Vec<Candidate>> {
        // An ISRC uniquely identifies a recording; when a lookup by it
        // returns exactly one result, that result is authoritative.
        if let Some(isrc) = isrc {
            let by_isrc = self.search(isrc, SONGS_FILTER).await.unwrap_or_default();
            if by_isrc.len() == 1 {
                return Ok(by_isrc);
            }
        }

        let query = format!("{} - {}", artists.join(", "), title);

        // Song-type results first: they carry album hints and are more
        // accurate. Video results follow as lower-priority fallbacks.
        let mut candidates = self.search(&query, SONGS_FILTER).await?;
        match self.search(&query, VIDEOS_FILTER).await {
            Ok(videos) => candidates.extend(videos),
            Err(e) => debug!("video search failed, continuing with songs only: {}", e),
        }

        Ok(candidates)
    }
}

/// Collect candidates from every list-item renderer in the response, in
/// response order.
fn candidates_from_response(payload: &Value) -> Vec<Candidate> {
    let mut renderers = Vec::new();
    collect_renderers(payload, &mut renderers);
    renderers
        .into_iter()
        .filter_map(candidate_from_renderer)
        .collect()
}

/// Depth-first collection of `musicResponsiveListItemRenderer` objects,
/// preserving document order.
fn collect_renderers<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "musicResponsiveListItemRenderer" {
                    out.push(child);
                } else {
                    collect_renderers(child, out);
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_renderers(child, out);
            }
        }
        _ => {}
    }
}

fn candidate_from_renderer(renderer: &Value) -> Option<Candidate> {
    // Results without a video id show up for region-locked or removed
    // content; they are not playable and are ignored.
    let video_id = find_string(renderer, "videoId")?;

    let columns = renderer.get("flexColumns")?.as_array()?;
    let title = column_runs(columns.first()?).into_iter().next()?;

    let byline = column_runs(columns.get(1)?);
    // The byline mixes artist names, album, duration and separators; runs
    // that look like durations or separators are filtered out of the artist
    // string.
    let artist = byline
        .iter()
        .filter(|run| !is_duration_run(run) && !is_separator_run(run))
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let duration_secs = byline
        .iter()
        .rev()
        .find(|run| is_duration_run(run))
        .map(|run| parse_duration(run))
        .unwrap_or(0.0);

    let album = columns
        .get(2)
        .map(column_runs)
        .and_then(|runs| runs.into_iter().find(|run| !is_separator_run(run)));

    Some(Candidate {
        name: title,
        artist,
        album,
        duration_secs,
        link: format!("https://music.youtube.com/watch?v={}", video_id),
    })
}

/// Text runs of one flex column.
fn column_runs(column: &Value) -> Vec<String> {
    column
        .pointer("/musicResponsiveListItemFlexColumnRenderer/text/runs")
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|run| run.get("text").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn is_duration_run(run: &str) -> bool {
    !run.is_empty() && run.chars().all(|c| c.is_ascii_digit() || c == ':') && run.contains(':')
}

fn is_separator_run(run: &str) -> bool {
    run.trim() == "•" || run.trim() == "," || run.trim().is_empty()
}

/// First string value for `key` anywhere under `value`.
fn find_string<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(Value::as_str) {
                return Some(found);
            }
            map.values().find_map(|child| find_string(child, key))
        }
        Value::Array(items) => items.iter().find_map(|child| find_string(child, key)),
        _ => None,
    }
}
