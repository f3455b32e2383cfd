//! Typed song metadata and the unit of download work.
//!
//! A [`Song`] carries the full catalog metadata block plus the mutable
//! download fields (resolved source link, lyrics). Two songs are considered
//! the same iff their entire serialized form is equal; there is no surrogate
//! key.

use serde::{Deserialize, Serialize};

/// Characters that are not allowed in file names on any supported platform.
const DISALLOWED_NAME_CHARS: &str = "/?\\*|<>";

/// A reference to an artist as it appears in catalog responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

/// Album metadata attached to a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumMetadata {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// Release date or bare year, whatever the catalog provides.
    #[serde(default)]
    pub release_date: String,
    /// URL of the largest available cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

/// Track-level catalog metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// External catalog id of the track.
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub album: AlbumMetadata,
    pub duration_ms: u64,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub disc_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
}

/// Artist-level catalog metadata that may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistMetadata {
    #[serde(default)]
    pub genres: Vec<String>,
}

/// One unit of download work.
///
/// The serde representation of this struct is exactly the "dump" persisted by
/// the tracking store, so derived `PartialEq` gives the structural equality
/// the queue relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub track: TrackMetadata,
    #[serde(default)]
    pub artist: ArtistMetadata,
    /// Resolved playable source, `None` until a search match is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
}

impl Song {
    pub fn new(track: TrackMetadata, artist: ArtistMetadata) -> Self {
        Self {
            track,
            artist,
            source_link: None,
            lyrics: None,
        }
    }

    /// Duration in seconds, rounded to millisecond precision.
    pub fn duration_secs(&self) -> f64 {
        (self.track.duration_ms as f64 / 1000.0 * 1000.0).round() / 1000.0
    }

    /// Names of all contributing artists, main artist first.
    pub fn contributing_artists(&self) -> Vec<String> {
        self.track.artists.iter().map(|a| a.name.clone()).collect()
    }

    /// "artist, artist - title", used for progress display and reporting.
    pub fn display_name(&self) -> String {
        format!(
            "{} - {}",
            self.contributing_artists().join(", "),
            self.track.name
        )
    }

    /// Genres, most likely first. Empty when the catalog had none.
    pub fn genres(&self) -> &[String] {
        &self.artist.genres
    }

    /// Base name (no extension) of the final artifact for this song.
    ///
    /// Very long names fall back to the primary artist only so the result
    /// stays within common filesystem limits.
    pub fn file_name(&self) -> String {
        let artists = self.contributing_artists();
        let name = create_file_name(&self.track.name, &artists);
        if name.len() > 250 {
            create_file_name(&self.track.name, &artists[..1])
        } else {
            name
        }
    }
}

/// Build the artifact base name for a track.
///
/// Contributing artists whose name already occurs in the track title are left
/// out, so remix credits do not show up twice. Path-hostile characters are
/// stripped; quotes and colons are substituted instead since they carry
/// meaning in titles.
pub fn create_file_name(song_name: &str, song_artists: &[String]) -> String {
    let mut artist_str = song_artists
        .first()
        .cloned()
        .unwrap_or_default();

    let lower_name = song_name.to_lowercase();
    for artist in song_artists.iter().skip(1) {
        if !lower_name.contains(&artist.to_lowercase()) {
            artist_str.push_str(", ");
            artist_str.push_str(artist);
        }
    }

    let raw = format!("{} - {}", artist_str, song_name);
    let stripped: String = raw
        .chars()
        .filter(|c| !DISALLOWED_NAME_CHARS.contains(*c))
        .collect();

    stripped.replace('"', "'").replace(':', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(name: &str, artists: &[&str]) -> Song {
        Song::new(
            TrackMetadata {
                id: "t1".to_string(),
                name: name.to_string(),
                artists: artists
                    .iter()
                    .enumerate()
                    .map(|(i, a)| ArtistRef {
                        id: format!("a{}", i),
                        name: a.to_string(),
                    })
                    .collect(),
                album: AlbumMetadata {
                    name: "Album".to_string(),
                    artists: vec![],
                    release_date: "2021-01-01".to_string(),
                    cover_url: None,
                },
                duration_ms: 215_000,
                track_number: 1,
                disc_number: 1,
                isrc: None,
            },
            ArtistMetadata::default(),
        )
    }

    #[test]
    fn display_name_joins_artists() {
        let s = song("Madness", &["Ruelle", "Other"]);
        assert_eq!(s.display_name(), "Ruelle, Other - Madness");
    }

    #[test]
    fn file_name_strips_disallowed_chars() {
        let s = song("What|Is<This>?", &["A/B"]);
        assert_eq!(s.file_name(), "AB - WhatIsThis");
    }

    #[test]
    fn file_name_substitutes_quotes_and_colons() {
        let s = song("Part 2: \"Reprise\"", &["Band"]);
        assert_eq!(s.file_name(), "Band - Part 2- 'Reprise'");
    }

    #[test]
    fn file_name_drops_artists_already_in_title() {
        let s = song("Change the World (Mastubs remix)", &["Jetta", "Mastubs"]);
        assert_eq!(s.file_name(), "Jetta - Change the World (Mastubs remix)");
    }

    #[test]
    fn duration_is_rounded_seconds() {
        let s = song("x", &["y"]);
        assert!((s.duration_secs() - 215.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equality_is_structural_over_the_full_dump() {
        let a = song("x", &["y"]);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.source_link = Some("https://example.com/watch?v=1".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn dump_round_trips_through_serde() {
        let mut s = song("x", &["y"]);
        s.lyrics = Some("la la".to_string());
        let json = serde_json::to_string(&s).unwrap();
        let back: Song = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
