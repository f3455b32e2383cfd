//! Best-match selection of an audio source from noisy search results.

mod similarity;

pub use similarity::{levenshtein_distance, match_percentage, parse_duration};

use tracing::debug;

use crate::song::Song;

/// Minimum composite score a candidate must reach to be accepted.
pub const MIN_ACCEPT_SCORE: f64 = 55.0;

/// Cutoff under which an artist name is not considered present in a
/// candidate string.
const ARTIST_MATCH_CUTOFF: f64 = 85.0;

/// Cutoff under which a name similarity collapses to 0 and disqualifies the
/// candidate.
const NAME_MATCH_CUTOFF: f64 = 60.0;

/// A search result considered as a possible audio source for a song.
///
/// Ephemeral: candidates exist only while the selector evaluates them and
/// are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Display title of the result.
    pub name: String,
    /// Display artist string, usually a comma-joined list.
    pub artist: String,
    /// Album hint, present on track-type results only.
    pub album: Option<String>,
    pub duration_secs: f64,
    /// Playable source link.
    pub link: String,
}

/// Scores candidates against a song's metadata and picks the best one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchSelector;

impl MatchSelector {
    /// Pick the best candidate for `song`, or `None` when nothing clears
    /// [`MIN_ACCEPT_SCORE`]. A `None` is a definite "could not resolve",
    /// not a transient error.
    ///
    /// Ties break toward the earliest candidate in provider order, so
    /// repeated calls with the same inputs return the same result.
    pub fn select(&self, song: &Song, candidates: &[Candidate]) -> Option<Candidate> {
        let mut best: Option<(&Candidate, f64)> = None;

        for candidate in candidates {
            let Some(score) = self.score(song, candidate) else {
                continue;
            };

            debug!(
                candidate = %candidate.link,
                score,
                "scored candidate for {}",
                song.display_name()
            );

            if score >= MIN_ACCEPT_SCORE {
                match best {
                    // strictly greater keeps the first of equals
                    Some((_, best_score)) if score <= best_score => {}
                    _ => best = Some((candidate, score)),
                }
            }
        }

        best.map(|(c, _)| c.clone())
    }

    /// Composite score of one candidate, or `None` when the candidate is
    /// disqualified outright (no common word, no artist overlap, zero name
    /// similarity).
    fn score(&self, song: &Song, candidate: &Candidate) -> Option<f64> {
        let song_name = song.track.name.to_lowercase();
        let result_name = candidate.name.to_lowercase();

        // A result sharing no word at all with the track title is a wrong
        // match even when artist and duration line up.
        let has_common_word = song_name
            .replace('-', " ")
            .split_whitespace()
            .any(|word| result_name.contains(word));
        if !has_common_word {
            return None;
        }

        // Artist term: fraction of the song's artists that show up in the
        // candidate's artist string, falling back to its title for results
        // that fold the artist into the name.
        let artists = song.contributing_artists();
        let matched_artists = artists
            .iter()
            .filter(|artist| {
                let artist = artist.to_lowercase();
                match_percentage(&artist, &candidate.artist.to_lowercase(), ARTIST_MATCH_CUTOFF)
                    > 0.0
                    || match_percentage(&artist, &result_name, ARTIST_MATCH_CUTOFF) > 0.0
            })
            .count();
        if matched_artists == 0 {
            return None;
        }
        let artist_match = matched_artists as f64 / artists.len() as f64 * 100.0;

        // Name term: track-type results are compared against the bare title,
        // video-type ones against "artists - title" since that is how they
        // are usually named.
        let target_name = if candidate.album.is_some() {
            song.track.name.clone()
        } else {
            song.display_name()
        };
        let name_match = match_percentage(
            &result_name,
            &target_name.to_lowercase(),
            NAME_MATCH_CUTOFF,
        );
        if name_match == 0.0 {
            return None;
        }

        // Duration term: the quadratic delta punishes remixes and extended
        // cuts that text similarity alone cannot tell apart.
        let duration = song.duration_secs().max(1.0);
        let delta = candidate.duration_secs - duration;
        let time_match = 100.0 - (delta * delta) / duration * 100.0;

        let mut total = artist_match + name_match + time_match;
        let mut terms = 3.0;

        if let Some(album) = &candidate.album {
            total += match_percentage(
                &album.to_lowercase(),
                &song.track.album.name.to_lowercase(),
                0.0,
            );
            terms += 1.0;
        }

        Some(total / terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{AlbumMetadata, ArtistMetadata, ArtistRef, Song, TrackMetadata};

    fn song(name: &str, artists: &[&str], duration_ms: u64) -> Song {
        Song::new(
            TrackMetadata {
                id: "t".to_string(),
                name: name.to_string(),
                artists: artists
                    .iter()
                    .map(|a| ArtistRef {
                        id: a.to_string(),
                        name: a.to_string(),
                    })
                    .collect(),
                album: AlbumMetadata {
                    name: "Up In Flames".to_string(),
                    artists: vec![],
                    release_date: String::new(),
                    cover_url: None,
                },
                duration_ms,
                track_number: 1,
                disc_number: 1,
                isrc: None,
            },
            ArtistMetadata::default(),
        )
    }

    fn candidate(name: &str, artist: &str, album: Option<&str>, secs: f64, link: &str) -> Candidate {
        Candidate {
            name: name.to_string(),
            artist: artist.to_string(),
            album: album.map(str::to_string),
            duration_secs: secs,
            link: link.to_string(),
        }
    }

    #[test]
    fn picks_the_right_song_over_lookalikes() {
        let target = song("Madness", &["Ruelle"], 215_000);
        let candidates = vec![
            candidate("Monster", "Ruelle", Some("Monster"), 201.0, "v=wrong-title"),
            candidate("Madness", "Griffith Swank", None, 215.0, "v=wrong-artist"),
            candidate("Madness", "Ruelle", Some("Up In Flames"), 216.0, "v=right"),
        ];

        let best = MatchSelector.select(&target, &candidates).unwrap();
        assert_eq!(best.link, "v=right");
    }

    #[test]
    fn rejects_everything_below_threshold() {
        let target = song("Madness", &["Ruelle"], 215_000);
        let candidates = vec![
            // Shares a word and the artist but is two minutes too long.
            candidate("Madness (Extended Mix)", "Ruelle", None, 345.0, "v=long"),
        ];
        assert!(MatchSelector.select(&target, &candidates).is_none());
    }

    #[test]
    fn no_candidates_is_no_match() {
        let target = song("Madness", &["Ruelle"], 215_000);
        assert!(MatchSelector.select(&target, &[]).is_none());
    }

    #[test]
    fn first_of_equal_scores_wins() {
        let target = song("Madness", &["Ruelle"], 215_000);
        let twin_a = candidate("Madness", "Ruelle", Some("Up In Flames"), 215.0, "v=a");
        let twin_b = candidate("Madness", "Ruelle", Some("Up In Flames"), 215.0, "v=b");

        let best = MatchSelector
            .select(&target, &[twin_a, twin_b])
            .unwrap();
        assert_eq!(best.link, "v=a");
    }

    #[test]
    fn selection_is_deterministic() {
        let target = song("Madness", &["Ruelle"], 215_000);
        let candidates = vec![
            candidate("Madness (Lyric Video)", "Ruelle", None, 217.0, "v=1"),
            candidate("Madness", "Ruelle", Some("Up In Flames"), 215.0, "v=2"),
            candidate("Madness Cover", "Somebody", None, 214.0, "v=3"),
        ];

        let first = MatchSelector.select(&target, &candidates);
        for _ in 0..10 {
            assert_eq!(first, MatchSelector.select(&target, &candidates));
        }
    }

    #[test]
    fn emoji_candidates_do_not_break_scoring() {
        let target = song("Madness", &["Ruelle"], 215_000);
        let candidates = vec![candidate(
            "Madness \u{1F525}",
            "Ruelle \u{2728}",
            None,
            215.0,
            "v=emoji",
        )];

        let best = MatchSelector.select(&target, &candidates).unwrap();
        assert_eq!(best.link, "v=emoji");
    }
}
