//! Fuzzy string similarity used by the match selector.
//!
//! Edit distance with a two-row table, a partial-ratio on top of it, and a
//! fallback path for strings carrying characters (emoji, symbols) that make
//! the primary comparison meaningless.

/// Calculate the Levenshtein (edit) distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    // Two rows instead of the full matrix for space efficiency
    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };

            curr_row[j + 1] = (prev_row[j + 1] + 1) // deletion
                .min(curr_row[j] + 1) // insertion
                .min(prev_row[j] + cost); // substitution
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// Plain similarity ratio in 0..=100.
fn ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100.0;
    }
    let distance = levenshtein_distance(a, b);
    (1.0 - distance as f64 / longest as f64) * 100.0
}

/// Best similarity of the shorter string against any equally long window of
/// the longer one, in 0..=100. This is what makes "rionos" score 100 against
/// "aiobahn, rionos - motivation".
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    let short_chars: Vec<char> = short.chars().collect();
    let long_chars: Vec<char> = long.chars().collect();

    if short_chars.is_empty() {
        return if long_chars.is_empty() { 100.0 } else { 0.0 };
    }

    let window = short_chars.len();
    let mut best = 0.0f64;

    for start in 0..=(long_chars.len() - window) {
        let slice: String = long_chars[start..start + window].iter().collect();
        let score = ratio(short, &slice);
        if score > best {
            best = score;
        }
        if best >= 100.0 {
            break;
        }
    }

    best
}

/// True when the string only holds characters the primary comparison copes
/// with: alphanumerics, whitespace and plain ASCII punctuation.
fn is_plain(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation())
}

fn alnum_filter(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Fuzzy match percentage of two strings in 0..=100.
///
/// Strings containing characters outside the plain set (UTF-8 emoji being
/// the usual case) are compared through alphanumeric-and-space-filtered
/// copies instead, so the result is always defined and deterministic.
/// Scores below `score_cutoff` collapse to 0.
pub fn match_percentage(str1: &str, str2: &str, score_cutoff: f64) -> f64 {
    let score = if is_plain(str1) && is_plain(str2) {
        partial_ratio(str1, str2)
    } else {
        partial_ratio(&alnum_filter(str1), &alnum_filter(str2))
    };

    if score < score_cutoff {
        0.0
    } else {
        score
    }
}

/// Convert a provider duration string to seconds.
///
/// Accepts `HH:MM:SS`, `MM:SS` and bare seconds. Malformed provider data is
/// expected occasionally, so anything unparseable yields 0.0 instead of an
/// error.
pub fn parse_duration(duration: &str) -> f64 {
    let mut seconds: u64 = 0;

    for (multiplier, part) in [1u64, 60, 3600].iter().zip(duration.split(':').rev()) {
        match part.trim().parse::<u64>() {
            Ok(value) => seconds += multiplier * value,
            Err(_) => return 0.0,
        }
    }

    seconds as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein_distance("hello", "hello"), 0);
        assert_eq!(levenshtein_distance("hello", "hallo"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "hello"), 5);
        assert_eq!(levenshtein_distance("", ""), 0);
    }

    #[test]
    fn partial_ratio_finds_substrings() {
        assert_eq!(partial_ratio("rionos", "aiobahn, rionos motivation"), 100.0);
        assert!(partial_ratio("ruelle", "griffith swank") < 50.0);
    }

    #[test]
    fn match_percentage_applies_cutoff() {
        assert_eq!(match_percentage("abc", "xyz", 60.0), 0.0);
        assert_eq!(match_percentage("madness", "madness", 60.0), 100.0);
    }

    #[test]
    fn match_percentage_emoji_fallback_is_deterministic() {
        let a = "Madness \u{1F525}\u{1F525}";
        let b = "Madness";
        let first = match_percentage(a, b, 0.0);
        let second = match_percentage(a, b, 0.0);
        assert_eq!(first, second);
        assert!(first > 90.0);
    }

    #[test]
    fn parse_duration_forms() {
        assert_eq!(parse_duration("1:02:03"), 3723.0);
        assert_eq!(parse_duration("02:03"), 123.0);
        assert_eq!(parse_duration("59"), 59.0);
        assert_eq!(parse_duration("abc"), 0.0);
        assert_eq!(parse_duration(""), 0.0);
        assert_eq!(parse_duration("25:36:59"), 92219.0);
    }
}
