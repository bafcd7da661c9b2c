//! Picks the best search hit for a song/artist pair.
//!
//! Scores are additive: title match, artist match, a bonus when the artist
//! only appears as a featured credit in the title, and a small popularity
//! bonus. Exact matches always outrank substring matches.

use crate::lyrics::models::Candidate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PUNCTUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex is valid"));
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

// Each clause runs up to a closing paren/bracket or the end of the title.
static FEATURING_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bfeat\.?\s+([^)\]]+)",
        r"(?i)\bft\.?\s+([^)\]]+)",
        r"(?i)\bfeaturing\s+([^)\]]+)",
        r"(?i)\bwith\s+([^)\]]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("featuring regex is valid"))
    .collect()
});

/// Score weights. Only their relative order matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub title_exact: f64,
    pub title_partial: f64,
    pub artist_exact: f64,
    pub artist_partial: f64,
    pub featured_artist: f64,
    pub popularity_cap: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            title_exact: 100.0,
            title_partial: 50.0,
            artist_exact: 100.0,
            artist_partial: 40.0,
            featured_artist: 30.0,
            popularity_cap: 20.0,
        }
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let stripped = PUNCTUATION_RE.replace_all(&lower, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Artist credits found in "feat."/"ft."/"featuring"/"with" clauses of a title.
pub fn featured_artists(title: &str) -> Vec<String> {
    FEATURING_RES
        .iter()
        .filter_map(|re| re.captures(title))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn partial_match(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

pub struct Target {
    title: String,
    artist: String,
}

impl Target {
    pub fn new(song_name: &str, artist_name: &str) -> Self {
        Self {
            title: normalize(song_name),
            artist: normalize(artist_name),
        }
    }
}

pub fn score(candidate: &Candidate, target: &Target, weights: &MatchWeights) -> f64 {
    let title = normalize(&candidate.title);
    let artist = normalize(&candidate.primary_artist_name);
    let mut total = 0.0;

    if !title.is_empty() && title == target.title {
        total += weights.title_exact;
    } else if partial_match(&title, &target.title) {
        total += weights.title_partial;
    }

    if !artist.is_empty() && artist == target.artist {
        total += weights.artist_exact;
    } else if partial_match(&artist, &target.artist) {
        total += weights.artist_partial;
    }

    if !target.artist.is_empty()
        && featured_artists(&candidate.title)
            .iter()
            .any(|credit| normalize(credit).contains(&target.artist))
    {
        total += weights.featured_artist;
    }

    if let Some(views) = candidate.view_count.filter(|v| *v >= 1) {
        total += (views as f64).log10().min(weights.popularity_cap);
    }

    total
}

/// Highest score wins; on a tie the earlier candidate is kept.
pub fn best_match<'a>(
    candidates: &'a [Candidate],
    song_name: &str,
    artist_name: &str,
    weights: &MatchWeights,
) -> Option<(&'a Candidate, f64)> {
    let target = Target::new(song_name, artist_name);
    let mut best: Option<(&Candidate, f64)> = None;

    for candidate in candidates {
        let s = score(candidate, &target, weights);
        tracing::trace!(title = %candidate.title, artist = %candidate.primary_artist_name, score = s, "scored candidate");
        match best {
            Some((_, best_score)) if s <= best_score => {}
            _ => best = Some((candidate, s)),
        }
    }

    best
}
