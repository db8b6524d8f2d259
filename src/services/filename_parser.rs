//! Filename parser for episode identity
//!
//! Extracts (show title, season, episode) from names like:
//! - "Chicago Fire S14E08 1080p WEB h264-ETHEL"
//! - "The.Expanse.2x05.Home.720p.mkv"
//! - "Corner Gas Season 6 Episode 12"
//!
//! Quality details are read from the file itself, not the name, so the
//! parser only cares about identity. Names that match no pattern simply
//! yield no identity; the file is still cataloged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static SXXEXX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.+?)\s*[Ss](\d{1,2})[Ee](\d{1,3})").unwrap());
static NXNN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.+?)\s*\b(\d{1,2})x(\d{2,3})\b").unwrap());
static VERBOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(.+?)\s*Season\s*(\d+).*?Episode\s*(\d+)").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static TRAILING_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(?(19\d{2}|20\d{2})\)?\s*$").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Identity parsed from a filename
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedName {
    pub title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u32>,
}

impl ParsedName {
    /// True when the name yielded a full (title, season, episode) identity
    pub fn is_episode(&self) -> bool {
        self.title.is_some() && self.season.is_some() && self.episode.is_some()
    }
}

/// Parse a file stem (no extension) into an episode identity
pub fn parse_name(stem: &str) -> ParsedName {
    let mut result = ParsedName::default();

    // Scene names separate words with dots, underscores, or dashes
    let cleaned = stem.replace(['.', '_', '-'], " ");

    // Patterns in order of specificity
    if let Some(caps) = SXXEXX_RE.captures(&cleaned) {
        result.title = Some(clean_title(caps.get(1).unwrap().as_str()));
        result.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(3).and_then(|m| m.as_str().parse().ok());
    } else if let Some(caps) = NXNN_RE.captures(&cleaned) {
        result.title = Some(clean_title(caps.get(1).unwrap().as_str()));
        result.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(3).and_then(|m| m.as_str().parse().ok());
    } else if let Some(caps) = VERBOSE_RE.captures(&cleaned) {
        result.title = Some(clean_title(caps.get(1).unwrap().as_str()));
        result.season = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(3).and_then(|m| m.as_str().parse().ok());
    }

    if let Some(caps) = YEAR_RE.captures(&cleaned) {
        result.year = caps.get(1).and_then(|m| m.as_str().parse().ok());
    }

    debug!(
        stem = stem,
        title = ?result.title,
        season = ?result.season,
        episode = ?result.episode,
        "Parsed filename"
    );

    result
}

/// Clean up a captured show title
fn clean_title(raw: &str) -> String {
    // Year is captured separately; a trailing one is disambiguation noise
    let cleaned = TRAILING_YEAR_RE.replace(raw.trim(), "");
    SPACE_RE.replace_all(&cleaned, " ").trim().to_string()
}
