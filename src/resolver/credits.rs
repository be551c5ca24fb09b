//! Featured-artist credits.

use crate::catalog::TrackInfo;
use regex::Regex;
use std::sync::OnceLock;

/// "(feat. X)", "(ft X & Y)", "(with X and Y)" inside a title
const FEATURING_PATTERN: &str = r"(?i)\((?:feat|ft|with)\.?\s+(.*?)\)";

/// Separators between names in a featuring list
const NAME_SEPARATOR_PATTERN: &str = r"\s*[,&]\s*|\s+and\s+";

static FEATURING_RE: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();

/// Featured artists credited by the catalog, then those named in the title
///
/// Duplicates are dropped and the first spelling wins.
pub(crate) fn featured_artists(track: &TrackInfo) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for name in &track.featured_artists {
        push(name);
    }

    let patterns = FEATURING_RE.get_or_init(|| {
        Some((
            Regex::new(FEATURING_PATTERN).ok()?,
            Regex::new(NAME_SEPARATOR_PATTERN).ok()?,
        ))
    });
    if let Some((featuring, separator)) = patterns {
        if let Some(list) = featuring.captures(&track.title).and_then(|c| c.get(1)) {
            for name in separator.split(list.as_str()) {
                push(name);
            }
        }
    }
    names
}
