//! Edition deduplication for artist and label discographies.
//!
//! Editions of one logical release (standard, deluxe, remaster) are clustered
//! by normalized title and near-equal track count, then a single edition per
//! cluster is kept according to [`prefer_edition`]. Live recordings never
//! share a cluster with studio releases.

use crate::types::{AlbumGroup, Quality};
use std::cmp::Ordering;

/// Minimum normalized Levenshtein similarity for two titles to match
pub const TITLE_SIMILARITY: f64 = 0.90;

/// Words marking a non-original edition
const EXTRA_MARKERS: &[&str] = &[
    "deluxe",
    "remaster",
    "remastered",
    "expanded",
    "anniversary",
    "edition",
    "bonus",
    "reissue",
    "collector",
    "special",
    "version",
];

/// Normalize an album title for logical-release comparison
///
/// Lowercases, drops bracketed and parenthesised segments, cuts a trailing
/// ` - <qualifier>` when the qualifier names an edition, and collapses
/// punctuation into single spaces.
///
/// ```
/// use qobuz_dl::filter::smart::normalize_title;
///
/// assert_eq!(normalize_title("Abbey Road (Remastered 2019)"), "abbey road");
/// assert_eq!(normalize_title("OK Computer - Collector's Edition"), "ok computer");
/// assert_eq!(normalize_title("Rock 'n' Roll [Deluxe]"), "rock n roll");
/// ```
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();

    let mut stripped = String::with_capacity(lower.len());
    let mut depth = 0usize;
    for c in lower.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }

    if let Some(pos) = stripped.rfind(" - ") {
        if has_marker(&stripped[pos + 3..]) {
            stripped.truncate(pos);
        }
    }

    stripped
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn has_marker(text: &str) -> bool {
    words(text).any(|w| EXTRA_MARKERS.contains(&w.as_str()))
}

fn full_title(group: &AlbumGroup) -> String {
    match &group.version {
        Some(v) => format!("{} {}", group.title, v),
        None => group.title.clone(),
    }
}

/// Whether the edition is a live recording
///
/// Looks for the word `live` in the un-normalized title and version, so
/// "Live at Leeds" and "Abbey Road (Live)" are live but "Alive" is not.
pub fn is_live(group: &AlbumGroup) -> bool {
    words(&full_title(group)).any(|w| w == "live")
}

/// Whether the edition is a remaster, deluxe or other extra edition
pub fn is_extra(group: &AlbumGroup) -> bool {
    has_marker(&full_title(group))
}

/// Whether two titles name the same logical release
pub fn titles_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_title(a), normalize_title(b));
    a == b || strsim::normalized_levenshtein(&a, &b) >= TITLE_SIMILARITY
}

/// Track counts differing by at most 3 or 25% of the larger, whichever is greater
pub fn near_equal_counts(a: u32, b: u32) -> bool {
    let larger = a.max(b);
    let tolerance = 3.max(larger / 4);
    a.abs_diff(b) <= tolerance
}

/// Whether two editions belong to the same cluster
pub fn same_release(a: &AlbumGroup, b: &AlbumGroup) -> bool {
    is_live(a) == is_live(b)
        && near_equal_counts(a.track_count(), b.track_count())
        && titles_match(&a.title, &b.title)
}

/// Rank two editions of one logical release
///
/// `Greater` means `a` is preferred. Precedence:
/// 1. the requested quality tier is available
/// 2. more tracks
/// 3. with `skip_extras`, not a remaster or extra edition
/// 4. earlier release year (unknown years last)
///
/// `Equal` means neither wins; callers keep the first seen.
pub fn prefer_edition(a: &AlbumGroup, b: &AlbumGroup, requested: Quality, skip_extras: bool) -> Ordering {
    let has_quality = |g: &AlbumGroup| g.max_quality >= requested;

    has_quality(a)
        .cmp(&has_quality(b))
        .then_with(|| a.track_count().cmp(&b.track_count()))
        .then_with(|| {
            if skip_extras {
                is_extra(b).cmp(&is_extra(a))
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| match (a.year, b.year) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        })
}

/// Keep one edition per logical release
///
/// Each group is compared against the first member of every existing cluster;
/// clusters are returned in first-seen order.
pub fn smart_filter(groups: Vec<AlbumGroup>, requested: Quality, skip_extras: bool) -> Vec<AlbumGroup> {
    struct Cluster {
        anchor: AlbumGroup,
        best: AlbumGroup,
    }

    let mut clusters: Vec<Cluster> = Vec::new();
    for group in groups {
        match clusters.iter_mut().find(|c| same_release(&c.anchor, &group)) {
            Some(cluster) => {
                if prefer_edition(&group, &cluster.best, requested, skip_extras) == Ordering::Greater {
                    tracing::debug!(
                        kept = %full_title(&group),
                        dropped = %full_title(&cluster.best),
                        "Replacing edition"
                    );
                    cluster.best = group;
                } else {
                    tracing::debug!(
                        kept = %full_title(&cluster.best),
                        dropped = %full_title(&group),
                        "Dropping edition"
                    );
                }
            }
            None => clusters.push(Cluster {
                anchor: group.clone(),
                best: group,
            }),
        }
    }
    clusters.into_iter().map(|c| c.best).collect()
}
