//! Extended M3U output for playlist downloads.

use crate::error::{Error, Result};
use crate::types::{Collection, ItemDescriptor, RunSummary, SkipReason, TaskOutcome, UrlKind};
use crate::utils::sanitize_component;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One playable line of an M3U file
#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistEntry {
    /// Absolute or output-rooted path of the audio file
    pub path: PathBuf,
    /// Track length
    pub duration_secs: u32,
    /// Performer
    pub artist: String,
    /// Track title
    pub title: String,
}

/// Deepest directory containing every path
pub fn common_parent<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut paths = paths.into_iter();
    let mut common = paths.next()?.parent()?.to_path_buf();
    for path in paths {
        while !path.starts_with(&common) {
            if !common.pop() {
                return None;
            }
        }
    }
    Some(common)
}

/// Render an extended M3U with paths relative to `dir`
pub fn render_m3u(dir: &Path, entries: &[PlaylistEntry]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for entry in entries {
        let relative = entry.path.strip_prefix(dir).unwrap_or(&entry.path);
        // writing into a String cannot fail
        let _ = writeln!(out, "#EXTINF:{},{} - {}", entry.duration_secs, entry.artist, entry.title);
        let _ = writeln!(out, "{}", relative.display());
    }
    out
}

/// Write one M3U per playlist input that produced downloaded or archived items
///
/// Items keep playlist order. Returns the files written.
pub async fn write_playlists(items: &[ItemDescriptor], summary: &RunSummary) -> Result<Vec<PathBuf>> {
    let reports: HashMap<usize, _> = summary.outcomes.iter().map(|r| (r.index, r)).collect();

    let mut playlists: Vec<(&Collection, Vec<PlaylistEntry>)> = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let Some(collection) = item.collection.as_ref().filter(|c| c.kind == UrlKind::Playlist) else {
            continue;
        };
        let Some(report) = reports.get(&index) else {
            continue;
        };
        let listed = matches!(
            report.outcome,
            TaskOutcome::Succeeded { simulated: false, .. }
                | TaskOutcome::Skipped {
                    reason: SkipReason::Archived
                }
        );
        if !listed {
            continue;
        }

        let entry = PlaylistEntry {
            path: report.path.clone(),
            duration_secs: item.duration_secs,
            artist: item.artist.clone(),
            title: item.display_title(),
        };
        match playlists.iter_mut().find(|(c, _)| c.id == collection.id) {
            Some((_, entries)) => entries.push(entry),
            None => playlists.push((collection, vec![entry])),
        }
    }

    let mut written = Vec::new();
    for (collection, entries) in playlists {
        let Some(dir) = common_parent(entries.iter().map(|e| e.path.as_path())) else {
            tracing::warn!(playlist = %collection.name, "No common directory for playlist items");
            continue;
        };
        let path = dir.join(format!("{}.m3u", sanitize_component(&collection.name)));
        tokio::fs::write(&path, render_m3u(&dir, &entries))
            .await
            .map_err(|source| Error::Write {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(playlist = %collection.name, entries = entries.len(), "Playlist written");
        written.push(path);
    }
    Ok(written)
}
