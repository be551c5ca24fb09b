//! Download archive
//!
//! SQLite persistence of completed items. The archive is the single source of
//! truth for "already downloaded": a record exists if and only if the item's
//! file was durably written in some run.
//!
//! ## Submodules
//!
//! Methods on [`Archive`] are organized by concern:
//! - [`migrations`]: open, integrity check, schema migrations, close
//! - [`records`]: per-identity reads and writes
//! - [`maintenance`]: stats, clear, compaction, legacy import
//!
//! Every write is a single statement (one implicit transaction), so concurrent
//! `has` readers observe either the pre- or post-write state of an identity.

use crate::types::{ItemDescriptor, ItemId};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::{Path, PathBuf};

mod maintenance;
mod migrations;
mod records;

pub use maintenance::read_legacy_ids;

/// Maximum number of IDs bound into one `IN (...)` query
pub const LOOKUP_CHUNK: usize = 500;

/// Number of artists reported in [`ArchiveStats::top_artists`]
pub const TOP_ARTISTS: i64 = 10;

/// A completed download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Item identity
    pub id: ItemId,
    /// Where the file was written
    pub output_path: PathBuf,
    /// When the file was written
    pub completed_at: DateTime<Utc>,
    /// File size in bytes
    pub size_bytes: Option<u64>,
    /// SHA-256 of the file contents (hex)
    pub checksum: Option<String>,
    /// Performing artist
    pub artist: Option<String>,
    /// Album title
    pub album: Option<String>,
    /// Track title
    pub title: Option<String>,
}

impl ArchiveRecord {
    /// Build a record for an item written now
    pub fn completed(
        item: &ItemDescriptor,
        output_path: &Path,
        size_bytes: u64,
        checksum: Option<String>,
    ) -> Self {
        Self {
            id: item.id.clone(),
            output_path: output_path.to_path_buf(),
            completed_at: Utc::now(),
            size_bytes: Some(size_bytes),
            checksum,
            artist: Some(item.artist.clone()),
            album: Some(item.album_title.clone()),
            title: Some(item.display_title()),
        }
    }
}

/// Archive statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStats {
    /// Number of records
    pub total_records: u64,
    /// Sum of recorded file sizes
    pub total_bytes: u64,
    /// Earliest completion
    pub first_completed: Option<DateTime<Utc>>,
    /// Latest completion
    pub last_completed: Option<DateTime<Utc>>,
    /// Artists with the most records, most first
    pub top_artists: Vec<(String, u64)>,
    /// Size of the database file in bytes
    pub file_size_bytes: u64,
}

/// Archive row from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
struct ArchiveRow {
    track_id: String,
    output_path: String,
    completed_at: i64,
    size_bytes: Option<i64>,
    checksum: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    title: Option<String>,
}

impl From<ArchiveRow> for ArchiveRecord {
    fn from(row: ArchiveRow) -> Self {
        ArchiveRecord {
            id: ItemId(row.track_id),
            output_path: PathBuf::from(row.output_path),
            completed_at: timestamp(row.completed_at),
            size_bytes: row.size_bytes.map(|s| s.max(0) as u64),
            checksum: row.checksum,
            artist: row.artist,
            album: row.album,
            title: row.title,
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Persistent archive of completed downloads
#[derive(Debug, Clone)]
pub struct Archive {
    pool: SqlitePool,
    path: PathBuf,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
