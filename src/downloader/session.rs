//! Session history: one JSON line per finished run.

use crate::error::Result;
use crate::types::RunSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Counters of one finished run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// When the run started
    pub timestamp: DateTime<Utc>,
    /// Items handed to the scheduler
    pub resolved: u64,
    /// Successful tasks
    pub succeeded: u64,
    /// Failed tasks
    pub failed: u64,
    /// Identities repeated across inputs
    pub skipped_duplicate: u64,
    /// Identities already archived
    pub skipped_archived: u64,
    /// Existing files kept
    pub skipped_existing: u64,
    /// Quality unavailable with fallback disabled
    pub skipped_quality: u64,
    /// Bytes written
    pub bytes_downloaded: u64,
    /// Wall-clock length of the run
    pub duration_secs: f64,
    /// Dry run
    pub dry_run: bool,
    /// Cancelled before every task finished
    pub cancelled: bool,
}

impl SessionEntry {
    /// Build an entry from a run summary
    pub fn from_summary(summary: &RunSummary, started: DateTime<Utc>, elapsed: Duration) -> Self {
        Self {
            timestamp: started,
            resolved: summary.resolved,
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped_duplicate: summary.skipped_duplicate,
            skipped_archived: summary.skipped_archived,
            skipped_existing: summary.skipped_existing,
            skipped_quality: summary.skipped_quality,
            bytes_downloaded: summary.bytes_downloaded,
            duration_secs: elapsed.as_secs_f64(),
            dry_run: summary.dry_run,
            cancelled: summary.cancelled,
        }
    }
}

/// Append one entry to the history file, creating it if needed
pub async fn append(path: &Path, entry: &SessionEntry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Read every entry from a history file
///
/// A missing file is an empty history.
pub async fn read_history(path: &Path) -> Result<Vec<SessionEntry>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Into::into))
        .collect()
}
