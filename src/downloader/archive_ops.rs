//! Archive statistics, compaction and clearing.

use crate::archive::ArchiveStats;
use crate::error::{Error, Result};

use super::Downloader;

impl Downloader {
    /// Summary statistics of the archive
    pub async fn archive_stats(&self) -> Result<ArchiveStats> {
        self.archive().await?.stats().await
    }

    /// Compact the archive file without changing its records
    pub async fn archive_vacuum(&self) -> Result<()> {
        let archive = self.archive().await?;
        let before = archive.count().await?;
        archive.compact().await?;
        tracing::info!(records = before, "Archive vacuumed");
        Ok(())
    }

    /// Remove every archive record, returning how many were removed
    ///
    /// Without `force` nothing is removed and
    /// [`Error::ConfirmationRequired`] reports how many records would go.
    pub async fn archive_clear(&self, force: bool) -> Result<u64> {
        let archive = self.archive().await?;
        if !force {
            let records = archive.count().await?;
            tracing::warn!(records, "Refusing to clear archive without confirmation");
            return Err(Error::ConfirmationRequired { records });
        }
        archive.clear().await
    }
}
