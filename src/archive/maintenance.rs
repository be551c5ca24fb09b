//! Archive statistics, clearing, compaction and legacy import.

use crate::error::DatabaseError;
use crate::types::ItemId;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{Archive, ArchiveStats, TOP_ARTISTS, timestamp};

impl Archive {
    /// Summary statistics over all records
    pub async fn stats(&self) -> Result<ArchiveStats> {
        let (total, bytes, first, last): (i64, i64, Option<i64>, Option<i64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), MIN(completed_at), MAX(completed_at)
            FROM downloaded_tracks
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to compute archive stats: {}",
                e
            )))
        })?;

        let top_artists: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT artist, COUNT(*) AS n
            FROM downloaded_tracks
            WHERE artist IS NOT NULL AND artist != ''
            GROUP BY artist
            ORDER BY n DESC, artist ASC
            LIMIT ?
            "#,
        )
        .bind(TOP_ARTISTS)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to compute top artists: {}",
                e
            )))
        })?;

        Ok(ArchiveStats {
            total_records: total.max(0) as u64,
            total_bytes: bytes.max(0) as u64,
            first_completed: first.map(timestamp),
            last_completed: last.map(timestamp),
            top_artists: top_artists
                .into_iter()
                .map(|(artist, n)| (artist, n.max(0) as u64))
                .collect(),
            file_size_bytes: self.file_size().await?,
        })
    }

    /// Logical size of the database (page count times page size)
    async fn file_size(&self) -> Result<u64> {
        let pages: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;
        Ok((pages.max(0) as u64).saturating_mul(page_size.max(0) as u64))
    }

    /// Remove every record, returning how many were removed
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM downloaded_tracks")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear archive: {}",
                    e
                )))
            })?;
        tracing::info!(removed = result.rows_affected(), "Archive cleared");
        Ok(result.rows_affected())
    }

    /// Rebuild the database file and refresh planner statistics
    ///
    /// Logical content is unchanged.
    pub async fn compact(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&mut *conn)
            .await?;
        sqlx::query("VACUUM").execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!("VACUUM failed: {}", e)))
        })?;
        sqlx::query("ANALYZE").execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!("ANALYZE failed: {}", e)))
        })?;
        tracing::info!(path = %self.path.display(), "Archive compacted");
        Ok(())
    }

    /// Import a text archive of IDs (one per line) and rename it to `*.migrated`
    ///
    /// Existing records are left untouched. Returns the number of IDs inserted,
    /// or `None` when `legacy` does not exist.
    pub async fn import_legacy_text(&self, legacy: &Path) -> Result<Option<u64>> {
        let Some(ids) = read_legacy_ids(legacy).await? else {
            return Ok(None);
        };
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for id in &ids {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO downloaded_tracks (track_id, output_path, completed_at) VALUES (?, '', ?)",
            )
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        let migrated = migrated_path(legacy);
        tokio::fs::rename(legacy, &migrated).await?;
        tracing::info!(
            inserted,
            from = %legacy.display(),
            renamed_to = %migrated.display(),
            "Imported legacy text archive"
        );
        Ok(Some(inserted))
    }
}

/// IDs listed in a legacy text archive, or `None` when the file does not exist
///
/// Blank lines are ignored and repeated IDs are kept once.
pub async fn read_legacy_ids(legacy: &Path) -> Result<Option<HashSet<ItemId>>> {
    if !legacy.is_file() {
        return Ok(None);
    }
    let text = tokio::fs::read_to_string(legacy).await?;
    Ok(Some(
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ItemId::from)
            .collect(),
    ))
}

fn migrated_path(legacy: &Path) -> PathBuf {
    let mut name = legacy.as_os_str().to_owned();
    name.push(".migrated");
    PathBuf::from(name)
}
