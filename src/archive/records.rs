//! Per-identity archive reads and writes.

use crate::error::DatabaseError;
use crate::types::ItemId;
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;

use super::{Archive, ArchiveRecord, ArchiveRow, LOOKUP_CHUNK};

impl Archive {
    /// Whether a record exists for `id`
    pub async fn has(&self, id: &ItemId) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM downloaded_tracks WHERE track_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check archive for {}: {}",
                        id, e
                    )))
                })?;
        Ok(found.is_some())
    }

    /// Which of `ids` have records
    ///
    /// Queries in chunks of [`LOOKUP_CHUNK`] to stay under SQLite's bound
    /// parameter limit.
    pub async fn has_many(&self, ids: &[ItemId]) -> Result<HashSet<ItemId>> {
        let mut found = HashSet::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let mut query =
                QueryBuilder::<Sqlite>::new("SELECT track_id FROM downloaded_tracks WHERE track_id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");

            let rows: Vec<String> = query
                .build_query_scalar()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check archive batch: {}",
                        e
                    )))
                })?;
            found.extend(rows.into_iter().map(ItemId));
        }
        Ok(found)
    }

    /// Insert or replace the record for an identity
    ///
    /// Idempotent: recording the same identity twice leaves exactly one row,
    /// holding the latest values.
    pub async fn record(&self, record: &ArchiveRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO downloaded_tracks
                (track_id, output_path, completed_at, size_bytes, checksum, artist, album, title)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(track_id) DO UPDATE SET
                output_path = excluded.output_path,
                completed_at = excluded.completed_at,
                size_bytes = excluded.size_bytes,
                checksum = excluded.checksum,
                artist = excluded.artist,
                album = excluded.album,
                title = excluded.title
            "#,
        )
        .bind(&record.id)
        .bind(record.output_path.to_string_lossy().into_owned())
        .bind(record.completed_at.timestamp())
        .bind(record.size_bytes.map(|s| s as i64))
        .bind(&record.checksum)
        .bind(&record.artist)
        .bind(&record.album)
        .bind(&record.title)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record {}: {}",
                record.id, e
            )))
        })?;

        tracing::debug!(item_id = %record.id, path = %record.output_path.display(), "Archived");
        Ok(())
    }

    /// Fetch the record for an identity
    pub async fn get(&self, id: &ItemId) -> Result<Option<ArchiveRecord>> {
        let row: Option<ArchiveRow> =
            sqlx::query_as("SELECT * FROM downloaded_tracks WHERE track_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to get archive record {}: {}",
                        id, e
                    )))
                })?;
        Ok(row.map(ArchiveRecord::from))
    }

    /// All records, oldest first
    pub async fn all(&self) -> Result<Vec<ArchiveRecord>> {
        let rows: Vec<ArchiveRow> =
            sqlx::query_as("SELECT * FROM downloaded_tracks ORDER BY completed_at, track_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to list archive records: {}",
                        e
                    )))
                })?;
        Ok(rows.into_iter().map(ArchiveRecord::from).collect())
    }

    /// Remove the record for an identity, returning whether one existed
    pub async fn remove(&self, id: &ItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM downloaded_tracks WHERE track_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to remove archive record {}: {}",
                    id, e
                )))
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of records
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloaded_tracks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count archive records: {}",
                    e
                )))
            })?;
        Ok(count as u64)
    }
}
