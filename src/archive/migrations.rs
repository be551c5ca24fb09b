//! Archive lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::Archive;

/// Columns absent from archives written by earlier qobuz-dl releases
const LEGACY_MISSING_COLUMNS: &[(&str, &str)] = &[
    ("output_path", "TEXT NOT NULL DEFAULT ''"),
    ("completed_at", "INTEGER NOT NULL DEFAULT 0"),
    ("size_bytes", "INTEGER"),
    ("checksum", "TEXT"),
];

impl Archive {
    /// Open (or create) the archive at `path`
    ///
    /// Fails with [`Error::ArchiveCorruption`] when the file is not a readable
    /// SQLite database or fails its integrity check.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create archive directory: {}",
                    e
                )))
            })?;
        }

        let options = connect_options(path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::ArchiveCorruption(format!("{}: {}", path.display(), e))
        })?;

        let archive = Self {
            pool,
            path: path.to_path_buf(),
        };

        archive.check_integrity().await?;
        archive.run_migrations().await?;

        tracing::debug!(path = %path.display(), "Archive opened");
        Ok(archive)
    }

    /// Open an existing archive without writing to it
    ///
    /// No file is created, no migration runs and a legacy layout is read as
    /// is; only the identity lookups (`has`, `has_many`, `count`) are
    /// guaranteed to work. Used by dry runs.
    pub async fn open_read_only(path: &Path) -> Result<Self> {
        let options = connect_options(path)?.read_only(true);
        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::ArchiveCorruption(format!("{}: {}", path.display(), e))
        })?;

        let archive = Self {
            pool,
            path: path.to_path_buf(),
        };
        archive.check_integrity().await?;

        tracing::debug!(path = %path.display(), "Archive opened read-only");
        Ok(archive)
    }

    /// Run `PRAGMA quick_check`, mapping anything but `ok` to corruption
    pub async fn check_integrity(&self) -> Result<()> {
        let rows: Vec<String> = sqlx::query_scalar("PRAGMA quick_check")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::ArchiveCorruption(format!("{}: {}", self.path.display(), e)))?;

        match rows.first().map(String::as_str) {
            Some("ok") => Ok(()),
            _ => Err(Error::ArchiveCorruption(format!(
                "{}: integrity check failed: {}",
                self.path.display(),
                rows.join("; ")
            ))),
        }
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }
        if current_version.unwrap_or(0) < 2 {
            Self::migrate_v2(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: the downloaded_tracks table
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying archive migration v1");

        sqlx::query("BEGIN").execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = async {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS downloaded_tracks (
                    track_id TEXT PRIMARY KEY,
                    output_path TEXT NOT NULL,
                    completed_at INTEGER NOT NULL,
                    size_bytes INTEGER,
                    checksum TEXT,
                    artist TEXT,
                    album TEXT,
                    title TEXT
                )
                "#,
            )
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_downloaded_tracks_artist ON downloaded_tracks(artist)",
            )
            .execute(&mut *conn)
            .await?;

            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (1, ?)")
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *conn)
                .await?;

            Ok::<(), sqlx::Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(|e| {
                    Error::Database(DatabaseError::MigrationFailed(format!(
                        "Failed to commit migration v1: {}",
                        e
                    )))
                })?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::error!(error = %rollback_err, "Failed to roll back migration v1");
                }
                Err(Error::Database(DatabaseError::MigrationFailed(format!(
                    "Migration v1 failed: {}",
                    e
                ))))
            }
        }
    }

    /// Migration v2: bring a `downloaded_tracks` table written by earlier
    /// qobuz-dl releases (`track_id, artist, album, title, downloaded_at`) up
    /// to the current layout
    ///
    /// Missing columns are added and `completed_at` is filled from
    /// `downloaded_at`. Tables created by v1 already have every column and are
    /// left as they are.
    async fn migrate_v2(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying archive migration v2");

        sqlx::query("BEGIN").execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = async {
            let columns: Vec<String> =
                sqlx::query_scalar("SELECT name FROM pragma_table_info('downloaded_tracks')")
                    .fetch_all(&mut *conn)
                    .await?;
            let has = |name: &str| columns.iter().any(|c| c == name);

            let mut added = Vec::new();
            for (name, definition) in LEGACY_MISSING_COLUMNS {
                if !has(name) {
                    sqlx::query(&format!("ALTER TABLE downloaded_tracks ADD COLUMN {name} {definition}"))
                        .execute(&mut *conn)
                        .await?;
                    added.push(*name);
                }
            }

            if added.contains(&"completed_at") && has("downloaded_at") {
                sqlx::query(
                    "UPDATE downloaded_tracks \
                     SET completed_at = COALESCE(CAST(strftime('%s', downloaded_at) AS INTEGER), 0)",
                )
                .execute(&mut *conn)
                .await?;
            }
            if !added.is_empty() {
                tracing::info!(columns = ?added, "Adopted legacy archive layout");
            }

            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (2, ?)")
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *conn)
                .await?;

            Ok::<(), sqlx::Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(|e| {
                    Error::Database(DatabaseError::MigrationFailed(format!(
                        "Failed to commit migration v2: {}",
                        e
                    )))
                })?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::error!(error = %rollback_err, "Failed to roll back migration v2");
                }
                Err(Error::Database(DatabaseError::MigrationFailed(format!(
                    "Migration v2 failed: {}",
                    e
                ))))
            }
        }
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn connect_options(path: &Path) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to parse archive path: {}",
                e
            )))
        })?
        .busy_timeout(Duration::from_secs(30));
    Ok(options)
}
