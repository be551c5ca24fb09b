//! Download orchestrator
//!
//! [`Downloader`] wires the pipeline together: URL resolution, discography
//! filtering, path rendering and the worker pool, plus the archive
//! maintenance and diagnostic operations exposed to the surrounding tool.
//!
//! The methods are organized by domain:
//! - [`resolve`] - URL expansion, resolution, filtering and cross-input dedupe
//! - [`run`] - path rendering, pre-run checks and scheduler hand-off
//! - [`archive_ops`] - archive statistics, compaction and clearing
//! - [`diagnostics`] - configuration validation and environment checks
//! - [`playlist`] - extended M3U output for playlist downloads
//! - [`session`] - per-run session history

mod archive_ops;
mod diagnostics;
pub mod playlist;
mod resolve;
mod run;
pub mod session;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use diagnostics::{DiagnosticCheck, DiagnosticReport};
pub use resolve::Resolution;
pub use run::DownloadOptions;

use crate::archive::{Archive, read_legacy_ids};
use crate::catalog::CatalogService;
use crate::config::Config;
use crate::error::Result;
use crate::tagger::Tagger;
use crate::types::{Event, ItemId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{OnceCell, broadcast};
use tokio_util::sync::CancellationToken;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Downloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Catalog client used for resolution and streaming
    pub(crate) catalog: Arc<dyn CatalogService>,
    /// Tagger applied to every written file
    pub(crate) tagger: Arc<dyn Tagger>,
    /// Archive store, opened on first use
    pub(crate) archive: Arc<OnceCell<Archive>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Run-level cancellation
    pub(crate) cancel: CancellationToken,
}

impl Downloader {
    /// Create a new Downloader
    ///
    /// Nothing touches the disk or network here: the archive is opened the
    /// first time an operation needs it, so a run with the archive disabled
    /// works even when the archive file is unreadable.
    pub fn new(config: Config, catalog: Arc<dyn CatalogService>, tagger: Arc<dyn Tagger>) -> Self {
        // Buffer of 1000 events; slow subscribers receive RecvError::Lagged
        let (event_tx, _rx) = broadcast::channel(1000);

        let caps = tagger.capabilities();
        tracing::info!(
            catalog = catalog.name(),
            tagger = tagger.name(),
            can_tag = caps.can_tag,
            can_embed_art = caps.can_embed_art,
            "Downloader initialized"
        );

        Self {
            config: Arc::new(config),
            catalog,
            tagger,
            archive: Arc::new(OnceCell::new()),
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to run events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events, it will receive a
    /// `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use qobuz_dl::{Config, Downloader, NoOpTagger};
    /// # use qobuz_dl::catalog::CatalogService;
    /// # use std::sync::Arc;
    /// # async fn example(catalog: Arc<dyn CatalogService>) {
    /// let downloader = Downloader::new(Config::default(), catalog, Arc::new(NoOpTagger));
    ///
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "download event");
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Cancel the current run
    ///
    /// Workers stop claiming tasks, in-flight transfers are interrupted and
    /// their partial files removed. A cancelled downloader stays cancelled.
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Token cancelled by [`Downloader::cancel`]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// The archive, opening it (and importing a legacy text archive) on first use
    ///
    /// A failed open is not cached.
    pub(crate) async fn archive(&self) -> Result<&Archive> {
        self.archive
            .get_or_try_init(|| async {
                let archive = Archive::open(&self.config.persistence.archive_path).await?;
                if let Some(legacy) = &self.config.persistence.legacy_archive_path {
                    if let Some(imported) = archive.import_legacy_text(legacy).await? {
                        tracing::info!(
                            legacy = %legacy.display(),
                            imported,
                            "Imported legacy archive"
                        );
                    }
                }
                Ok(archive)
            })
            .await
    }

    /// What a dry run treats as archived, without writing anything
    ///
    /// Reuses the archive if this downloader already opened it, otherwise
    /// opens an existing file read-only. A pending legacy text archive is
    /// read into memory instead of being imported.
    pub(crate) async fn dry_run_archive(&self) -> Result<(Option<Archive>, HashSet<ItemId>)> {
        let persistence = &self.config.persistence;
        let archive = if let Some(open) = self.archive.get() {
            Some(open.clone())
        } else if persistence.archive_path.exists() {
            Some(Archive::open_read_only(&persistence.archive_path).await?)
        } else {
            None
        };

        let legacy = match &persistence.legacy_archive_path {
            Some(path) => read_legacy_ids(path).await?.unwrap_or_default(),
            None => HashSet::new(),
        };
        Ok((archive, legacy))
    }
}
