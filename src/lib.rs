//! # qobuz-dl
//!
//! Backend library for downloading music from the Qobuz catalog.
//!
//! ## Pipeline
//!
//! - **Resolve** catalog URLs (track, album, playlist, artist, label) into
//!   ordered item lists, concurrently and in input order
//! - **Filter** artist and label discographies down to one edition per
//!   release, optionally dropping singles and EPs
//! - **Render** each item's output path from a template with conditional
//!   segments
//! - **Download** with a bounded worker pool: save the album cover, stream
//!   to a part file, rename, tag, check the audio header, then record the
//!   item in a SQLite archive so later runs skip it
//!
//! The catalog client and the tagger are traits ([`CatalogService`],
//! [`Tagger`]) supplied by the embedding application. The library never
//! installs a tracing subscriber; progress is published as [`Event`]s.
//!
//! ## Quick Start
//!
//! ```no_run
//! use qobuz_dl::{Config, Downloader, NoOpTagger};
//! # use qobuz_dl::catalog::CatalogService;
//! use std::sync::Arc;
//!
//! # async fn example(catalog: Arc<dyn CatalogService>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("qobuz-dl.json")?;
//! config.validate()?;
//!
//! let downloader = Downloader::new(config, catalog, Arc::new(NoOpTagger));
//!
//! let mut events = downloader.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let summary = downloader
//!     .run(&["https://www.qobuz.com/us-en/album/mezzanine/0724384559954".to_string()])
//!     .await?;
//! println!("{} downloaded, {} failed", summary.succeeded, summary.failed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive of completed downloads
pub mod archive;
/// Catalog service boundary
pub mod catalog;
/// Configuration types
pub mod config;
/// Download orchestrator
pub mod downloader;
/// Error types
pub mod error;
/// Discography filtering
pub mod filter;
/// Cover assets and audio header checks
pub mod media;
/// URL resolution
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Bounded-concurrency download scheduler
pub mod scheduler;
/// Tagger boundary
pub mod tagger;
/// Output path templates
pub mod template;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use archive::{Archive, ArchiveRecord, ArchiveStats};
pub use catalog::{CatalogEntity, CatalogService, Streamable};
pub use config::{Config, FileCollisionAction};
pub use downloader::{DiagnosticCheck, DiagnosticReport, DownloadOptions, Downloader, Resolution};
pub use error::{
    CatalogError, DatabaseError, Error, ResolutionError, Result, TagError, TemplateError,
};
pub use tagger::{NoOpTagger, Tagger, TaggerCapabilities};
pub use template::Template;
pub use types::{
    DownloadTask, Event, FailureKind, ItemDescriptor, ItemId, Quality, RunStatus, RunSummary,
    SkipReason, TaskOutcome, TaskReport, UrlFailure, UrlKind,
};

/// Run URLs to completion, cancelling cleanly on a termination signal.
///
/// The first SIGINT or SIGTERM cancels the run: workers stop claiming tasks,
/// in-flight transfers remove their partial files, and the summary comes back
/// with `cancelled` set. Items already archived stay archived.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use qobuz_dl::{Config, Downloader, NoOpTagger, run_with_shutdown};
/// # use qobuz_dl::catalog::CatalogService;
/// use std::sync::Arc;
///
/// # async fn example(catalog: Arc<dyn CatalogService>) -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = Downloader::new(Config::default(), catalog, Arc::new(NoOpTagger));
/// let urls = vec!["https://www.qobuz.com/us-en/playlist/night-drive/1234".to_string()];
///
/// let summary = run_with_shutdown(&downloader, &urls).await?;
/// if summary.cancelled {
///     eprintln!("interrupted after {} items", summary.outcomes.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(downloader: &Downloader, urls: &[String]) -> Result<RunSummary> {
    let token = downloader.cancellation_token();
    let watcher = {
        let downloader = downloader.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => downloader.cancel(),
                _ = token.cancelled() => {}
            }
        })
    };

    let result = downloader.run(urls).await;
    watcher.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
