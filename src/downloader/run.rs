//! Path rendering, pre-run checks and scheduler hand-off.

use crate::config::{Config, validate_template};
use crate::error::Result;
use crate::scheduler::{OutputLayout, Scheduler, SchedulerSettings};
use crate::types::{DownloadTask, ItemDescriptor, Quality, RunSummary};
use crate::utils::ensure_free_space;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Downloader, playlist, session};

/// Per-run download options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Maximum tasks in flight (clamped to 1..=32)
    pub concurrency: usize,
    /// Requested quality tier, capped per item by what its album offers
    pub quality: Quality,
    /// Output path template, relative to the configured output directory
    pub output_template: String,
    /// Resolve paths and report without writing anything
    pub dry_run: bool,
    /// Consult and update the archive
    pub use_archive: bool,
}

impl DownloadOptions {
    /// Options taken from a [`Config`]
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.download.max_workers,
            quality: config.download.quality,
            output_template: config.download.output_template.clone(),
            dry_run: config.download.dry_run,
            use_archive: config.persistence.use_archive,
        }
    }
}

impl Downloader {
    /// Download items with bounded concurrency
    ///
    /// Fatal problems (malformed template, unreadable archive, not enough free
    /// space) are returned as `Err` before any item is fetched. Everything
    /// else is reported per task in the returned [`RunSummary`].
    pub async fn download(&self, items: Vec<ItemDescriptor>, options: &DownloadOptions) -> Result<RunSummary> {
        let template = validate_template(&options.output_template)?;
        let output_dir = &self.config.download.output_dir;

        let tasks: Vec<DownloadTask> = items
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                item.quality = options.quality.min(item.max_quality);
                let path = template.render_path(output_dir, &item);
                DownloadTask {
                    index,
                    item,
                    path,
                    retries: 0,
                }
            })
            .collect();

        if !options.dry_run && self.config.disk_space.enabled && !tasks.is_empty() {
            ensure_free_space(output_dir, self.config.disk_space.min_free_space)?;
        }

        let (archive, known_ids) = if !options.use_archive {
            tracing::info!("Archive disabled for this run");
            (None, HashSet::new())
        } else if options.dry_run {
            self.dry_run_archive().await?
        } else {
            (Some(self.archive().await?.clone()), HashSet::new())
        };

        let settings = SchedulerSettings {
            dry_run: options.dry_run,
            layout: Some(OutputLayout {
                template,
                root: output_dir.clone(),
            }),
            ..SchedulerSettings::from_config(&self.config)
        };
        let scheduler = Scheduler::new(
            self.catalog.clone(),
            self.tagger.clone(),
            archive,
            settings,
            self.event_tx.clone(),
            self.cancel.clone(),
        )
        .with_known_ids(known_ids);

        scheduler.run(tasks, options.concurrency).await
    }

    /// Resolve, filter and download with the configured defaults
    ///
    /// Afterwards writes M3U files for playlist inputs (when enabled) and
    /// appends a line to the session history (when configured). Failures in
    /// either are logged and do not change the returned summary.
    pub async fn run(&self, urls: &[String]) -> Result<RunSummary> {
        let started = chrono::Utc::now();
        let clock = std::time::Instant::now();
        let config = &self.config;

        let resolution = self
            .resolve_and_filter(urls, config.filter.smart_discography, config.filter.albums_only)
            .await?;
        let options = DownloadOptions::from_config(config);

        let mut summary = self.download(resolution.items.clone(), &options).await?;
        let duplicates = resolution.duplicates_removed as u64;
        summary.resolved += duplicates;
        summary.skipped_duplicate += duplicates;
        summary.resolution_failures = resolution.failures;

        if !options.dry_run && config.download.write_m3u {
            match playlist::write_playlists(&resolution.items, &summary).await {
                Ok(written) => {
                    for path in written {
                        tracing::info!(path = %path.display(), "Wrote playlist");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to write playlist file"),
            }
        }

        if let Some(history) = &config.persistence.session_history_path {
            let entry = session::SessionEntry::from_summary(&summary, started, clock.elapsed());
            if let Err(e) = session::append(history, &entry).await {
                tracing::warn!(path = %history.display(), error = %e, "Failed to append session history");
            }
        }

        Ok(summary)
    }
}
