//! URL expansion, resolution, filtering and cross-input dedupe.

use crate::error::{Error, Result};
use crate::filter::{self, FilterOptions};
use crate::resolver::UrlResolver;
use crate::types::{Event, ItemDescriptor, ItemId, UrlFailure};
use crate::utils::expand_sources;
use futures::StreamExt;
use std::collections::HashSet;

use super::Downloader;

/// Items ready for download, plus what was dropped on the way
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    /// Items in input order, each identity once
    pub items: Vec<ItemDescriptor>,
    /// Items dropped because an earlier input already produced them
    pub duplicates_removed: usize,
    /// Items dropped by the smart or albums-only filter
    pub filtered_out: usize,
    /// URLs that failed to resolve
    pub failures: Vec<UrlFailure>,
}

impl Downloader {
    /// Resolve URLs (or files listing URLs) into an ordered item list
    ///
    /// A URL that fails to resolve is recorded in [`Resolution::failures`]
    /// and does not stop the others. Filters apply per URL, to artist and
    /// label expansions only. Returns [`Error::Cancelled`] if the run is
    /// cancelled during resolution.
    pub async fn resolve_and_filter(&self, urls: &[String], smart: bool, albums_only: bool) -> Result<Resolution> {
        let urls = expand_sources(urls)?;
        let config = &self.config;
        let resolver = UrlResolver::new(
            self.catalog.clone(),
            config.retry.clone(),
            config.download.quality,
            config.download.resolution_concurrency,
        );
        let options = FilterOptions {
            smart,
            albums_only,
            min_album_tracks: config.filter.min_album_tracks,
            skip_extras: config.filter.skip_extras,
            quality: config.download.quality,
        };

        tracing::info!(urls = urls.len(), smart, albums_only, "Resolving URLs");

        let mut resolution = Resolution::default();
        let mut seen: HashSet<ItemId> = HashSet::new();
        let mut stream = resolver.resolve_stream(&urls);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                next = stream.next() => next,
            };
            let Some((index, raw, result)) = next else { break };

            match result {
                Ok(resolved) => {
                    self.emit_event(Event::UrlResolved {
                        url: raw.to_string(),
                        items: resolved.items.len(),
                    });
                    let collection = resolved.items.first().and_then(|i| i.collection.clone());
                    let filtered = filter::apply(resolved.items, collection.as_ref(), &options);
                    resolution.filtered_out += filtered.removed;

                    for item in filtered.items {
                        if seen.insert(item.id.clone()) {
                            resolution.items.push(item);
                        } else {
                            tracing::debug!(item_id = %item.id, url = %raw, "Item already produced by an earlier input");
                            resolution.duplicates_removed += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "Failed to resolve URL");
                    self.emit_event(Event::UrlFailed {
                        url: raw.to_string(),
                        error: e.to_string(),
                    });
                    resolution.failures.push(UrlFailure {
                        index,
                        url: raw.to_string(),
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            items = resolution.items.len(),
            duplicates = resolution.duplicates_removed,
            filtered = resolution.filtered_out,
            failed_urls = resolution.failures.len(),
            "Resolution finished"
        );
        Ok(resolution)
    }
}
