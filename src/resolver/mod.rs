//! URL Resolver
//!
//! Turns catalog URLs into ordered [`ItemDescriptor`] lists:
//! - track: one descriptor
//! - album: every track, ordered by disc then track number
//! - playlist: playlist order, tagged with the playlist as their collection
//! - artist/label: every streamable album, each fetched separately and tagged
//!   with the artist/label as their collection
//!
//! Several input URLs resolve concurrently ([`UrlResolver::resolve_all`]) but
//! results come back in input order.

use crate::catalog::{AlbumInfo, CatalogEntity, CatalogService, TrackInfo};
use crate::config::RetryConfig;
use crate::error::{ResolutionError, Result};
use crate::retry::retry_with_backoff;
use crate::types::{CatalogUrl, Collection, ItemDescriptor, Quality, UrlFailure, UrlKind};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;

mod credits;
mod url;

pub use url::parse_catalog_url;

/// Items produced by one input URL
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedUrl {
    /// Position of the URL in the input list
    pub index: usize,
    /// The parsed URL
    pub url: CatalogUrl,
    /// Descriptors in resolver order
    pub items: Vec<ItemDescriptor>,
}

/// Resolves catalog URLs through a [`CatalogService`]
#[derive(Clone)]
pub struct UrlResolver {
    catalog: Arc<dyn CatalogService>,
    retry: RetryConfig,
    quality: Quality,
    concurrency: usize,
}

impl UrlResolver {
    /// Create a resolver requesting `quality` for every item
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        retry: RetryConfig,
        quality: Quality,
        concurrency: usize,
    ) -> Self {
        Self {
            catalog,
            retry,
            quality,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve one URL into descriptors
    ///
    /// `index` is the URL's position in the input list and is stamped on every
    /// descriptor as `source_url_index`.
    pub async fn resolve(&self, raw: &str, index: usize) -> Result<ResolvedUrl> {
        let url = parse_catalog_url(raw)?;
        let entity = self.fetch(&url).await?;

        let items = match entity {
            CatalogEntity::Track(track) => {
                if !track.album.streamable {
                    warn_not_streamable(&track.album);
                    Vec::new()
                } else {
                    vec![self.descriptor(&track, &track.album, None, index)]
                }
            }
            CatalogEntity::Album { album, tracks } => self.album_items(&album, tracks, None, index),
            CatalogEntity::Playlist { id, name, tracks } => {
                let collection = Collection {
                    kind: UrlKind::Playlist,
                    id,
                    name,
                };
                tracks
                    .iter()
                    .filter(|t| {
                        let ok = t.album.streamable;
                        if !ok {
                            warn_not_streamable(&t.album);
                        }
                        ok
                    })
                    .map(|t| self.descriptor(t, &t.album, Some(&collection), index))
                    .collect()
            }
            CatalogEntity::Artist { id, name, albums } => {
                let collection = Collection {
                    kind: UrlKind::Artist,
                    id,
                    name,
                };
                self.expand_albums(albums, &collection, index).await
            }
            CatalogEntity::Label { id, name, albums } => {
                let collection = Collection {
                    kind: UrlKind::Label,
                    id,
                    name,
                };
                self.expand_albums(albums, &collection, index).await
            }
        };

        tracing::info!(url = %url.raw, kind = %url.kind, items = items.len(), "Resolved URL");
        Ok(ResolvedUrl { index, url, items })
    }

    /// Resolve URLs concurrently, yielding results in input order
    pub fn resolve_stream<'a>(
        &'a self,
        urls: &'a [String],
    ) -> BoxStream<'a, (usize, &'a str, Result<ResolvedUrl>)> {
        futures::stream::iter(urls.iter().enumerate())
            .map(move |(index, raw)| async move { (index, raw.as_str(), self.resolve(raw, index).await) })
            .buffered(self.concurrency)
            .boxed()
    }

    /// Resolve every URL, collecting per-URL failures instead of aborting
    pub async fn resolve_all(&self, urls: &[String]) -> (Vec<ResolvedUrl>, Vec<UrlFailure>) {
        let mut resolved = Vec::new();
        let mut failures = Vec::new();
        let mut stream = self.resolve_stream(urls);
        while let Some((index, raw, result)) = stream.next().await {
            match result {
                Ok(r) => resolved.push(r),
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "Failed to resolve URL");
                    failures.push(UrlFailure {
                        index,
                        url: raw.to_string(),
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        (resolved, failures)
    }

    async fn fetch(&self, url: &CatalogUrl) -> Result<CatalogEntity> {
        let entity = retry_with_backoff(&self.retry, || self.catalog.resolve_url(url))
            .await
            .map_err(|e| ResolutionError::from_catalog(url.kind, &url.id, e))?;
        if entity.kind() != url.kind {
            return Err(ResolutionError::UnexpectedEntity {
                expected: url.kind,
                actual: entity.kind(),
                id: url.id.clone(),
            }
            .into());
        }
        Ok(entity)
    }

    /// Fetch each album of an artist/label expansion
    ///
    /// An album that fails to resolve is logged and left out; the rest of the
    /// expansion still downloads.
    async fn expand_albums(
        &self,
        albums: Vec<AlbumInfo>,
        collection: &Collection,
        index: usize,
    ) -> Vec<ItemDescriptor> {
        let streamable: Vec<AlbumInfo> = albums
            .into_iter()
            .filter(|a| {
                if !a.streamable {
                    warn_not_streamable(a);
                }
                a.streamable
            })
            .collect();

        let fetched: Vec<(String, Result<CatalogEntity>)> = futures::stream::iter(streamable)
            .map(|album| async move {
                let url = CatalogUrl {
                    kind: UrlKind::Album,
                    raw: format!("album/{}", album.id),
                    id: album.id.clone(),
                };
                (album.id, self.fetch(&url).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut items = Vec::new();
        for (album_id, result) in fetched {
            match result {
                Ok(CatalogEntity::Album { album, tracks }) => {
                    items.extend(self.album_items(&album, tracks, Some(collection), index));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        album_id = %album_id,
                        collection = %collection.name,
                        error = %e,
                        "Skipping album that failed to resolve"
                    );
                }
            }
        }
        items
    }

    fn album_items(
        &self,
        album: &AlbumInfo,
        mut tracks: Vec<TrackInfo>,
        collection: Option<&Collection>,
        index: usize,
    ) -> Vec<ItemDescriptor> {
        if !album.streamable {
            warn_not_streamable(album);
            return Vec::new();
        }
        tracks.sort_by_key(|t| (t.disc_number, t.track_number));
        let track_count = if album.track_count > 0 {
            album.track_count
        } else {
            tracks.len() as u32
        };
        tracks
            .iter()
            .map(|t| {
                let mut item = self.descriptor(t, album, collection, index);
                item.album_track_count = track_count;
                item
            })
            .collect()
    }

    fn descriptor(
        &self,
        track: &TrackInfo,
        album: &AlbumInfo,
        collection: Option<&Collection>,
        index: usize,
    ) -> ItemDescriptor {
        ItemDescriptor {
            id: track.id.clone(),
            album_id: album.id.clone(),
            collection: collection.cloned(),
            title: track.title.clone(),
            version: track.version.clone(),
            artist: track.artist.clone(),
            album_artist: album.artist.clone(),
            album_title: album.title.clone(),
            album_version: album.version.clone(),
            label: album.label.clone(),
            composer: track.composer.clone(),
            featured_artists: credits::featured_artists(track),
            producers: track.producers.clone(),
            disc_number: track.disc_number.max(1),
            track_number: track.track_number,
            disc_count: album.disc_count.max(1),
            album_track_count: album.track_count,
            year: album.year(),
            release_date: album.release_date,
            max_quality: album.max_quality,
            quality: self.quality.min(album.max_quality),
            duration_secs: track.duration_secs,
            explicit: track.explicit,
            cover_url: album.cover_url.clone(),
            source_url_index: index,
        }
    }
}

fn warn_not_streamable(album: &AlbumInfo) {
    tracing::warn!(album_id = %album.id, title = %album.title, "Album is not streamable, skipping");
}
