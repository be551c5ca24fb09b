//! Shared fixtures for unit tests: a scripted in-memory catalog, recording
//! taggers and descriptor builders.

use crate::catalog::{AlbumInfo, ByteStream, CatalogEntity, CatalogService, Streamable, TrackInfo};
use crate::error::{CatalogError, TagError};
use crate::tagger::{Tagger, TaggerCapabilities};
use crate::types::{CatalogUrl, ItemDescriptor, ItemId, Quality, UrlKind};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The descriptor used across template and type tests
pub(crate) fn sample_item() -> ItemDescriptor {
    ItemDescriptor {
        id: ItemId::from("1001"),
        album_id: "alb1".into(),
        collection: None,
        title: "Speak to Me".into(),
        version: None,
        artist: "Pink Floyd".into(),
        album_artist: "Pink Floyd".into(),
        album_title: "The Dark Side of the Moon".into(),
        album_version: None,
        label: None,
        composer: None,
        featured_artists: Vec::new(),
        producers: Vec::new(),
        disc_number: 1,
        track_number: 1,
        disc_count: 1,
        album_track_count: 10,
        year: Some(1973),
        release_date: None,
        max_quality: Quality::HiRes,
        quality: Quality::Lossless,
        duration_secs: 68,
        explicit: false,
        cover_url: None,
        source_url_index: 0,
    }
}

/// Descriptor with a given id, album and track number
pub(crate) fn item(id: &str, album: &str, track: u32) -> ItemDescriptor {
    ItemDescriptor {
        id: ItemId::from(id),
        album_id: album.into(),
        album_title: format!("Album {album}"),
        title: format!("Track {id}"),
        track_number: track,
        ..sample_item()
    }
}

pub(crate) fn album_info(id: &str, title: &str, artist: &str, tracks: u32) -> AlbumInfo {
    AlbumInfo {
        id: id.into(),
        title: title.into(),
        version: None,
        artist: artist.into(),
        artist_id: Some(format!("artist-{}", artist.to_lowercase().replace(' ', "-"))),
        label: Some("Harvest".into()),
        release_date: NaiveDate::from_ymd_opt(1969, 9, 26),
        disc_count: 1,
        track_count: tracks,
        max_quality: Quality::HiRes,
        streamable: true,
        cover_url: Some(format!("https://static.qobuz.com/images/covers/{id}_600.jpg")),
    }
}

pub(crate) fn track_info(id: &str, album: &AlbumInfo, disc: u32, number: u32) -> TrackInfo {
    TrackInfo {
        id: ItemId::from(id),
        title: format!("Track {id}"),
        version: None,
        artist: album.artist.clone(),
        composer: None,
        featured_artists: Vec::new(),
        producers: Vec::new(),
        disc_number: disc,
        track_number: number,
        duration_secs: 180,
        explicit: false,
        album: album.clone(),
    }
}

/// Scripted behaviour for one item's stream
#[derive(Clone, Default)]
pub(crate) struct StreamScript {
    /// Errors returned by successive `get_streamable` calls before succeeding
    pub failures: VecDeque<CatalogError>,
    /// Body delivered once the failures are used up
    pub body: Vec<u8>,
    /// Report the requested quality as restricted
    pub restricted: bool,
    /// Sleep before yielding the body
    pub delay: Option<Duration>,
    /// Yield one chunk and then never finish
    pub stall: bool,
    /// Size to announce instead of the body length
    pub announced: Option<u64>,
    /// Tier to report as delivered instead of the requested one
    pub delivered: Option<Quality>,
    /// Awaited on every `get_streamable` call (1-based), before any scripted failure
    pub on_call: Option<Arc<dyn Fn(u32) -> BoxFuture<'static, ()> + Send + Sync>>,
}

/// In-memory catalog with call counting
#[derive(Default)]
pub(crate) struct MockCatalog {
    entities: Mutex<HashMap<(UrlKind, String), CatalogEntity>>,
    resolve_failures: Mutex<HashMap<(UrlKind, String), VecDeque<CatalogError>>>,
    streams: Mutex<HashMap<ItemId, StreamScript>>,
    stream_calls: Mutex<HashMap<ItemId, u32>>,
    resolve_calls: Mutex<u32>,
    assets: Mutex<HashMap<String, Vec<u8>>>,
    asset_calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_entity(&self, kind: UrlKind, id: &str, entity: CatalogEntity) {
        self.entities
            .lock()
            .unwrap()
            .insert((kind, id.to_string()), entity);
    }

    /// Register an album and return its track IDs
    pub(crate) fn add_album(&self, album: AlbumInfo, track_ids: &[&str]) -> Vec<ItemId> {
        let tracks: Vec<TrackInfo> = track_ids
            .iter()
            .enumerate()
            .map(|(i, id)| track_info(id, &album, 1, i as u32 + 1))
            .collect();
        for t in &tracks {
            self.add_entity(UrlKind::Track, t.id.as_str(), CatalogEntity::Track(t.clone()));
            self.set_stream(&t.id, StreamScript {
                body: flac_body(t.id.as_str()),
                ..Default::default()
            });
        }
        let ids = tracks.iter().map(|t| t.id.clone()).collect();
        let album_id = album.id.clone();
        self.add_entity(UrlKind::Album, &album_id, CatalogEntity::Album { album, tracks });
        ids
    }

    pub(crate) fn fail_resolve(&self, kind: UrlKind, id: &str, errors: Vec<CatalogError>) {
        self.resolve_failures
            .lock()
            .unwrap()
            .insert((kind, id.to_string()), errors.into());
    }

    pub(crate) fn set_stream(&self, id: &ItemId, script: StreamScript) {
        self.streams.lock().unwrap().insert(id.clone(), script);
    }

    pub(crate) fn stream_calls(&self, id: &ItemId) -> u32 {
        self.stream_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub(crate) fn total_stream_calls(&self) -> u32 {
        self.stream_calls.lock().unwrap().values().sum()
    }

    pub(crate) fn resolve_calls(&self) -> u32 {
        *self.resolve_calls.lock().unwrap()
    }

    pub(crate) fn add_asset(&self, url: &str, bytes: Vec<u8>) {
        self.assets.lock().unwrap().insert(url.to_string(), bytes);
    }

    /// URLs passed to `get_asset`, in call order
    pub(crate) fn asset_calls(&self) -> Vec<String> {
        self.asset_calls.lock().unwrap().clone()
    }
}

/// Bytes that pass the FLAC header check, tagged with `id`
pub(crate) fn flac_body(id: &str) -> Vec<u8> {
    format!("fLaC audio-{id}").into_bytes()
}

#[async_trait]
impl CatalogService for MockCatalog {
    async fn resolve_url(&self, url: &CatalogUrl) -> Result<CatalogEntity, CatalogError> {
        *self.resolve_calls.lock().unwrap() += 1;
        let key = (url.kind, url.id.clone());
        if let Some(err) = self
            .resolve_failures
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        self.entities
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("{} {}", url.kind, url.id)))
    }

    async fn get_streamable(&self, id: &ItemId, quality: Quality) -> Result<Streamable, CatalogError> {
        let call = {
            let mut calls = self.stream_calls.lock().unwrap();
            let count = calls.entry(id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let (script, failure) = {
            let mut streams = self.streams.lock().unwrap();
            let script = streams
                .get_mut(id)
                .ok_or_else(|| CatalogError::NotFound(format!("stream {id}")))?;
            let failure = script.failures.pop_front();
            (script.clone(), failure)
        };
        if let Some(on_call) = &script.on_call {
            on_call(call).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }

        let size_hint = script.announced.or(Some(script.body.len() as u64));
        let stream = if script.stall {
            futures::stream::once(async move { Ok::<_, CatalogError>(script.body) })
                .chain(futures::stream::pending())
                .boxed()
        } else {
            let chunks: Vec<Result<Vec<u8>, CatalogError>> = script
                .body
                .chunks(4)
                .map(|c| Ok(c.to_vec()))
                .collect();
            futures::stream::iter(chunks).boxed()
        };

        let delivered = match (script.delivered, script.restricted) {
            (Some(q), _) => q,
            (None, true) => Quality::Lossless.min(quality),
            (None, false) => quality,
        };
        Ok(Streamable {
            stream,
            quality: delivered,
            quality_restricted: script.restricted,
            size_hint,
        })
    }

    async fn get_asset(&self, url: &str) -> Result<ByteStream, CatalogError> {
        self.asset_calls.lock().unwrap().push(url.to_string());
        let bytes = self
            .assets
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("asset {url}")))?;
        Ok(futures::stream::iter(vec![Ok(bytes)]).boxed())
    }
}

/// Tagger that records every call and optionally fails
#[derive(Default)]
pub(crate) struct RecordingTagger {
    pub calls: Mutex<Vec<(PathBuf, ItemId, bool, bool)>>,
    pub fail: bool,
}

impl RecordingTagger {
    pub(crate) fn failing() -> Self {
        Self {
            calls: Mutex::default(),
            fail: true,
        }
    }

    pub(crate) fn tagged(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect()
    }
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn apply(
        &self,
        path: &Path,
        item: &ItemDescriptor,
        _quality: Quality,
        embed_art: bool,
        og_cover: bool,
    ) -> Result<(), TagError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), item.id.clone(), embed_art, og_cover));
        if self.fail {
            return Err(TagError::Failed {
                path: path.to_path_buf(),
                reason: "corrupt header".into(),
            });
        }
        Ok(())
    }

    fn capabilities(&self) -> TaggerCapabilities {
        TaggerCapabilities {
            can_tag: true,
            can_embed_art: true,
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
