//! In-memory catalog, recording tagger and catalog fixtures

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use qobuz_dl::catalog::{AlbumInfo, ByteStream, TrackInfo};
use qobuz_dl::{
    CatalogEntity, CatalogError, CatalogService, ItemDescriptor, ItemId, Quality, Streamable,
    TagError, Tagger, TaggerCapabilities, UrlKind,
};
use qobuz_dl::types::CatalogUrl;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// How one item's stream behaves
#[derive(Clone, Default)]
pub struct StreamBehavior {
    /// Errors returned by the first `get_streamable` calls
    pub failures: VecDeque<CatalogError>,
    /// Body once the failures are used up
    pub body: Vec<u8>,
    /// Yield the first chunk and then hang forever
    pub stall: bool,
}

/// Catalog served from memory
#[derive(Default)]
pub struct FakeCatalog {
    entities: Mutex<HashMap<(UrlKind, String), CatalogEntity>>,
    streams: Mutex<HashMap<ItemId, StreamBehavior>>,
    stream_calls: Mutex<Vec<ItemId>>,
    assets: Mutex<HashMap<String, Vec<u8>>>,
    asset_calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    /// Register an entity under a URL kind and id
    pub fn insert(&self, kind: UrlKind, id: &str, entity: CatalogEntity) {
        self.entities.lock().unwrap().insert((kind, id.to_string()), entity);
    }

    /// Register an album with tracks `<id>-1..=<id>-<tracks>` and return them
    pub fn album(&self, id: &str, title: &str, artist: &str, tracks: u32) -> Vec<TrackInfo> {
        let info = album_info(id, title, artist, tracks);
        let tracks: Vec<TrackInfo> = (1..=tracks)
            .map(|n| track(&format!("{id}-{n}"), &info, n))
            .collect();
        for t in &tracks {
            self.insert(UrlKind::Track, t.id.as_str(), CatalogEntity::Track(t.clone()));
            self.set_stream(t.id.as_str(), StreamBehavior {
                body: format!("fLaC data for {}", t.id).into_bytes(),
                ..Default::default()
            });
        }
        self.insert(UrlKind::Album, id, CatalogEntity::Album {
            album: info,
            tracks: tracks.clone(),
        });
        tracks
    }

    /// Replace an item's stream behavior
    pub fn set_stream(&self, id: &str, behavior: StreamBehavior) {
        self.streams.lock().unwrap().insert(ItemId::from(id), behavior);
    }

    /// Number of `get_streamable` calls for `id`
    pub fn stream_calls(&self, id: &str) -> usize {
        self.stream_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == id)
            .count()
    }

    /// Total `get_streamable` calls
    pub fn total_stream_calls(&self) -> usize {
        self.stream_calls.lock().unwrap().len()
    }

    /// Serve `bytes` as the cover of album `id`, at both sizes
    pub fn set_cover(&self, id: &str, bytes: &[u8]) {
        let mut assets = self.assets.lock().unwrap();
        assets.insert(cover_url(id), bytes.to_vec());
        assets.insert(cover_url(id).replace("_600.", "_org."), bytes.to_vec());
    }

    /// URLs passed to `get_asset`
    pub fn asset_calls(&self) -> Vec<String> {
        self.asset_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn resolve_url(&self, url: &CatalogUrl) -> Result<CatalogEntity, CatalogError> {
        self.entities
            .lock()
            .unwrap()
            .get(&(url.kind, url.id.clone()))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("{} {}", url.kind, url.id)))
    }

    async fn get_streamable(&self, id: &ItemId, quality: Quality) -> Result<Streamable, CatalogError> {
        self.stream_calls.lock().unwrap().push(id.clone());
        let behavior = {
            let mut streams = self.streams.lock().unwrap();
            let behavior = streams
                .get_mut(id)
                .ok_or_else(|| CatalogError::NotFound(format!("stream {id}")))?;
            if let Some(err) = behavior.failures.pop_front() {
                return Err(err);
            }
            behavior.clone()
        };

        let size_hint = Some(behavior.body.len() as u64);
        let stream = if behavior.stall {
            futures::stream::once(async move { Ok::<_, CatalogError>(behavior.body) })
                .chain(futures::stream::pending())
                .boxed()
        } else {
            let chunks: Vec<Result<Vec<u8>, CatalogError>> =
                behavior.body.chunks(8).map(|c| Ok(c.to_vec())).collect();
            futures::stream::iter(chunks).boxed()
        };
        Ok(Streamable {
            stream,
            quality,
            quality_restricted: false,
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
            .ok_or_else(|| CatalogError::NotFound(url.to_string()))?;
        Ok(futures::stream::iter(vec![Ok(bytes)]).boxed())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Tagger that records the files it was asked to tag
#[derive(Default)]
pub struct RecordingTagger {
    tagged: Mutex<Vec<PathBuf>>,
}

impl RecordingTagger {
    /// Files tagged so far
    pub fn tagged(&self) -> Vec<PathBuf> {
        self.tagged.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn apply(
        &self,
        path: &Path,
        _item: &ItemDescriptor,
        _quality: Quality,
        _embed_art: bool,
        _og_cover: bool,
    ) -> Result<(), TagError> {
        self.tagged.lock().unwrap().push(path.to_path_buf());
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

/// Streamable album released 1969-09-26 in hi-res
pub fn album_info(id: &str, title: &str, artist: &str, tracks: u32) -> AlbumInfo {
    AlbumInfo {
        id: id.into(),
        title: title.into(),
        version: None,
        artist: artist.into(),
        artist_id: None,
        label: Some("Apple".into()),
        release_date: NaiveDate::from_ymd_opt(1969, 9, 26),
        disc_count: 1,
        track_count: tracks,
        max_quality: Quality::HiRes,
        streamable: true,
        cover_url: Some(cover_url(id)),
    }
}

/// Track `number` of `album`
pub fn track(id: &str, album: &AlbumInfo, number: u32) -> TrackInfo {
    TrackInfo {
        id: ItemId::from(id),
        title: format!("Song {number}"),
        version: None,
        artist: album.artist.clone(),
        composer: None,
        featured_artists: Vec::new(),
        producers: Vec::new(),
        disc_number: 1,
        track_number: number,
        duration_secs: 200,
        explicit: false,
        album: album.clone(),
    }
}

/// 600px cover URL of album `id`
pub fn cover_url(id: &str) -> String {
    format!("https://static.qobuz.com/images/covers/{id}_600.jpg")
}

/// Album URL in the public web shape
pub fn album_url(id: &str) -> String {
    format!("https://www.qobuz.com/gb-en/album/any-title/{id}")
}

/// Artist URL in the public web shape
pub fn artist_url(id: &str) -> String {
    format!("https://www.qobuz.com/gb-en/interpreter/any-name/{id}")
}
