//! Catalog service boundary
//!
//! The remote catalog (authentication, metadata lookup, stream URL signing)
//! lives outside this crate. Everything the pipeline needs from it goes
//! through the [`CatalogService`] trait, which keeps resolution and the
//! scheduler testable without network access.

use crate::error::CatalogError;
use crate::types::{CatalogUrl, ItemId, Quality, UrlKind};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use futures::stream::BoxStream;

pub mod http;

/// Stream of raw file bytes
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, CatalogError>>;

/// Album metadata as reported by the catalog
#[derive(Clone, Debug, PartialEq)]
pub struct AlbumInfo {
    /// Album ID
    pub id: String,
    /// Album title
    pub title: String,
    /// Edition qualifier ("Deluxe Edition")
    pub version: Option<String>,
    /// Album artist name
    pub artist: String,
    /// Album artist ID
    pub artist_id: Option<String>,
    /// Record label
    pub label: Option<String>,
    /// Release date
    pub release_date: Option<NaiveDate>,
    /// Number of discs
    pub disc_count: u32,
    /// Number of tracks
    pub track_count: u32,
    /// Best tier offered
    pub max_quality: Quality,
    /// Whether the album can be streamed at all
    pub streamable: bool,
    /// Large (600px) cover image URL
    pub cover_url: Option<String>,
}

impl AlbumInfo {
    /// Release year
    pub fn year(&self) -> Option<i32> {
        self.release_date.map(|d| d.year())
    }
}

/// Track metadata as reported by the catalog
#[derive(Clone, Debug, PartialEq)]
pub struct TrackInfo {
    /// Track ID
    pub id: ItemId,
    /// Track title
    pub title: String,
    /// Version qualifier ("Live", "2011 Remaster")
    pub version: Option<String>,
    /// Performing artist
    pub artist: String,
    /// Composer
    pub composer: Option<String>,
    /// Artists credited as featured
    pub featured_artists: Vec<String>,
    /// Artists credited as producer
    pub producers: Vec<String>,
    /// Disc number
    pub disc_number: u32,
    /// Track number on its disc
    pub track_number: u32,
    /// Duration in seconds
    pub duration_secs: u32,
    /// Parental advisory
    pub explicit: bool,
    /// Album this track belongs to
    pub album: AlbumInfo,
}

/// An entity resolved from a catalog URL
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogEntity {
    /// A single track
    Track(TrackInfo),
    /// An album with its tracks
    Album {
        /// Album metadata
        album: AlbumInfo,
        /// Tracks in catalog order
        tracks: Vec<TrackInfo>,
    },
    /// A playlist
    Playlist {
        /// Playlist ID
        id: String,
        /// Playlist title
        name: String,
        /// Tracks in playlist order
        tracks: Vec<TrackInfo>,
    },
    /// An artist discography (album list only)
    Artist {
        /// Artist ID
        id: String,
        /// Artist name
        name: String,
        /// Albums credited to the artist
        albums: Vec<AlbumInfo>,
    },
    /// A label catalog (album list only)
    Label {
        /// Label ID
        id: String,
        /// Label name
        name: String,
        /// Albums released on the label
        albums: Vec<AlbumInfo>,
    },
}

impl CatalogEntity {
    /// Kind of this entity
    pub fn kind(&self) -> UrlKind {
        match self {
            CatalogEntity::Track(_) => UrlKind::Track,
            CatalogEntity::Album { .. } => UrlKind::Album,
            CatalogEntity::Playlist { .. } => UrlKind::Playlist,
            CatalogEntity::Artist { .. } => UrlKind::Artist,
            CatalogEntity::Label { .. } => UrlKind::Label,
        }
    }
}

/// Byte stream handle for one item
pub struct Streamable {
    /// File bytes
    pub stream: ByteStream,
    /// Tier actually delivered
    pub quality: Quality,
    /// The catalog could not deliver the requested tier
    pub quality_restricted: bool,
    /// Expected size, when known
    pub size_hint: Option<u64>,
}

impl std::fmt::Debug for Streamable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streamable")
            .field("quality", &self.quality)
            .field("quality_restricted", &self.quality_restricted)
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

/// Remote catalog and streaming client
///
/// Implementations report failures with the [`CatalogError`] taxonomy;
/// `RateLimited` and `Transient` are retried by the caller, `Unauthorized`
/// and `NotFound` are terminal.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetch metadata for the entity named by `url`
    ///
    /// Artist and label entities list albums only; the resolver fetches each
    /// album separately.
    async fn resolve_url(&self, url: &CatalogUrl) -> Result<CatalogEntity, CatalogError>;

    /// Open a byte stream for an item at the requested tier
    async fn get_streamable(&self, id: &ItemId, quality: Quality)
    -> Result<Streamable, CatalogError>;

    /// Open a byte stream for an album asset such as cover art
    ///
    /// Assets are public URLs; the default fetches them with a plain GET.
    async fn get_asset(&self, url: &str) -> Result<ByteStream, CatalogError> {
        let (stream, _) = http::open_stream(http::shared_client(), url).await?;
        Ok(stream)
    }

    /// Check that the catalog is reachable and the credentials work
    async fn ping(&self) -> Result<(), CatalogError> {
        Ok(())
    }

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "catalog"
    }
}
