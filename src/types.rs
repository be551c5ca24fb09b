//! Core types for qobuz-dl

use crate::error::Error;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable provider identity of a downloadable item
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for ItemId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ItemId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ItemId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Quality tier requested from the catalog
///
/// Tiers are ordinal: a higher tier is a better (larger) stream.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quality {
    /// MP3 320 kbps
    Mp3 = 1,
    /// CD quality, 16 bit / 44.1 kHz FLAC
    #[default]
    Lossless = 2,
    /// 24 bit / up to 96 kHz FLAC
    HiRes = 3,
    /// 24 bit / up to 192 kHz FLAC
    HiResMax = 4,
}

impl Quality {
    /// All tiers, lowest first
    pub const ALL: [Quality; 4] = [
        Quality::Mp3,
        Quality::Lossless,
        Quality::HiRes,
        Quality::HiResMax,
    ];

    /// Ordinal tier (1-4)
    pub fn tier(self) -> u8 {
        self as u8
    }

    /// Format identifier the catalog API expects
    pub fn api_code(self) -> u8 {
        match self {
            Quality::Mp3 => 5,
            Quality::Lossless => 6,
            Quality::HiRes => 7,
            Quality::HiResMax => 27,
        }
    }

    /// File extension of streams at this tier
    pub fn ext(self) -> &'static str {
        match self {
            Quality::Mp3 => "mp3",
            _ => "flac",
        }
    }

    /// Short label used in templates and reports
    pub fn short(self) -> &'static str {
        match self {
            Quality::Mp3 => "MP3 320",
            Quality::Lossless => "16-44.1",
            Quality::HiRes => "24-96",
            Quality::HiResMax => "24-192",
        }
    }

    /// Whether this tier is a high-resolution stream
    pub fn is_hires(self) -> bool {
        self >= Quality::HiRes
    }

    /// Parse either an ordinal tier (1-4) or an API format code (5, 6, 7, 27)
    pub fn from_tier_or_api(value: u8) -> Option<Self> {
        match value {
            1 | 5 => Some(Quality::Mp3),
            2 | 6 => Some(Quality::Lossless),
            3 | 7 => Some(Quality::HiRes),
            4 | 27 => Some(Quality::HiResMax),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Quality {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Quality::from_tier_or_api(value)
            .ok_or_else(|| format!("invalid quality {value}, expected 1-4 or 5/6/7/27"))
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> u8 {
        q.tier()
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short())
    }
}

/// Kind of catalog entity named by a URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    /// Single track
    Track,
    /// Album
    Album,
    /// Artist discography
    Artist,
    /// User or editorial playlist
    Playlist,
    /// Label catalog
    Label,
}

impl UrlKind {
    /// Parse the path segment used in catalog URLs
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "track" => Some(UrlKind::Track),
            "album" => Some(UrlKind::Album),
            "artist" | "interpreter" => Some(UrlKind::Artist),
            "playlist" => Some(UrlKind::Playlist),
            "label" => Some(UrlKind::Label),
            _ => None,
        }
    }

    /// Whether this kind expands to a set of albums
    pub fn is_collection_of_albums(self) -> bool {
        matches!(self, UrlKind::Artist | UrlKind::Label)
    }
}

impl std::fmt::Display for UrlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UrlKind::Track => "track",
            UrlKind::Album => "album",
            UrlKind::Artist => "artist",
            UrlKind::Playlist => "playlist",
            UrlKind::Label => "label",
        };
        f.write_str(s)
    }
}

/// A parsed catalog URL
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogUrl {
    /// Entity kind
    pub kind: UrlKind,
    /// Entity ID as it appears in the URL
    pub id: String,
    /// The original input string
    pub raw: String,
}

/// The artist, label or playlist an item was expanded from
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collection {
    /// Kind of the expanding entity
    pub kind: UrlKind,
    /// Entity ID
    pub id: String,
    /// Display name (artist name, label name, playlist title)
    pub name: String,
}

/// One downloadable track
///
/// Produced by the resolver and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Stable provider identity
    pub id: ItemId,
    /// Album identity (grouping key)
    pub album_id: String,
    /// Artist/label/playlist expansion this item came from
    pub collection: Option<Collection>,
    /// Track title
    pub title: String,
    /// Track version ("Remastered 2011", "Live")
    pub version: Option<String>,
    /// Performing artist
    pub artist: String,
    /// Album artist
    pub album_artist: String,
    /// Album title
    pub album_title: String,
    /// Album version ("Deluxe Edition")
    pub album_version: Option<String>,
    /// Record label
    pub label: Option<String>,
    /// Composer
    pub composer: Option<String>,
    /// Featured artists, from the catalog credits and the track title
    #[serde(default)]
    pub featured_artists: Vec<String>,
    /// Producers
    #[serde(default)]
    pub producers: Vec<String>,
    /// Disc number (1-based)
    pub disc_number: u32,
    /// Track number on its disc (1-based)
    pub track_number: u32,
    /// Number of discs on the album
    pub disc_count: u32,
    /// Number of tracks on the album
    pub album_track_count: u32,
    /// Release year
    pub year: Option<i32>,
    /// Full release date
    pub release_date: Option<NaiveDate>,
    /// Best tier the album offers
    pub max_quality: Quality,
    /// Effective tier for this item: min(requested, max_quality)
    pub quality: Quality,
    /// Track duration in seconds
    pub duration_secs: u32,
    /// Parental advisory flag
    pub explicit: bool,
    /// Album cover image URL
    pub cover_url: Option<String>,
    /// Position of the input URL this item was resolved from
    pub source_url_index: usize,
}

impl ItemDescriptor {
    /// Whether the album spans more than one disc
    pub fn is_multidisc(&self) -> bool {
        self.disc_count > 1
    }

    /// File extension for the effective quality tier
    pub fn ext(&self) -> &'static str {
        self.quality.ext()
    }

    /// Title with the version appended when the title does not already carry it
    pub fn display_title(&self) -> String {
        with_version(&self.title, self.version.as_deref())
    }

    /// Album title with its version appended when not already present
    pub fn display_album(&self) -> String {
        with_version(&self.album_title, self.album_version.as_deref())
    }

    /// Performing artist followed by any featured artists
    pub fn artist_featuring(&self) -> String {
        if self.featured_artists.is_empty() {
            return self.artist.clone();
        }
        format!("{} (feat. {})", self.artist, self.featured_artists.join(", "))
    }
}

fn with_version(title: &str, version: Option<&str>) -> String {
    match version.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) if !title.to_lowercase().contains(&v.to_lowercase()) => format!("{title} ({v})"),
        _ => title.to_string(),
    }
}

/// Tracks sharing an album identity, used only by the smart filter
#[derive(Clone, Debug, PartialEq)]
pub struct AlbumGroup {
    /// Album identity
    pub album_id: String,
    /// Album title
    pub title: String,
    /// Album version
    pub version: Option<String>,
    /// Album artist
    pub artist: String,
    /// Best tier the album offers
    pub max_quality: Quality,
    /// Release year
    pub year: Option<i32>,
    /// Member tracks, in resolver order
    pub items: Vec<ItemDescriptor>,
}

impl AlbumGroup {
    /// Number of tracks on the album
    ///
    /// Uses the catalog's album track count when known, falling back to the
    /// number of resolved items.
    pub fn track_count(&self) -> u32 {
        self.items
            .first()
            .map(|i| i.album_track_count)
            .filter(|n| *n > 0)
            .unwrap_or(self.items.len() as u32)
    }
}

/// Runtime unit handed to the scheduler
#[derive(Clone, Debug)]
pub struct DownloadTask {
    /// Position in the submitted item list (reporting order)
    pub index: usize,
    /// The item to fetch
    pub item: ItemDescriptor,
    /// Resolved output path
    pub path: PathBuf,
    /// Retries performed so far
    pub retries: u32,
}

/// Per-task lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for a worker
    Pending,
    /// Claimed by a worker
    InFlight,
    /// Written, tagged and archived
    Succeeded,
    /// Terminal failure
    Failed,
    /// Not attempted
    Skipped,
}

/// Why a task was skipped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Archive already has the identity
    Archived,
    /// Same identity appeared earlier in this run
    Duplicate,
    /// Output file exists and collision action is skip
    AlreadyExists,
    /// Requested quality restricted and fallback disabled
    QualityUnavailable,
}

/// Closed classification of task failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Catalog refused access
    Unauthorized,
    /// Item unavailable
    NotFound,
    /// Rate limiting persisted past the retry budget
    RateLimited,
    /// Transient network failures persisted past the retry budget
    Transient,
    /// Tagger failed (file left in place)
    Tag,
    /// Writing the output file failed
    Write,
    /// The written file failed its header check
    Integrity,
    /// Two items rendered to the same path
    PathCollision,
    /// Archive write failed
    Archive,
    /// Task aborted by run cancellation
    Cancelled,
    /// Anything else
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::NotFound => "not_found",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Transient => "transient",
            FailureKind::Tag => "tag",
            FailureKind::Write => "write",
            FailureKind::Integrity => "integrity",
            FailureKind::PathCollision => "path_collision",
            FailureKind::Archive => "archive",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of one task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// File written (or would have been, when simulated)
    Succeeded {
        /// Bytes written
        bytes: u64,
        /// Dry-run success
        simulated: bool,
    },
    /// Not attempted
    Skipped {
        /// Why
        reason: SkipReason,
    },
    /// Terminal failure
    Failed {
        /// Failure classification
        kind: FailureKind,
        /// Human-readable message
        message: String,
    },
}

impl TaskOutcome {
    /// Build a failure outcome from an error
    pub fn from_error(err: &Error) -> Self {
        TaskOutcome::Failed {
            kind: err.failure_kind(),
            message: err.to_string(),
        }
    }

    /// The terminal state this outcome corresponds to
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Succeeded { .. } => TaskState::Succeeded,
            TaskOutcome::Skipped { .. } => TaskState::Skipped,
            TaskOutcome::Failed { .. } => TaskState::Failed,
        }
    }
}

/// Report for one task that reached a terminal state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Position in the submitted item list
    pub index: usize,
    /// Item identity
    pub id: ItemId,
    /// Output path
    pub path: PathBuf,
    /// Terminal outcome
    pub outcome: TaskOutcome,
    /// Retries performed
    pub retries: u32,
}

/// A URL that failed to resolve
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlFailure {
    /// Position of the URL in the input list
    pub index: usize,
    /// The URL
    pub url: String,
    /// Machine-readable error code
    pub code: String,
    /// Error message
    pub message: String,
}

/// Overall status of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task succeeded or was skipped and every URL resolved
    Complete,
    /// Some tasks or URLs failed
    Partial,
    /// The run was cancelled
    Cancelled,
}

/// Aggregate result of one run; not persisted
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items handed to the scheduler
    pub resolved: u64,
    /// Identities repeated within the run
    pub skipped_duplicate: u64,
    /// Identities already in the archive
    pub skipped_archived: u64,
    /// Output file existed and collision action was skip
    pub skipped_existing: u64,
    /// Quality unavailable with fallback disabled
    pub skipped_quality: u64,
    /// Tasks that succeeded (including simulated successes)
    pub succeeded: u64,
    /// Tasks that failed
    pub failed: u64,
    /// Bytes written to disk
    pub bytes_downloaded: u64,
    /// This was a dry run
    pub dry_run: bool,
    /// The run was cancelled before every task finished
    pub cancelled: bool,
    /// Per-task reports, ordered by input position
    pub outcomes: Vec<TaskReport>,
    /// URLs that failed to resolve
    pub resolution_failures: Vec<UrlFailure>,
}

impl RunSummary {
    /// Overall status
    pub fn status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Cancelled
        } else if self.failed > 0 || !self.resolution_failures.is_empty() {
            RunStatus::Partial
        } else {
            RunStatus::Complete
        }
    }

    /// Total skipped tasks across all reasons
    pub fn skipped(&self) -> u64 {
        self.skipped_duplicate + self.skipped_archived + self.skipped_existing + self.skipped_quality
    }

    /// Iterate failed task reports
    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Failed { .. }))
    }

    /// Fold a terminal task report into the counters
    pub fn record(&mut self, report: TaskReport) {
        match &report.outcome {
            TaskOutcome::Succeeded { bytes, simulated } => {
                self.succeeded += 1;
                if !simulated {
                    self.bytes_downloaded += bytes;
                }
            }
            TaskOutcome::Skipped { reason } => match reason {
                SkipReason::Archived => self.skipped_archived += 1,
                SkipReason::Duplicate => self.skipped_duplicate += 1,
                SkipReason::AlreadyExists => self.skipped_existing += 1,
                SkipReason::QualityUnavailable => self.skipped_quality += 1,
            },
            TaskOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(report);
    }
}

/// Event emitted during a run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A URL resolved into items
    UrlResolved {
        /// The URL
        url: String,
        /// Number of items produced
        items: usize,
    },

    /// A URL failed to resolve
    UrlFailed {
        /// The URL
        url: String,
        /// Error message
        error: String,
    },

    /// A worker claimed a task
    TaskStarted {
        /// Item identity
        id: ItemId,
        /// Output path
        path: PathBuf,
    },

    /// A task attempt failed and will be retried
    TaskRetrying {
        /// Item identity
        id: ItemId,
        /// Retry number (1-based)
        attempt: u32,
        /// Error that triggered the retry
        error: String,
    },

    /// A task completed
    TaskSucceeded {
        /// Item identity
        id: ItemId,
        /// Output path
        path: PathBuf,
        /// Bytes written
        bytes: u64,
        /// Dry-run success
        simulated: bool,
    },

    /// A task was skipped
    TaskSkipped {
        /// Item identity
        id: ItemId,
        /// Why
        reason: SkipReason,
    },

    /// A task failed terminally
    TaskFailed {
        /// Item identity
        id: ItemId,
        /// Failure classification
        kind: FailureKind,
        /// Error message
        error: String,
    },

    /// The run was cancelled
    RunCancelled,

    /// The run finished
    RunComplete {
        /// Successful tasks
        succeeded: u64,
        /// Failed tasks
        failed: u64,
        /// Skipped tasks
        skipped: u64,
    },
}
