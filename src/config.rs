//! Configuration types for qobuz-dl

use crate::error::{Error, Result};
use crate::template::Template;
use crate::types::Quality;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Catalog account and application credentials
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Application ID (9 digits)
    #[serde(default)]
    pub app_id: String,

    /// Application secrets, tried in order when signing stream requests
    #[serde(default)]
    pub secrets: Vec<String>,

    /// User auth token (alternative to email + password)
    #[serde(default)]
    pub token: Option<String>,

    /// Account email
    #[serde(default)]
    pub email: Option<String>,

    /// MD5 hash of the account password
    #[serde(default)]
    pub password: Option<String>,

    /// API base URL, checked for reachability by `diagnose` (default: "https://www.qobuz.com/api.json/0.2/")
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            secrets: Vec::new(),
            token: None,
            email: None,
            password: None,
            base_url: default_base_url(),
        }
    }
}

/// Download behavior configuration (output layout, concurrency, quality)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory rendered paths are relative to (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Output path template
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Requested quality tier (default: 2, CD quality)
    #[serde(default)]
    pub quality: Quality,

    /// Number of concurrent download workers (default: 8, range 1-32)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Resolve, filter and render paths without downloading anything
    #[serde(default)]
    pub dry_run: bool,

    /// What to do when the output file already exists (default: overwrite)
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Skip items whose requested quality is restricted instead of falling back
    #[serde(default)]
    pub no_fallback: bool,

    /// Write an M3U file after playlist downloads (default: true)
    #[serde(default = "default_true")]
    pub write_m3u: bool,

    /// Number of URLs resolved concurrently (default: 4)
    #[serde(default = "default_resolution_concurrency")]
    pub resolution_concurrency: usize,

    /// Check each written file's audio header before archiving it (default: true)
    #[serde(default = "default_true")]
    pub verify_integrity: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_template: default_output_template(),
            quality: Quality::default(),
            max_workers: default_max_workers(),
            dry_run: false,
            file_collision: FileCollisionAction::default(),
            no_fallback: false,
            write_m3u: true,
            resolution_concurrency: default_resolution_concurrency(),
            verify_integrity: true,
        }
    }
}

/// Tagging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaggingConfig {
    /// Run the tagger after writing each file (default: true)
    #[serde(default = "default_true", rename = "tagging_enabled")]
    pub enabled: bool,

    /// Embed cover art in the file
    #[serde(default)]
    pub embed_art: bool,

    /// Use original-size cover art
    #[serde(default)]
    pub og_cover: bool,

    /// Do not fetch cover art at all
    #[serde(default)]
    pub no_cover: bool,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embed_art: false,
            og_cover: false,
            no_cover: false,
        }
    }
}

/// Discography filtering configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Collapse duplicate editions in artist/label expansions
    #[serde(default)]
    pub smart_discography: bool,

    /// Drop singles and EPs from artist/label expansions
    #[serde(default)]
    pub albums_only: bool,

    /// Minimum track count for a group to count as an album (default: 5)
    #[serde(default = "default_min_album_tracks")]
    pub min_album_tracks: u32,

    /// Prefer non-remaster, non-bonus editions when otherwise tied (default: true)
    #[serde(default = "default_true")]
    pub skip_extras: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            smart_discography: false,
            albums_only: false,
            min_album_tracks: default_min_album_tracks(),
            skip_extras: true,
        }
    }
}

/// Archive and history storage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Archive database path (default: "download_archive.sqlite")
    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,

    /// Consult and update the archive (default: true)
    #[serde(default = "default_true")]
    pub use_archive: bool,

    /// Text archive of IDs from older versions, imported once on open
    #[serde(default)]
    pub legacy_archive_path: Option<PathBuf>,

    /// Append one JSON line per finished run to this file
    #[serde(default)]
    pub session_history_path: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            archive_path: default_archive_path(),
            use_archive: true,
            legacy_archive_path: None,
            session_history_path: None,
        }
    }
}

/// Retry configuration for transient catalog failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Backoff multiplier (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Overwrite the existing file (default)
    #[default]
    Overwrite,
    /// Skip the item, keep the existing file
    Skip,
    /// Append (1), (2), etc. to the filename
    Rename,
}

/// Disk space checking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpaceConfig {
    /// Enable disk space checking (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum free space required before a run (default: 1 GB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
        }
    }
}

/// Main configuration for qobuz-dl
///
/// Credentials, download, tagging and filter settings are flattened so the
/// JSON file stays a single flat object; persistence, retry and disk space
/// settings are nested under their own keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog credentials
    #[serde(flatten)]
    pub catalog: CatalogConfig,

    /// Output layout, quality and concurrency
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Tagger settings
    #[serde(flatten)]
    pub tagging: TaggingConfig,

    /// Discography filter settings
    #[serde(flatten)]
    pub filter: FilterConfig,

    /// Archive and history storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Disk space checks
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|e| Error::Config {
            message: format!("invalid config file {}: {e}", path.display()),
            key: None,
        })?;
        Ok(config)
    }

    /// Check every setting, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        match self.problems().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect every configuration problem
    pub fn problems(&self) -> Vec<Error> {
        let mut problems = Vec::new();

        if let Err(e) = validate_template(&self.download.output_template) {
            problems.push(e);
        }

        if !(1..=MAX_WORKERS).contains(&self.download.max_workers) {
            problems.push(Error::config(
                "max_workers",
                format!(
                    "max_workers must be between 1 and {MAX_WORKERS}, got {}",
                    self.download.max_workers
                ),
            ));
        }
        if self.download.resolution_concurrency == 0 {
            problems.push(Error::config(
                "resolution_concurrency",
                "resolution_concurrency must be at least 1",
            ));
        }
        if self.filter.min_album_tracks == 0 {
            problems.push(Error::config(
                "min_album_tracks",
                "min_album_tracks must be at least 1",
            ));
        }

        let has_token = self.catalog.token.as_deref().is_some_and(|t| !t.is_empty());
        let has_login = self.catalog.email.as_deref().is_some_and(|e| !e.is_empty())
            && self.catalog.password.as_deref().is_some_and(|p| !p.is_empty());
        if !has_token && !has_login {
            problems.push(Error::config(
                "token",
                "authentication required: set a token, or email and password",
            ));
        }
        if self.catalog.app_id.len() != 9 || !self.catalog.app_id.chars().all(|c| c.is_ascii_digit())
        {
            problems.push(Error::config("app_id", "app_id must be exactly 9 digits"));
        }
        if self.catalog.secrets.iter().all(|s| s.trim().is_empty()) {
            problems.push(Error::config("secrets", "at least one app secret is required"));
        }

        if self.tagging.no_cover && self.tagging.embed_art {
            problems.push(Error::config(
                "no_cover",
                "no_cover conflicts with embed_art",
            ));
        }
        if self.tagging.no_cover && self.tagging.og_cover {
            problems.push(Error::config("no_cover", "no_cover conflicts with og_cover"));
        }

        if self.retry.backoff_multiplier < 1.0 {
            problems.push(Error::config(
                "backoff_multiplier",
                "backoff_multiplier must be at least 1.0",
            ));
        }

        problems
    }
}

/// Upper bound for `max_workers`
pub const MAX_WORKERS: usize = 32;

/// Validate an output template's shape and syntax
pub fn validate_template(template: &str) -> Result<Template> {
    let key = "output_template";
    if template.trim().is_empty() {
        return Err(Error::config(key, "output template is empty"));
    }
    let as_path = Path::new(template);
    if as_path.is_absolute() || template.starts_with('/') || template.starts_with('\\') {
        return Err(Error::config(key, "output template must be a relative path"));
    }
    if as_path.components().any(|c| c == Component::ParentDir)
        || template.split(['/', '\\']).any(|seg| seg == "..")
    {
        return Err(Error::config(key, "output template must not contain '..'"));
    }
    if !["{tracknumber}", "{tracktitle}", "{track}"]
        .iter()
        .any(|p| template.contains(p))
    {
        return Err(Error::config(
            key,
            "output template must contain {tracknumber}, {tracktitle} or {track}",
        ));
    }
    Ok(Template::parse(template)?)
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://www.qobuz.com/api.json/0.2/".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Default output path template
pub fn default_output_template() -> String {
    "{albumartist}/{album} ({year})/%{?is_multidisc,Disc {media_number}/|}{tracknumber}. {tracktitle}.{ext}"
        .to_string()
}

fn default_max_workers() -> usize {
    8
}

fn default_resolution_concurrency() -> usize {
    4
}

fn default_min_album_tracks() -> u32 {
    5
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("download_archive.sqlite")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_min_free_space() -> u64 {
    1024 * 1024 * 1024 // 1 GB
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}
