//! Test configuration helpers and downloader construction

use super::fixtures::{FakeCatalog, RecordingTagger};
use qobuz_dl::config::RetryConfig;
use qobuz_dl::{Config, Downloader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Configuration rooted in `root`: output under `music/`, archive under `state/`
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.output_dir = root.join("music");
    config.download.max_workers = 4;
    config.persistence.archive_path = root.join("state/archive.sqlite");
    config.disk_space.enabled = false;
    config.catalog.app_id = "950096963".into();
    config.catalog.secrets = vec!["abc".into()];
    config.catalog.token = Some("user-token".into());
    config.catalog.base_url = String::new();
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// A test environment: downloader, its collaborators and the temp dir they live in
pub struct TestEnv {
    /// Downloader under test
    pub downloader: Downloader,
    /// In-memory catalog
    pub catalog: Arc<FakeCatalog>,
    /// Tagger recording every call
    pub tagger: Arc<RecordingTagger>,
    /// Root of output, archive and history (must be kept alive)
    pub dir: TempDir,
}

impl TestEnv {
    /// Environment with the default test config
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Environment with a tweaked test config
    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(FakeCatalog::default());
        Self::sharing(dir, catalog, configure)
    }

    /// Environment over an existing dir and catalog
    pub fn sharing(dir: TempDir, catalog: Arc<FakeCatalog>, configure: impl FnOnce(&mut Config)) -> Self {
        let mut config = test_config(dir.path());
        configure(&mut config);
        let tagger = Arc::new(RecordingTagger::default());
        let downloader = Downloader::new(config, catalog.clone(), tagger.clone());
        Self {
            downloader,
            catalog,
            tagger,
            dir,
        }
    }

    /// Output directory
    pub fn music(&self) -> std::path::PathBuf {
        self.dir.path().join("music")
    }
}
