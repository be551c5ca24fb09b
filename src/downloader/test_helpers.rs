//! Shared test helpers for creating Downloader instances in tests.

use crate::config::{Config, RetryConfig};
use crate::downloader::Downloader;
use crate::test_helpers::{MockCatalog, RecordingTagger};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Config rooted in `dir` with fast retries and no disk-space floor
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.download.output_dir = dir.join("music");
    config.download.max_workers = 3;
    config.persistence.archive_path = dir.join("state/archive.sqlite");
    config.disk_space.enabled = false;
    config.catalog.base_url = String::new();
    config.catalog.app_id = "123456789".into();
    config.catalog.secrets = vec!["secret".into()];
    config.catalog.token = Some("token".into());
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Helper to create a test Downloader over a mock catalog and recording tagger.
/// Returns the downloader, its collaborators and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader_with(
    configure: impl FnOnce(&mut Config),
) -> (Downloader, Arc<MockCatalog>, Arc<RecordingTagger>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let catalog = Arc::new(MockCatalog::new());
    let tagger = Arc::new(RecordingTagger::default());
    let downloader = Downloader::new(config, catalog.clone(), tagger.clone());
    (downloader, catalog, tagger, temp_dir)
}

/// [`create_test_downloader_with`] using the default test config
pub(crate) fn create_test_downloader() -> (Downloader, Arc<MockCatalog>, Arc<RecordingTagger>, tempfile::TempDir) {
    create_test_downloader_with(|_| {})
}
