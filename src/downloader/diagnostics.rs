//! Configuration validation and environment checks.

use crate::catalog::http::check_reachable;
use crate::config::validate_template;
use crate::error::Result;
use crate::utils::{existing_ancestor, get_available_space};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Downloader;

/// Timeout for the catalog reachability check
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one diagnostic check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCheck {
    /// Check name
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// What was found
    pub detail: String,
}

impl DiagnosticCheck {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Result of [`Downloader::diagnose`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// Checks in the order they ran
    pub checks: Vec<DiagnosticCheck>,
}

impl DiagnosticReport {
    /// Whether every check passed
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Look up a check by name
    pub fn check(&self, name: &str) -> Option<&DiagnosticCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Failed checks
    pub fn failures(&self) -> impl Iterator<Item = &DiagnosticCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

impl Downloader {
    /// Validate the configuration, returning the first problem found
    pub fn validate_config(&self) -> Result<()> {
        self.config.validate()
    }

    /// Run every environment check and report each one
    ///
    /// Never fails; problems are reported as failed checks.
    pub async fn diagnose(&self) -> DiagnosticReport {
        let checks = vec![
            self.check_configuration(),
            self.check_template(),
            self.check_output_dir().await,
            self.check_disk_space(),
            self.check_archive().await,
            self.check_catalog().await,
            self.check_catalog_endpoint().await,
            self.check_tagger(),
        ];

        let report = DiagnosticReport { checks };
        for check in report.failures() {
            tracing::warn!(check = %check.name, detail = %check.detail, "Diagnostic check failed");
        }
        tracing::info!(passed = report.passed(), checks = report.checks.len(), "Diagnostics finished");
        report
    }

    fn check_configuration(&self) -> DiagnosticCheck {
        let problems = self.config.problems();
        if problems.is_empty() {
            DiagnosticCheck::pass("configuration", "ok")
        } else {
            let detail = problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            DiagnosticCheck::fail("configuration", detail)
        }
    }

    fn check_template(&self) -> DiagnosticCheck {
        match validate_template(&self.config.download.output_template) {
            Ok(template) => {
                let unknown = template.unknown_placeholders();
                if unknown.is_empty() {
                    DiagnosticCheck::pass("output_template", "ok")
                } else {
                    DiagnosticCheck::pass(
                        "output_template",
                        format!("ok; unknown placeholders render empty: {}", unknown.join(", ")),
                    )
                }
            }
            Err(e) => DiagnosticCheck::fail("output_template", e.to_string()),
        }
    }

    async fn check_output_dir(&self) -> DiagnosticCheck {
        let dir = &self.config.download.output_dir;
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            return DiagnosticCheck::fail("output_directory", format!("{}: {e}", dir.display()));
        }
        let test_file = dir.join(".qobuz-dl-write-test");
        match tokio::fs::write(&test_file, b"").await {
            Ok(()) => {
                tokio::fs::remove_file(&test_file).await.ok();
                DiagnosticCheck::pass("output_directory", format!("{} is writable", dir.display()))
            }
            Err(e) => DiagnosticCheck::fail("output_directory", format!("{}: {e}", dir.display())),
        }
    }

    fn check_disk_space(&self) -> DiagnosticCheck {
        let settings = &self.config.disk_space;
        if !settings.enabled {
            return DiagnosticCheck::pass("disk_space", "disabled");
        }
        let dir = existing_ancestor(&self.config.download.output_dir);
        match get_available_space(&dir) {
            Ok(available) if available >= settings.min_free_space => DiagnosticCheck::pass(
                "disk_space",
                format!("{available} bytes available"),
            ),
            Ok(available) => DiagnosticCheck::fail(
                "disk_space",
                format!(
                    "{available} bytes available, {} required",
                    settings.min_free_space
                ),
            ),
            Err(e) => DiagnosticCheck::fail("disk_space", format!("{}: {e}", dir.display())),
        }
    }

    async fn check_archive(&self) -> DiagnosticCheck {
        if !self.config.persistence.use_archive {
            return DiagnosticCheck::pass("archive", "disabled");
        }
        let archive = match self.archive().await {
            Ok(archive) => archive,
            Err(e) => return DiagnosticCheck::fail("archive", e.to_string()),
        };
        if let Err(e) = archive.check_integrity().await {
            return DiagnosticCheck::fail("archive", e.to_string());
        }
        match archive.count().await {
            Ok(records) => DiagnosticCheck::pass(
                "archive",
                format!("{} ({records} records)", archive.path().display()),
            ),
            Err(e) => DiagnosticCheck::fail("archive", e.to_string()),
        }
    }

    async fn check_catalog(&self) -> DiagnosticCheck {
        match self.catalog.ping().await {
            Ok(()) => DiagnosticCheck::pass("catalog", format!("{} reachable", self.catalog.name())),
            Err(e) => DiagnosticCheck::fail("catalog", e.to_string()),
        }
    }

    async fn check_catalog_endpoint(&self) -> DiagnosticCheck {
        let url = &self.config.catalog.base_url;
        if url.is_empty() {
            return DiagnosticCheck::pass("catalog_endpoint", "not configured");
        }
        let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => return DiagnosticCheck::fail("catalog_endpoint", e.to_string()),
        };
        match check_reachable(&client, url).await {
            Ok(status) => DiagnosticCheck::pass("catalog_endpoint", format!("{url} answered {status}")),
            Err(e) => DiagnosticCheck::fail("catalog_endpoint", format!("{url}: {e}")),
        }
    }

    fn check_tagger(&self) -> DiagnosticCheck {
        let tagging = &self.config.tagging;
        let caps = self.tagger.capabilities();
        let detail = format!(
            "{} (tags: {}, cover art: {})",
            self.tagger.name(),
            caps.can_tag,
            caps.can_embed_art
        );
        if !tagging.enabled {
            return DiagnosticCheck::pass("tagger", format!("tagging disabled; {detail}"));
        }
        let wants_art = tagging.embed_art && !tagging.no_cover;
        if !caps.can_tag || (wants_art && !caps.can_embed_art) {
            DiagnosticCheck::fail("tagger", format!("configured tagging not supported by {detail}"))
        } else {
            DiagnosticCheck::pass("tagger", detail)
        }
    }
}
