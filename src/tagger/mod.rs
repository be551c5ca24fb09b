//! Tagger boundary
//!
//! Writing tags and cover art into audio files is done by an external
//! collaborator. The scheduler calls it after the file is in place; a tagging
//! failure fails the task but leaves the untagged file on disk.

use crate::error::TagError;
use crate::types::{ItemDescriptor, Quality};
use async_trait::async_trait;
use std::path::Path;

/// Capabilities of a tagger implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggerCapabilities {
    /// Can write text tags
    pub can_tag: bool,
    /// Can embed cover art
    pub can_embed_art: bool,
}

/// Trait for tagging written audio files
///
/// # Examples
///
/// ```
/// use qobuz_dl::tagger::{NoOpTagger, Tagger};
///
/// let tagger = NoOpTagger;
/// assert!(!tagger.capabilities().can_tag);
/// assert_eq!(tagger.name(), "noop");
/// ```
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Write metadata into the file at `path`
    async fn apply(
        &self,
        path: &Path,
        item: &ItemDescriptor,
        quality: Quality,
        embed_art: bool,
        og_cover: bool,
    ) -> Result<(), TagError>;

    /// Query capabilities of this tagger
    fn capabilities(&self) -> TaggerCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Tagger that leaves files untouched
///
/// Used when no tagging backend is configured so that downloads still
/// complete with bare files.
pub struct NoOpTagger;

#[async_trait]
impl Tagger for NoOpTagger {
    async fn apply(
        &self,
        path: &Path,
        item: &ItemDescriptor,
        _quality: Quality,
        _embed_art: bool,
        _og_cover: bool,
    ) -> Result<(), TagError> {
        tracing::trace!(item_id = %item.id, path = %path.display(), "No tagger configured, skipping tags");
        Ok(())
    }

    fn capabilities(&self) -> TaggerCapabilities {
        TaggerCapabilities {
            can_tag: false,
            can_embed_art: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
