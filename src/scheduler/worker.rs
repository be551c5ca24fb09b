//! Single-task lifecycle: collision check, cover art, fetch to a part file,
//! rename, tag, header check, archive.

use super::{SchedulerContext, report};
use crate::archive::ArchiveRecord;
use crate::error::{CatalogError, Error, Result};
use crate::media::{COVER_FILE, cover_url, save_asset, verify_audio};
use crate::retry::{RetryOutcome, retry_cancellable};
use crate::types::{DownloadTask, Event, ItemDescriptor, Quality, SkipReason, TaskOutcome, TaskReport};
use crate::utils::{CollisionResolution, part_path, resolve_collision};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Result of one successful fetch attempt
enum Fetched {
    /// Bytes are durably in the part file
    Written {
        bytes: u64,
        checksum: String,
        quality: Quality,
    },
    /// The requested tier is restricted and fallback is disabled
    QualityUnavailable,
}

/// Run one task to a terminal state
///
/// Returns `None` when cancellation interrupted the task before it finished.
pub(super) async fn process(ctx: &SchedulerContext, mut task: DownloadTask) -> Option<TaskReport> {
    let id = task.item.id.clone();
    ctx.emit(Event::TaskStarted {
        id: id.clone(),
        path: task.path.clone(),
    });

    let dest = match resolve_collision(&task.path, ctx.settings.file_collision) {
        Ok(CollisionResolution::Write(dest)) => dest,
        Ok(CollisionResolution::KeepExisting) => {
            tracing::info!(item_id = %id, path = %task.path.display(), "File exists, skipping");
            return Some(report(&task, TaskOutcome::Skipped {
                reason: SkipReason::AlreadyExists,
            }));
        }
        Err(e) => return Some(failed(&task, &e)),
    };
    task.path = dest.clone();

    if ctx.settings.dry_run {
        tracing::debug!(item_id = %id, path = %dest.display(), "Dry run, not downloading");
        return Some(report(&task, TaskOutcome::Succeeded {
            bytes: 0,
            simulated: true,
        }));
    }

    if let Some(parent) = dest.parent() {
        if let Err(e) = create_parent(parent).await {
            return Some(failed(&task, &e));
        }
        // before the fetch, so the tagger finds it when embedding art
        save_cover(ctx, &task.item, parent).await;
    }

    let part = part_path(&dest, &id);
    let outcome = retry_cancellable(
        &ctx.settings.retry,
        &ctx.cancel,
        |_| fetch_to_part(ctx, &task, &part),
        |attempt, err| {
            ctx.emit(Event::TaskRetrying {
                id: id.clone(),
                attempt,
                error: err.to_string(),
            })
        },
    )
    .await;

    let (fetched, retries) = match outcome {
        RetryOutcome::Succeeded { value, retries } => (value, retries),
        RetryOutcome::Failed { error, retries } => {
            remove_part(&part).await;
            task.retries = retries;
            return Some(failed(&task, &error));
        }
        RetryOutcome::Cancelled { retries } => {
            remove_part(&part).await;
            tracing::info!(item_id = %id, retries, "Task interrupted by cancellation");
            return None;
        }
    };
    task.retries = retries;

    let (bytes, checksum, quality) = match fetched {
        Fetched::Written {
            bytes,
            checksum,
            quality,
        } => (bytes, checksum, quality),
        Fetched::QualityUnavailable => {
            tracing::warn!(
                item_id = %id,
                requested = %task.item.quality,
                "Requested quality unavailable and fallback disabled, skipping"
            );
            return Some(report(&task, TaskOutcome::Skipped {
                reason: SkipReason::QualityUnavailable,
            }));
        }
    };

    let dest = if quality == task.item.quality {
        dest
    } else {
        match retarget(ctx, &mut task, quality).await {
            Ok(Some(dest)) => dest,
            Ok(None) => {
                remove_part(&part).await;
                tracing::info!(item_id = %id, path = %task.path.display(), "File exists, skipping");
                return Some(report(&task, TaskOutcome::Skipped {
                    reason: SkipReason::AlreadyExists,
                }));
            }
            Err(e) => {
                remove_part(&part).await;
                return Some(failed(&task, &e));
            }
        }
    };

    if let Err(source) = tokio::fs::rename(&part, &dest).await {
        remove_part(&part).await;
        let err = Error::Write {
            path: dest.clone(),
            source,
        };
        return Some(failed(&task, &err));
    }

    if ctx.settings.tagging {
        if let Err(e) = ctx
            .tagger
            .apply(
                &dest,
                &task.item,
                quality,
                ctx.settings.embed_art,
                ctx.settings.og_cover,
            )
            .await
        {
            // the untagged file stays for the operator to inspect
            return Some(failed(&task, &Error::Tag(e)));
        }
    }

    if ctx.settings.verify_integrity {
        if let Err(e) = verify_audio(&dest, quality).await {
            if let Err(remove) = tokio::fs::remove_file(&dest).await {
                tracing::warn!(path = %dest.display(), error = %remove, "Failed to remove corrupt file");
            }
            return Some(failed(&task, &e));
        }
    }

    if let Some(archive) = &ctx.archive {
        let record = ArchiveRecord::completed(&task.item, &dest, bytes, Some(checksum));
        if let Err(e) = archive.record(&record).await {
            return Some(failed(&task, &e));
        }
    }

    tracing::info!(
        item_id = %id,
        path = %dest.display(),
        bytes,
        retries,
        "Download complete"
    );
    Some(report(&task, TaskOutcome::Succeeded {
        bytes,
        simulated: false,
    }))
}

/// One attempt: open the stream and copy it into the part file
async fn fetch_to_part(ctx: &SchedulerContext, task: &DownloadTask, part: &Path) -> Result<Fetched> {
    let item = &task.item;
    let mut streamable = ctx.catalog.get_streamable(&item.id, item.quality).await?;

    if streamable.quality_restricted {
        if ctx.settings.no_fallback {
            return Ok(Fetched::QualityUnavailable);
        }
        tracing::warn!(
            item_id = %item.id,
            requested = %item.quality,
            delivered = %streamable.quality,
            "Requested quality restricted, falling back"
        );
    }

    let write_err = |source| Error::Write {
        path: part.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(part).await.map_err(write_err)?;
    let mut hasher = Sha256::new();
    let mut bytes = 0u64;

    while let Some(chunk) = streamable.stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        file.write_all(&chunk).await.map_err(write_err)?;
        bytes += chunk.len() as u64;
    }
    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;

    if let Some(expected) = streamable.size_hint {
        if expected != bytes {
            return Err(Error::Catalog(CatalogError::Transient(format!(
                "stream ended after {bytes} of {expected} bytes"
            ))));
        }
    }

    Ok(Fetched::Written {
        bytes,
        checksum: format!("{:x}", hasher.finalize()),
        quality: streamable.quality,
    })
}

/// Point a task at the path its delivered tier renders to
///
/// Returns `None` when that path already exists and the collision policy
/// keeps the existing file.
async fn retarget(ctx: &SchedulerContext, task: &mut DownloadTask, delivered: Quality) -> Result<Option<PathBuf>> {
    task.item.quality = delivered;
    let rendered = match &ctx.settings.layout {
        Some(layout) => layout.template.render_path(&layout.root, &task.item),
        None => task.path.with_extension(delivered.ext()),
    };
    if rendered == task.path {
        return Ok(Some(rendered));
    }

    tracing::info!(
        item_id = %task.item.id,
        from = %task.path.display(),
        to = %rendered.display(),
        "Delivered tier changes the output path"
    );
    task.path = rendered.clone();
    let dest = match resolve_collision(&rendered, ctx.settings.file_collision)? {
        CollisionResolution::Write(dest) => dest,
        CollisionResolution::KeepExisting => return Ok(None),
    };
    if let Some(parent) = dest.parent() {
        create_parent(parent).await?;
    }
    task.path = dest.clone();
    Ok(Some(dest))
}

/// Save the album cover into `dir` unless a copy is already there
///
/// Tasks of one album share a lock, so concurrent workers fetch the cover
/// once. Failures are logged and never fail the task.
async fn save_cover(ctx: &SchedulerContext, item: &ItemDescriptor, dir: &Path) {
    if !ctx.settings.save_cover {
        return;
    }
    let Some(url) = item.cover_url.as_deref() else {
        return;
    };
    let dest = dir.join(COVER_FILE);
    if exists(&dest).await {
        return;
    }

    let lock = ctx.cover_lock(&item.album_id).await;
    let _guard = lock.lock().await;
    if exists(&dest).await {
        return;
    }

    let url = cover_url(url, ctx.settings.og_cover);
    match save_asset(ctx.catalog.as_ref(), &url, &dest).await {
        Ok(bytes) => {
            tracing::debug!(album_id = %item.album_id, path = %dest.display(), bytes, "Saved cover art")
        }
        Err(e) => {
            tracing::debug!(album_id = %item.album_id, url = %url, error = %e, "Could not save cover art")
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn create_parent(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|source| Error::Write {
        path: dir.to_path_buf(),
        source,
    })
}

async fn remove_part(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => tracing::debug!(path = %part.display(), "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %part.display(), error = %e, "Failed to remove partial file"),
    }
}

fn failed(task: &DownloadTask, err: &Error) -> TaskReport {
    tracing::error!(
        item_id = %task.item.id,
        path = %task.path.display(),
        kind = %err.failure_kind(),
        error = %err,
        "Task failed"
    );
    report(task, TaskOutcome::from_error(err))
}
