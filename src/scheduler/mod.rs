//! Download Scheduler
//!
//! A fixed pool of workers pulls [`DownloadTask`]s from a shared queue. Each
//! worker runs one task's whole lifecycle (fetch, write, tag, archive) before
//! taking the next. Terminal reports flow through a channel to a single
//! aggregator that builds the [`RunSummary`].
//!
//! Before any worker starts, the queue is checked for:
//! - identities appearing more than once (`Skipped(Duplicate)`)
//! - two tasks rendering to one path (`Failed(path_collision)`)
//! - identities already in the archive (`Skipped(Archived)`)
//!
//! Cancellation stops workers from claiming new tasks. A task interrupted
//! mid-transfer removes its partial file and is not reported.
//!
//! When the catalog delivers a different tier than the task asked for, the
//! output path is rendered again from the delivered tier so the extension
//! always matches the file's format.

use crate::archive::Archive;
use crate::catalog::CatalogService;
use crate::config::{Config, FileCollisionAction, MAX_WORKERS, RetryConfig};
use crate::error::{Error, Result};
use crate::tagger::Tagger;
use crate::template::Template;
use crate::types::{DownloadTask, Event, ItemId, RunSummary, SkipReason, TaskOutcome, TaskReport};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

mod worker;

/// Per-run scheduler settings
#[derive(Clone, Debug)]
pub struct SchedulerSettings {
    /// Stop after path resolution
    pub dry_run: bool,
    /// Existing file policy
    pub file_collision: FileCollisionAction,
    /// Skip instead of accepting a lower tier
    pub no_fallback: bool,
    /// Run the tagger
    pub tagging: bool,
    /// Ask the tagger to embed cover art
    pub embed_art: bool,
    /// Ask the tagger for original-size cover art, and save that size
    pub og_cover: bool,
    /// Save the album cover next to its tracks
    pub save_cover: bool,
    /// Check audio headers before archiving
    pub verify_integrity: bool,
    /// Per-task retry policy
    pub retry: RetryConfig,
    /// Template and root the task paths were rendered from
    pub layout: Option<OutputLayout>,
}

/// How task paths are rendered, kept for re-rendering after a tier change
///
/// Without a layout the worker only swaps the file extension.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    /// Parsed output template
    pub template: Template,
    /// Output root directory
    pub root: PathBuf,
}

impl SchedulerSettings {
    /// Settings taken from a [`Config`]
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: config.download.dry_run,
            file_collision: config.download.file_collision,
            no_fallback: config.download.no_fallback,
            tagging: config.tagging.enabled,
            embed_art: config.tagging.embed_art && !config.tagging.no_cover,
            og_cover: config.tagging.og_cover && !config.tagging.no_cover,
            save_cover: !config.tagging.no_cover,
            verify_integrity: config.download.verify_integrity,
            retry: config.retry.clone(),
            layout: None,
        }
    }
}

/// Shared state handed to every worker
pub(crate) struct SchedulerContext {
    pub(crate) catalog: Arc<dyn CatalogService>,
    pub(crate) tagger: Arc<dyn Tagger>,
    pub(crate) archive: Option<Archive>,
    pub(crate) settings: SchedulerSettings,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
    cover_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SchedulerContext {
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Lock held while one album's cover is checked and fetched
    pub(crate) async fn cover_lock(&self, album_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.cover_locks.lock().await;
        Arc::clone(locks.entry(album_id.to_string()).or_default())
    }

    /// Publish the event matching a terminal report
    pub(crate) fn emit_report(&self, report: &TaskReport) {
        let event = match &report.outcome {
            TaskOutcome::Succeeded { bytes, simulated } => Event::TaskSucceeded {
                id: report.id.clone(),
                path: report.path.clone(),
                bytes: *bytes,
                simulated: *simulated,
            },
            TaskOutcome::Skipped { reason } => Event::TaskSkipped {
                id: report.id.clone(),
                reason: *reason,
            },
            TaskOutcome::Failed { kind, message } => Event::TaskFailed {
                id: report.id.clone(),
                kind: *kind,
                error: message.clone(),
            },
        };
        self.emit(event);
    }
}

/// Bounded worker pool running download tasks
pub struct Scheduler {
    ctx: Arc<SchedulerContext>,
    known_ids: HashSet<ItemId>,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// `archive` is `None` when the run must neither consult nor update the
    /// archive.
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        tagger: Arc<dyn Tagger>,
        archive: Option<Archive>,
        settings: SchedulerSettings,
        event_tx: broadcast::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: Arc::new(SchedulerContext {
                catalog,
                tagger,
                archive,
                settings,
                event_tx,
                cancel,
                cover_locks: Mutex::default(),
            }),
            known_ids: HashSet::new(),
        }
    }

    /// Treat `ids` as archived in addition to what the archive holds
    ///
    /// Dry runs pass the IDs of a legacy text archive here instead of
    /// importing it.
    pub fn with_known_ids(mut self, ids: HashSet<ItemId>) -> Self {
        self.known_ids = ids;
        self
    }

    /// Run every task with at most `concurrency` in flight
    ///
    /// Task-level failures are recorded in the summary; only an archive
    /// lookup failure during pre-flight is returned as an error.
    pub async fn run(&self, tasks: Vec<DownloadTask>, concurrency: usize) -> Result<RunSummary> {
        let ctx = &self.ctx;
        let mut summary = RunSummary {
            resolved: tasks.len() as u64,
            dry_run: ctx.settings.dry_run,
            ..Default::default()
        };
        let total = tasks.len();

        let (runnable, early) = self.preflight(tasks).await?;
        for report in early {
            ctx.emit_report(&report);
            summary.record(report);
        }

        let workers = concurrency.clamp(1, MAX_WORKERS).min(runnable.len());
        tracing::info!(
            tasks = total,
            runnable = runnable.len(),
            workers,
            dry_run = ctx.settings.dry_run,
            "Starting download run"
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(runnable)));
        let (tx, mut rx) = mpsc::channel::<TaskReport>(workers.max(1) * 2);
        let mut join_set = JoinSet::new();

        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let ctx = Arc::clone(ctx);
            let tx = tx.clone();
            join_set.spawn(async move {
                loop {
                    if ctx.cancel.is_cancelled() {
                        tracing::debug!(worker_id, "Cancelled, not claiming further tasks");
                        break;
                    }
                    let task = {
                        let mut guard = queue.lock().await;
                        guard.pop_front()
                    };
                    let Some(task) = task else { break };

                    if let Some(report) = worker::process(&ctx, task).await {
                        ctx.emit_report(&report);
                        if tx.send(report).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
        drop(tx);

        while let Some(report) = rx.recv().await {
            summary.record(report);
        }
        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Download worker panicked");
            }
        }

        summary.outcomes.sort_by_key(|r| r.index);
        summary.cancelled = ctx.cancel.is_cancelled() && summary.outcomes.len() < total;

        if summary.cancelled {
            tracing::warn!(
                finished = summary.outcomes.len(),
                total,
                "Run cancelled before every task finished"
            );
            ctx.emit(Event::RunCancelled);
        }
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped(),
            bytes = summary.bytes_downloaded,
            "Download run finished"
        );
        ctx.emit(Event::RunComplete {
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped(),
        });

        Ok(summary)
    }

    /// Split tasks into runnable ones and those settled before any worker starts
    async fn preflight(&self, tasks: Vec<DownloadTask>) -> Result<(Vec<DownloadTask>, Vec<TaskReport>)> {
        let mut seen_ids: HashSet<ItemId> = HashSet::new();
        let mut claimed: HashMap<PathBuf, ItemId> = HashMap::new();
        let mut candidates = Vec::with_capacity(tasks.len());
        let mut settled = Vec::new();

        for task in tasks {
            if !seen_ids.insert(task.item.id.clone()) {
                tracing::debug!(item_id = %task.item.id, "Duplicate identity in run");
                settled.push(report(&task, TaskOutcome::Skipped {
                    reason: SkipReason::Duplicate,
                }));
                continue;
            }
            if let Some(other) = claimed.get(&task.path) {
                let err = Error::PathCollision {
                    path: task.path.clone(),
                    other: other.clone(),
                };
                tracing::error!(item_id = %task.item.id, error = %err, "Output path collision");
                settled.push(report(&task, TaskOutcome::from_error(&err)));
                continue;
            }
            claimed.insert(task.path.clone(), task.item.id.clone());
            candidates.push(task);
        }

        let archived = match &self.ctx.archive {
            Some(archive) => {
                let ids: Vec<ItemId> = candidates.iter().map(|t| t.item.id.clone()).collect();
                archive.has_many(&ids).await?
            }
            None => HashSet::new(),
        };

        let mut runnable = Vec::with_capacity(candidates.len());
        for task in candidates {
            if archived.contains(&task.item.id) || self.known_ids.contains(&task.item.id) {
                tracing::debug!(item_id = %task.item.id, "Already archived, skipping");
                settled.push(report(&task, TaskOutcome::Skipped {
                    reason: SkipReason::Archived,
                }));
            } else {
                runnable.push(task);
            }
        }

        Ok((runnable, settled))
    }
}

pub(crate) fn report(task: &DownloadTask, outcome: TaskOutcome) -> TaskReport {
    TaskReport {
        index: task.index,
        id: task.item.id.clone(),
        path: task.path.clone(),
        outcome,
        retries: task.retries,
    }
}
