//! Import coordinator
//!
//! Accepts jobs on a bounded channel, enforces single-flight per source
//! path, runs a small worker pool over the pipeline with retry
//! classification, and handles queue bookkeeping and event emission.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mediarr_core::{
    retry_import, FileStatus, ImportError, MediaKind, Result, RetryConfig, SystemEvent,
};

use crate::job::ImportJob;
use crate::pipeline::ImportPipeline;
use crate::scanner::DownloadScanner;

/// In-memory set of source paths currently owned by a worker. Insertions
/// and removals are always paired: `try_claim` on enqueue, `release` when
/// the worker returns.
#[derive(Clone, Default)]
pub struct ProcessingSet {
    inner: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ProcessingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a path; false when some worker already owns it.
    pub fn try_claim(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().insert(path.to_path_buf())
    }

    pub fn release(&self, path: &Path) {
        self.inner.lock().unwrap().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().contains(path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Coordinator tunables
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Worker count; 1 keeps imports strictly ordered
    pub worker_count: usize,
    /// Bounded job channel capacity
    pub queue_capacity: usize,
    pub retry: RetryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            queue_capacity: 100,
            retry: RetryConfig::default(),
        }
    }
}

/// Owns the job channel, the processing set, and the worker pool
pub struct ImportCoordinator {
    pipeline: Arc<ImportPipeline>,
    processing: ProcessingSet,
    sender: mpsc::Sender<ImportJob>,
    // Kept so the channel survives worker shutdown; queued jobs drain when
    // workers restart instead of vanishing with a closed channel.
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<ImportJob>>>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ImportCoordinator {
    /// Build the coordinator and start its workers.
    pub fn start(pipeline: Arc<ImportPipeline>, config: CoordinatorConfig) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let processing = ProcessingSet::new();
        let shutdown = CancellationToken::new();

        let coordinator = Arc::new(Self {
            pipeline,
            processing: processing.clone(),
            sender,
            receiver: receiver.clone(),
            shutdown: shutdown.clone(),
            workers: Mutex::new(Vec::new()),
        });

        let mut handles = Vec::with_capacity(config.worker_count.max(1));
        for worker_id in 0..config.worker_count.max(1) {
            let coordinator = coordinator.clone();
            let retry = config.retry.clone();
            handles.push(tokio::spawn(async move {
                coordinator.worker_loop(worker_id, retry).await;
            }));
        }
        *coordinator.workers.lock().unwrap() = handles;

        info!(
            "Import coordinator started with {} worker(s)",
            config.worker_count.max(1)
        );
        coordinator
    }

    pub fn processing(&self) -> &ProcessingSet {
        &self.processing
    }

    /// Enqueue a job, enforcing single-flight per source path and channel
    /// backpressure. A full channel rolls the claim back.
    pub fn queue_import(&self, job: ImportJob) -> Result<()> {
        if !self.processing.try_claim(&job.source_path) {
            return Err(ImportError::AlreadyImporting {
                path: job.source_path.display().to_string(),
            });
        }

        let source = job.source_path.clone();
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.processing.release(&source);
                Err(ImportError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.processing.release(&source);
                Err(ImportError::Cancelled {
                    operation: "queue_import".to_string(),
                })
            }
        }
    }

    /// Periodically run the scanner and feed its jobs into the queue.
    /// Returns the task handle; it stops on shutdown.
    pub fn attach_scanner(
        self: &Arc<Self>,
        scanner: DownloadScanner,
        interval: Duration,
    ) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = coordinator.shutdown.cancelled() => break,
                }

                match scanner.scan(&coordinator.processing).await {
                    Ok(jobs) => {
                        for job in jobs {
                            match coordinator.queue_import(job) {
                                Ok(())
                                | Err(ImportError::AlreadyImporting { .. }) => {}
                                Err(ImportError::QueueFull) => {
                                    debug!("Import queue full, deferring to next cycle");
                                    break;
                                }
                                Err(e) => warn!("Failed to queue scanned job: {}", e),
                            }
                        }
                    }
                    Err(e) => error!("Scan cycle failed: {}", e),
                }
            }
        })
    }

    /// Stop accepting work and wait for all workers to drain.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().unwrap());
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("Worker terminated abnormally: {}", e);
            }
        }
        info!("Import coordinator stopped");
    }

    async fn worker_loop(&self, worker_id: usize, retry: RetryConfig) {
        debug!("Worker {} started", worker_id);
        loop {
            let job = {
                let mut receiver = self.receiver.lock().await;
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    job = receiver.recv() => match job {
                        Some(job) => job,
                        None => break,
                    },
                }
            };

            let source = job.source_path.clone();
            self.run_job(job, &retry).await;
            self.processing.release(&source);
        }
        debug!("Worker {} stopped", worker_id);
    }

    async fn run_job(&self, job: ImportJob, retry: &RetryConfig) {
        let services = self.pipeline.services().clone();
        let source = job.source_path.display().to_string();

        if let Some(queue_media) = &job.queue_media {
            let _ = services
                .queue_media
                .update_status(queue_media.id, FileStatus::Importing, None)
                .await;
        }

        let outcome = retry_import(retry, &self.shutdown, "import", || {
            self.pipeline.execute(&job, &self.shutdown)
        })
        .await;

        match outcome {
            Ok(result) if result.requires_slot_selection => {
                info!("Import of {} paused for slot selection", source);
                if let Some(queue_media) = &job.queue_media {
                    let _ = services
                        .queue_media
                        .update_status(queue_media.id, FileStatus::Ready, None)
                        .await;
                }
            }
            Ok(result) => {
                let destination = result
                    .destination_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                let kind = result
                    .library_match
                    .as_ref()
                    .map(|m| m.kind)
                    .unwrap_or(MediaKind::Movie);

                services.events.publish(SystemEvent::ImportCompleted {
                    source: source.clone(),
                    destination,
                    media_type: kind,
                    is_upgrade: result.is_upgrade,
                });
                if let Some(library_match) = &result.library_match {
                    match library_match.kind {
                        MediaKind::Movie => {
                            if let Some(movie_id) = library_match.movie_id {
                                services.events.publish(SystemEvent::MovieUpdated { movie_id });
                            }
                        }
                        MediaKind::Episode => {
                            if let Some(series_id) = library_match.series_id {
                                services
                                    .events
                                    .publish(SystemEvent::SeriesUpdated { series_id });
                            }
                        }
                    }
                }

                self.finish_queue_bookkeeping(&job).await;
            }
            Err(err) => {
                warn!("Import of {} failed: {}", source, err);
                services.events.publish(SystemEvent::ImportFailed {
                    source: source.clone(),
                    error: err.to_string(),
                });

                if let Some(queue_media) = &job.queue_media {
                    let _ = services
                        .queue_media
                        .update_status(queue_media.id, FileStatus::Failed, Some(&err.to_string()))
                        .await;
                    let _ = services.queue_media.increment_attempts(queue_media.id).await;
                }
                if let Err(e) = services.health.warn(&source, &err.to_string()).await {
                    warn!("Could not register health warning for {}: {}", source, e);
                }
            }
        }
    }

    /// Mark the queue row imported and retire the mapping once every file
    /// it tracks has landed.
    async fn finish_queue_bookkeeping(&self, job: &ImportJob) {
        let services = self.pipeline.services();

        if let Some(queue_media) = &job.queue_media {
            if let Err(e) = services
                .queue_media
                .update_status(queue_media.id, FileStatus::Imported, None)
                .await
            {
                warn!("Queue media update failed: {}", e);
            }
        }

        let Some(mapping) = &job.mapping else {
            return;
        };

        let all_done = if mapping.is_season_pack {
            match services.queue_media.list_for_mapping(mapping.id).await {
                Ok(rows) => rows
                    .iter()
                    .all(|row| row.file_status == FileStatus::Imported),
                Err(e) => {
                    warn!("Queue media listing failed for mapping {}: {}", mapping.id, e);
                    false
                }
            }
        } else {
            true
        };

        if all_done {
            if let Err(e) = services.downloads.delete_download_mapping(mapping.id).await {
                warn!("Could not delete download mapping {}: {}", mapping.id, e);
            }
        }
    }
}
