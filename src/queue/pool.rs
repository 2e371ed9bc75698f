//! Fixed-capacity worker pool with FIFO admission.
//!
//! `submit` only enqueues. A single admission task takes jobs in order and
//! starts each one as soon as a semaphore permit is free, so at most
//! `capacity` jobs ever run at once. The permit travels with the worker task
//! and is released when the job finishes.

use crate::config::Config;
use crate::error::{Result, ScribeError};
use crate::media::{DefaultMediaResolver, MediaResolver, SystemCommandExecutor};
use crate::pipeline::TranscriptionPipeline;
use crate::queue::events::{JobEvent, JobEventKind, NotificationSink};
use crate::queue::job::{Job, JobId};
use crate::queue::worker::{WorkerContext, run_job};
use crate::summary::Summarizer;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub active: usize,
    pub queued: usize,
    pub capacity: usize,
}

/// What `shutdown` found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Jobs that were still waiting and never ran.
    pub not_started: Vec<JobId>,
}

struct QueuedJob {
    id: JobId,
    job: Job,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    queued: AtomicUsize,
}

/// Runs transcription jobs with bounded parallelism.
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<QueuedJob>,
    stop: watch::Sender<bool>,
    admission: JoinHandle<Vec<QueuedJob>>,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
    next_id: AtomicU64,
    capacity: usize,
    sink: Arc<dyn NotificationSink>,
}

impl WorkerPool {
    /// Starts a pool with `capacity` worker slots.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        pipeline: Arc<TranscriptionPipeline>,
        resolver: Arc<dyn MediaResolver>,
        sink: Arc<dyn NotificationSink>,
        capacity: usize,
        scratch_root: PathBuf,
    ) -> Self {
        Self::start(pipeline, resolver, None, sink, capacity, scratch_root)
    }

    /// Like [`new`](Self::new), with a summarizer for jobs that ask for a
    /// summary.
    pub fn with_summarizer(
        pipeline: Arc<TranscriptionPipeline>,
        resolver: Arc<dyn MediaResolver>,
        summarizer: Arc<Summarizer>,
        sink: Arc<dyn NotificationSink>,
        capacity: usize,
        scratch_root: PathBuf,
    ) -> Self {
        Self::start(pipeline, resolver, Some(summarizer), sink, capacity, scratch_root)
    }

    fn start(
        pipeline: Arc<TranscriptionPipeline>,
        resolver: Arc<dyn MediaResolver>,
        summarizer: Option<Arc<Summarizer>>,
        sink: Arc<dyn NotificationSink>,
        capacity: usize,
        scratch_root: PathBuf,
    ) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let semaphore = Arc::new(Semaphore::new(capacity));
        let counters = Arc::new(Counters::default());

        let ctx = WorkerContext {
            pipeline,
            resolver,
            sink: Arc::clone(&sink),
            scratch_root,
            summarizer,
        };
        let admission = tokio::spawn(admit(
            rx,
            stop_rx,
            Arc::clone(&semaphore),
            Arc::clone(&counters),
            ctx,
        ));

        tracing::info!(capacity, "worker pool started");
        Self {
            tx,
            stop,
            admission,
            semaphore,
            counters,
            next_id: AtomicU64::new(1),
            capacity,
            sink,
        }
    }

    /// Production pool: system tools, the configured engine and
    /// `[queue]` settings. Summaries are available when the `[summary]`
    /// client can be built.
    pub fn from_config(config: &Config, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let pipeline = TranscriptionPipeline::from_config(config)?;
        let resolver = DefaultMediaResolver::new(
            Arc::new(SystemCommandExecutor::new()),
            config.tools.yt_dlp.clone(),
        );
        let summarizer = match Summarizer::from_config(&config.summary) {
            Ok(summarizer) => Some(Arc::new(summarizer)),
            Err(e) => {
                tracing::info!(error = %e, "summaries disabled");
                None
            }
        };
        Ok(Self::start(
            Arc::new(pipeline),
            Arc::new(resolver),
            summarizer,
            sink,
            config.queue.max_parallel,
            config.queue.scratch_root(),
        ))
    }

    /// Enqueues `job` and returns its id without waiting for a free slot.
    pub fn submit(&self, job: Job) -> Result<JobId> {
        if *self.stop.borrow() || self.tx.is_closed() {
            return Err(ScribeError::PoolClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let destination = job.destination.clone();
        let position = self.counters.queued.fetch_add(1, Ordering::SeqCst) + 1;

        if self.tx.send(QueuedJob { id, job }).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(ScribeError::PoolClosed);
        }

        tracing::debug!(job_id = id, position, "job submitted");
        self.sink.notify(JobEvent {
            job_id: id,
            destination,
            kind: JobEventKind::Queued { position },
        });
        Ok(id)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            active: self.counters.active.load(Ordering::SeqCst),
            queued: self.counters.queued.load(Ordering::SeqCst),
            capacity: self.capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stops admitting jobs, waits for running ones to finish, and fails
    /// every job that was still queued.
    pub async fn shutdown(self) -> ShutdownReport {
        self.stop.send_replace(true);
        drop(self.tx);

        let pending = match self.admission.await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "admission task failed");
                Vec::new()
            }
        };

        let mut report = ShutdownReport::default();
        for QueuedJob { id, job } in pending {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            self.sink.notify(JobEvent {
                job_id: id,
                destination: job.destination,
                kind: JobEventKind::Failed {
                    reason: "pool shut down before the job started".to_string(),
                },
            });
            report.not_started.push(id);
        }

        // Every permit back means every worker has finished
        if let Err(e) = self.semaphore.acquire_many(self.capacity as u32).await {
            tracing::warn!(error = %e, "could not wait for running jobs");
        }
        tracing::info!(
            not_started = report.not_started.len(),
            "worker pool shut down"
        );
        report
    }

    /// Waits until nothing is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let status = self.status();
            if status.active == 0 && status.queued == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }
}

/// Admission loop. Returns the jobs it never started.
async fn admit(
    mut rx: mpsc::UnboundedReceiver<QueuedJob>,
    mut stop: watch::Receiver<bool>,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
    ctx: WorkerContext,
) -> Vec<QueuedJob> {
    let mut pending = Vec::new();

    loop {
        let queued = tokio::select! {
            biased;
            _ = stop.changed() => break,
            next = rx.recv() => match next {
                Some(queued) => queued,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = stop.changed() => {
                pending.push(queued);
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    pending.push(queued);
                    break;
                }
            },
        };

        counters.active.fetch_add(1, Ordering::SeqCst);
        counters.queued.fetch_sub(1, Ordering::SeqCst);

        let ctx = ctx.clone();
        let counters = Arc::clone(&counters);
        tokio::spawn(async move {
            let _permit = permit;
            let QueuedJob { id, job } = queued;
            let destination = job.destination.clone();
            let sink = Arc::clone(&ctx.sink);

            let run = tokio::spawn(async move { run_job(&ctx, id, job).await });
            if let Err(e) = run.await {
                tracing::error!(job_id = id, error = %e, "job task aborted");
                sink.notify(JobEvent {
                    job_id: id,
                    destination,
                    kind: JobEventKind::Failed {
                        reason: format!("job aborted unexpectedly: {}", e),
                    },
                });
            }
            counters.active.fetch_sub(1, Ordering::SeqCst);
        });
    }

    rx.close();
    while let Ok(queued) = rx.try_recv() {
        pending.push(queued);
    }
    pending
}
