//! What a worker does with one admitted job.

use crate::error::{Result, ScribeError};
use crate::media::{MediaHandle, MediaResolver, MediaSource};
use crate::pipeline::{Progress, TranscriptionPipeline};
use crate::queue::events::{JobEvent, JobEventKind, NotificationSink};
use crate::queue::job::{Job, JobId, SummaryOptions};
use crate::summary::{self, Summarizer, Summary, SummaryRequest};
use crate::transcript::{self, Transcript};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a worker task shares with the pool.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) pipeline: Arc<TranscriptionPipeline>,
    pub(crate) resolver: Arc<dyn MediaResolver>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) scratch_root: PathBuf,
    pub(crate) summarizer: Option<Arc<Summarizer>>,
}

impl WorkerContext {
    fn emit(&self, job_id: JobId, job: &Job, kind: JobEventKind) {
        self.sink.notify(JobEvent {
            job_id,
            destination: job.destination.clone(),
            kind,
        });
    }
}

/// Runs `job` to completion and emits exactly one terminal event.
pub(crate) async fn run_job(ctx: &WorkerContext, job_id: JobId, job: Job) {
    ctx.emit(job_id, &job, JobEventKind::Started);
    tracing::info!(job_id, source = %job.source.describe(), "job started");

    match process(ctx, job_id, &job).await {
        Ok((transcript, saved_path)) => {
            if let Some(options) = &job.summary {
                let kind = match summarize(ctx, &job, options, &transcript.text).await {
                    Ok(kind) => kind,
                    Err(e) => {
                        tracing::warn!(job_id, error = %e, "summary failed");
                        JobEventKind::SummaryFailed {
                            reason: e.to_string(),
                        }
                    }
                };
                ctx.emit(job_id, &job, kind);
            }
            ctx.emit(
                job_id,
                &job,
                JobEventKind::Succeeded {
                    transcript: transcript.text,
                    stats: transcript.stats,
                    saved_path,
                    failed_chunks: transcript.failed_chunks,
                },
            )
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "job failed");
            ctx.emit(
                job_id,
                &job,
                JobEventKind::Failed {
                    reason: e.to_string(),
                },
            );
        }
    }
}

async fn process(
    ctx: &WorkerContext,
    job_id: JobId,
    job: &Job,
) -> Result<(Transcript, Option<PathBuf>)> {
    let scratch = match make_scratch_dir(&ctx.scratch_root, job_id).await {
        Ok(scratch) => scratch,
        Err(e) => {
            discard_upload(ctx, job).await;
            return Err(e);
        }
    };

    if job.is_remote() {
        ctx.emit(
            job_id,
            job,
            JobEventKind::DownloadStarted {
                source: job.source.describe(),
            },
        );
    }
    let handle = match ctx
        .resolver
        .resolve(&job.source, job.cookies.as_deref(), scratch.path())
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            release(ctx, upload_handle(job), scratch).await;
            return Err(e);
        }
    };
    if job.is_remote() {
        ctx.emit(
            job_id,
            job,
            JobEventKind::DownloadFinished {
                path: handle.path().to_path_buf(),
            },
        );
    }

    let observer = |progress: Progress| ctx.emit(job_id, job, progress_event(progress));
    let result = ctx
        .pipeline
        .transcribe_file(
            handle.path(),
            job.prompt.as_deref(),
            scratch.path(),
            &observer,
        )
        .await;

    let result = match result {
        Ok(transcript) => {
            let saved = match &job.output_dir {
                Some(dir) => save(dir, job, &transcript.text).await,
                None => None,
            };
            Ok((transcript, saved))
        }
        Err(e) => Err(e),
    };

    release(ctx, Some(handle), scratch).await;
    result
}

async fn summarize(
    ctx: &WorkerContext,
    job: &Job,
    options: &SummaryOptions,
    text: &str,
) -> Result<JobEventKind> {
    let summarizer = ctx
        .summarizer
        .as_ref()
        .ok_or_else(|| ScribeError::SummaryUnavailable {
            reason: "no summary client configured".to_string(),
        })?;
    let mut request = SummaryRequest::new(text, &options.language);
    if let Some(instructions) = &options.instructions {
        request = request.with_instructions(instructions);
    }
    let summary = summarizer.summarize(&request).await?;

    let saved_path = match &job.output_dir {
        Some(dir) => save_summary(dir, job, &summary).await,
        None => None,
    };
    Ok(JobEventKind::SummaryReady {
        language: summary.language,
        summary: summary.text,
        saved_path,
    })
}

fn progress_event(progress: Progress) -> JobEventKind {
    match progress {
        Progress::Probed { duration_secs, .. } => JobEventKind::TranscriptionStarted { duration_secs },
        Progress::Planned { chunks, .. } => JobEventKind::ChunksPlanned { count: chunks },
        Progress::ChunkDone { index, total } => JobEventKind::ChunkCompleted { index, total },
        Progress::ChunkFailed {
            index,
            total,
            interval,
            reason,
        } => JobEventKind::ChunkFailed {
            index,
            total,
            start_secs: interval.start_secs(),
            end_secs: interval.end_secs(),
            reason,
        },
    }
}

async fn make_scratch_dir(root: &Path, job_id: JobId) -> Result<tempfile::TempDir> {
    tokio::fs::create_dir_all(root).await?;
    let prefix = format!("longscribe-job{}-", job_id);
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&root)
            .map_err(ScribeError::from)
    })
    .await
    .map_err(|e| ScribeError::Other(format!("Scratch dir task panicked: {}", e)))?
}

/// Saving is a convenience; a failure is logged and the job still succeeds.
async fn save(dir: &Path, job: &Job, text: &str) -> Option<PathBuf> {
    let dir = dir.to_path_buf();
    let stem = transcript::transcript_stem(&job.source);
    let text = text.to_string();
    match tokio::task::spawn_blocking(move || transcript::save_transcript(&dir, &stem, &text)).await {
        Ok(Ok(path)) => Some(path),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "could not save transcript");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "transcript save task panicked");
            None
        }
    }
}

async fn save_summary(dir: &Path, job: &Job, summary: &Summary) -> Option<PathBuf> {
    let dir = dir.to_path_buf();
    let stem = transcript::transcript_stem(&job.source);
    let summary = summary.clone();
    match tokio::task::spawn_blocking(move || summary::save_summary(&dir, &stem, &summary)).await {
        Ok(Ok(path)) => Some(path),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "could not save summary");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "summary save task panicked");
            None
        }
    }
}

/// An upload is ours to delete whether or not it ever resolved.
fn upload_handle(job: &Job) -> Option<MediaHandle> {
    match &job.source {
        MediaSource::LocalFile {
            path,
            persistent: false,
        } => Some(MediaHandle::owned(path)),
        _ => None,
    }
}

async fn discard_upload(ctx: &WorkerContext, job: &Job) {
    let Some(handle) = upload_handle(job) else {
        return;
    };
    let cleanup = ctx.pipeline.cleanup();
    if let Err(e) = tokio::task::spawn_blocking(move || handle.dispose(&cleanup)).await {
        tracing::warn!(error = %e, "upload cleanup task panicked");
    }
}

/// Deletes the media (if owned) and the scratch directory.
async fn release(ctx: &WorkerContext, handle: Option<MediaHandle>, scratch: tempfile::TempDir) {
    let cleanup = ctx.pipeline.cleanup();
    let result = tokio::task::spawn_blocking(move || {
        if let Some(handle) = handle {
            handle.dispose(&cleanup);
        }
        cleanup.remove_dir_all(scratch.path());
        // TempDir's own drop is a no-op once the directory is gone
        drop(scratch);
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "cleanup task panicked");
    }
}
