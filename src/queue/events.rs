//! Job lifecycle events and the sinks that receive them.

use crate::queue::job::JobId;
use crate::transcript::TranscriptStats;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Something that happened to a job, addressed to its destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub destination: String,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEventKind {
    /// Accepted; `position` counts jobs waiting, this one included.
    Queued { position: usize },
    Started,
    DownloadStarted { source: String },
    DownloadFinished { path: PathBuf },
    TranscriptionStarted { duration_secs: f64 },
    ChunksPlanned { count: usize },
    ChunkCompleted { index: usize, total: usize },
    ChunkFailed {
        index: usize,
        total: usize,
        start_secs: f64,
        end_secs: f64,
        reason: String,
    },
    SummaryReady {
        language: String,
        summary: String,
        saved_path: Option<PathBuf>,
    },
    /// Summarizing failed; the transcript itself still succeeds.
    SummaryFailed { reason: String },
    Succeeded {
        transcript: String,
        stats: TranscriptStats,
        saved_path: Option<PathBuf>,
        failed_chunks: Vec<usize>,
    },
    Failed { reason: String },
}

impl JobEventKind {
    /// True for the last event a job emits.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEventKind::Succeeded { .. } | JobEventKind::Failed { .. }
        )
    }
}

/// Receives job events for the lifetime of a pool.
///
/// Called from worker tasks; implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: JobEvent);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, event: JobEvent) {
        (**self).notify(event)
    }
}

/// Renders events as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: JobEvent) {
        let job_id = event.job_id;
        let destination = event.destination.as_str();
        match &event.kind {
            JobEventKind::Queued { position } => {
                tracing::info!(job_id, destination, position, "job queued")
            }
            JobEventKind::Started => tracing::info!(job_id, destination, "job started"),
            JobEventKind::DownloadStarted { source } => {
                tracing::info!(job_id, destination, source = %source, "download started")
            }
            JobEventKind::DownloadFinished { path } => {
                tracing::info!(job_id, destination, path = %path.display(), "download finished")
            }
            JobEventKind::TranscriptionStarted { duration_secs } => {
                tracing::info!(job_id, destination, duration_secs, "transcription started")
            }
            JobEventKind::ChunksPlanned { count } => {
                tracing::info!(job_id, destination, chunks = count, "chunks planned")
            }
            JobEventKind::ChunkCompleted { index, total } => {
                tracing::debug!(job_id, destination, chunk = index + 1, total, "chunk done")
            }
            JobEventKind::ChunkFailed {
                index,
                start_secs,
                end_secs,
                reason,
                ..
            } => tracing::warn!(
                job_id,
                destination,
                chunk = index + 1,
                start_secs,
                end_secs,
                reason = %reason,
                "chunk failed"
            ),
            JobEventKind::SummaryReady {
                language,
                saved_path,
                ..
            } => tracing::info!(
                job_id,
                destination,
                language = %language,
                saved = ?saved_path,
                "summary ready"
            ),
            JobEventKind::SummaryFailed { reason } => {
                tracing::warn!(job_id, destination, reason = %reason, "summary failed")
            }
            JobEventKind::Succeeded { stats, saved_path, .. } => tracing::info!(
                job_id,
                destination,
                words = stats.words,
                characters = stats.characters,
                saved = ?saved_path,
                "job succeeded"
            ),
            JobEventKind::Failed { reason } => {
                tracing::error!(job_id, destination, reason = %reason, "job failed")
            }
        }
    }
}

/// Forwards events over an unbounded crossbeam channel.
///
/// Events sent after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<JobEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, crossbeam_channel::Receiver<JobEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: JobEvent) {
        self.tx.send(event).ok();
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<JobEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events for one job, in emission order.
    pub fn events_for(&self, job_id: JobId) -> Vec<JobEventKind> {
        self.events()
            .into_iter()
            .filter(|e| e.job_id == job_id)
            .map(|e| e.kind)
            .collect()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, event: JobEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: JobEventKind) -> JobEvent {
        JobEvent {
            job_id: 3,
            destination: "chat-1".to_string(),
            kind,
        }
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(JobEventKind::Failed {
            reason: "x".to_string()
        }
        .is_terminal());
        assert!(!JobEventKind::Started.is_terminal());
        assert!(!JobEventKind::ChunksPlanned { count: 4 }.is_terminal());
    }

    #[test]
    fn test_event_serializes_flat_with_tag() {
        let json = serde_json::to_value(event(JobEventKind::ChunkCompleted { index: 1, total: 4 }))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "job_id": 3,
                "destination": "chat-1",
                "event": "chunk_completed",
                "index": 1,
                "total": 4
            })
        );
    }

    #[test]
    fn test_channel_sink_forwards_and_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        sink.notify(event(JobEventKind::Started));
        assert_eq!(rx.try_recv().unwrap().kind, JobEventKind::Started);

        drop(rx);
        sink.notify(event(JobEventKind::Started));
    }

    #[test]
    fn test_collecting_sink_filters_by_job() {
        let sink = CollectingSink::new();
        sink.notify(event(JobEventKind::Started));
        sink.notify(JobEvent {
            job_id: 9,
            destination: "other".to_string(),
            kind: JobEventKind::Started,
        });
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events_for(3), vec![JobEventKind::Started]);
    }

    #[test]
    fn test_log_sink_handles_every_kind() {
        let sink = LogSink;
        sink.notify(event(JobEventKind::Queued { position: 1 }));
        sink.notify(event(JobEventKind::ChunkFailed {
            index: 0,
            total: 2,
            start_secs: 0.0,
            end_secs: 600.0,
            reason: "timeout".to_string(),
        }));
        sink.notify(event(JobEventKind::Failed {
            reason: "boom".to_string(),
        }));
    }
}
