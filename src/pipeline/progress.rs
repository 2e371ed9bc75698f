use crate::chunking::Interval;

/// Milestones reported while one file is transcribed.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Probed { duration_secs: f64, size_bytes: u64 },
    Planned { chunks: usize, degraded_coverage: bool },
    ChunkDone { index: usize, total: usize },
    ChunkFailed {
        index: usize,
        total: usize,
        interval: Interval,
        reason: String,
    },
}

/// Receives [`Progress`] from the pipeline. Must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

impl<F> ProgressObserver for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn on_progress(&self, progress: Progress) {
        self(progress)
    }
}

/// Observer that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _progress: Progress) {}
}
