//! Materializes planned intervals as standalone audio files.

use crate::chunking::planner::{ChunkPlan, Interval};
use crate::error::{Result, ScribeError};
use crate::media::command::CommandExecutor;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One extracted slice of the source audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based position in the plan.
    pub index: usize,
    pub interval: Interval,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Writes the audio of one interval to its own file.
pub trait ChunkExtractor: Send + Sync {
    /// Extracts `interval` of `source` into `out_dir` as chunk `index`.
    fn extract(&self, source: &Path, interval: Interval, index: usize, out_dir: &Path)
    -> Result<Chunk>;

    /// Extracts every interval in `plan`, in order.
    ///
    /// Chunks already written stay on disk if a later one fails; the caller
    /// owns `out_dir` and removes it.
    fn extract_all(&self, source: &Path, plan: &ChunkPlan, out_dir: &Path) -> Result<Vec<Chunk>> {
        plan.intervals()
            .iter()
            .enumerate()
            .map(|(index, interval)| self.extract(source, *interval, index, out_dir))
            .collect()
    }
}

impl<T: ChunkExtractor + ?Sized> ChunkExtractor for Arc<T> {
    fn extract(
        &self,
        source: &Path,
        interval: Interval,
        index: usize,
        out_dir: &Path,
    ) -> Result<Chunk> {
        (**self).extract(source, interval, index, out_dir)
    }
}

/// File name of chunk `index` inside a job's scratch directory.
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk_{:03}.mp3", index)
}

/// Extractor that re-encodes each interval to mono MP3 with ffmpeg.
pub struct FfmpegChunkExtractor<E: CommandExecutor> {
    executor: E,
    program: String,
    bitrate: String,
}

impl<E: CommandExecutor> FfmpegChunkExtractor<E> {
    pub fn new(executor: E, program: impl Into<String>, bitrate: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
            bitrate: bitrate.into(),
        }
    }
}

impl<E: CommandExecutor> ChunkExtractor for FfmpegChunkExtractor<E> {
    fn extract(
        &self,
        source: &Path,
        interval: Interval,
        index: usize,
        out_dir: &Path,
    ) -> Result<Chunk> {
        let output = out_dir.join(chunk_file_name(index));
        let start = format!("{:.3}", interval.start_secs());
        let duration = format!("{:.3}", interval.duration_secs());

        let args: Vec<&OsStr> = vec![
            OsStr::new("-hide_banner"),
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            OsStr::new("-y"),
            OsStr::new("-ss"),
            OsStr::new(&start),
            OsStr::new("-t"),
            OsStr::new(&duration),
            OsStr::new("-i"),
            source.as_os_str(),
            OsStr::new("-vn"),
            OsStr::new("-ac"),
            OsStr::new("1"),
            OsStr::new("-c:a"),
            OsStr::new("libmp3lame"),
            OsStr::new("-b:a"),
            OsStr::new(&self.bitrate),
            output.as_os_str(),
        ];

        self.executor.execute(&self.program, &args)?;

        let size_bytes = std::fs::metadata(&output)
            .map_err(|e| ScribeError::ToolFailed {
                tool: self.program.clone(),
                message: format!("no output at {}: {}", output.display(), e),
            })?
            .len();
        if size_bytes == 0 {
            return Err(ScribeError::ToolFailed {
                tool: self.program.clone(),
                message: format!("chunk {} came out empty", index),
            });
        }

        tracing::debug!(
            chunk = index,
            start_ms = interval.start_ms,
            end_ms = interval.end_ms,
            size_bytes,
            "extracted chunk"
        );

        Ok(Chunk {
            index,
            interval,
            path: output,
            size_bytes,
        })
    }
}
