//! End-to-end transcription of one local media file.
//!
//! probe → decide single call or chunks → plan (shrinking until every chunk
//! fits the engine) → extract → transcribe each chunk with retries → stitch.

pub mod progress;

pub use progress::{NoProgress, Progress, ProgressObserver};

use crate::chunking::{Chunk, ChunkExtractor, ChunkPlan, ChunkPlanner, FfmpegChunkExtractor};
use crate::config::{ChunkingConfig, Config};
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::media::probe::extension_of;
use crate::media::{Cleanup, DefaultDurationProbe, DurationProbe, SystemCommandExecutor};
use crate::stt::{
    OpenAiClient, RetryPolicy, RetryingTranscriber, Segment, SegmentKind, TranscriptionClient,
};
use crate::transcript::{SegmentStitcher, Transcript, TranscriptStats};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the chunk directory inside a job's scratch directory.
const CHUNK_DIR: &str = "chunks";

/// Probes, splits, transcribes and stitches a single media file.
///
/// Holds no per-job state; one instance is shared by every worker.
pub struct TranscriptionPipeline {
    probe: Arc<dyn DurationProbe>,
    extractor: Arc<dyn ChunkExtractor>,
    transcriber: RetryingTranscriber<Arc<dyn TranscriptionClient>>,
    stitcher: SegmentStitcher,
    chunking: ChunkingConfig,
    cleanup: Cleanup,
    default_prompt_file: Option<PathBuf>,
}

impl TranscriptionPipeline {
    pub fn new(
        probe: Arc<dyn DurationProbe>,
        extractor: Arc<dyn ChunkExtractor>,
        client: Arc<dyn TranscriptionClient>,
        config: &Config,
    ) -> Self {
        Self {
            probe,
            extractor,
            transcriber: RetryingTranscriber::new(client, RetryPolicy::from(&config.retry)),
            stitcher: SegmentStitcher::from(&config.stitching),
            chunking: config.chunking.clone(),
            cleanup: Cleanup::default(),
            default_prompt_file: config.engine.default_prompt_file.clone(),
        }
    }

    /// Production wiring: ffprobe/hound probing, ffmpeg extraction and the
    /// configured HTTP engine.
    pub fn from_config(config: &Config) -> Result<Self> {
        let executor = Arc::new(SystemCommandExecutor::new());
        let probe = DefaultDurationProbe::new(Arc::clone(&executor), config.tools.ffprobe.clone());
        let extractor = FfmpegChunkExtractor::new(
            executor,
            config.tools.ffmpeg.clone(),
            config.chunking.bitrate.clone(),
        );
        let client = OpenAiClient::from_config(&config.engine)?;
        Ok(Self::new(
            Arc::new(probe),
            Arc::new(extractor),
            Arc::new(client),
            config,
        ))
    }

    pub fn with_cleanup(mut self, cleanup: Cleanup) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn cleanup(&self) -> Cleanup {
        self.cleanup
    }

    /// Reads the configured default prompt. A missing, unreadable or blank
    /// file means no prompt.
    async fn default_prompt(&self) -> Option<String> {
        let path = self.default_prompt_file.as_ref()?;
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    tracing::debug!(file = %path.display(), "using default prompt");
                    Some(text.to_string())
                }
            }
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "no default prompt");
                None
            }
        }
    }

    /// Probes `media` for its duration on the blocking pool.
    pub async fn probe_duration(&self, media: &Path) -> Result<f64> {
        let probe = Arc::clone(&self.probe);
        let path = media.to_path_buf();
        tokio::task::spawn_blocking(move || probe.duration_secs(&path))
            .await
            .map_err(|e| ScribeError::Other(format!("Probe task panicked: {}", e)))?
    }

    /// Transcribes `media`, using `scratch_dir` for chunk files.
    ///
    /// Fails if the media can't be probed, chunks can't be made small enough,
    /// or every chunk fails to transcribe. Individual chunk failures leave a
    /// placeholder in the transcript instead.
    pub async fn transcribe_file(
        &self,
        media: &Path,
        prompt: Option<&str>,
        scratch_dir: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<Transcript> {
        let duration = self.probe_duration(media).await?;
        let size = tokio::fs::metadata(media).await?.len();
        observer.on_progress(Progress::Probed {
            duration_secs: duration,
            size_bytes: size,
        });

        let fallback = match prompt {
            Some(_) => None,
            None => self.default_prompt().await,
        };
        let prompt = prompt.or(fallback.as_deref());

        let limit = self.transcriber.client().max_upload_bytes();
        let fits_one_call = size <= limit && duration <= self.chunking.single_call_max_secs;
        tracing::info!(
            file = %media.display(),
            duration_secs = duration,
            size_bytes = size,
            single_call = fits_one_call,
            "transcribing"
        );

        let single = if fits_one_call {
            self.single_chunk(media, duration, size, limit, scratch_dir)
                .await?
        } else {
            None
        };
        let (plan, chunks, owned_chunks) = match single {
            Some((plan, chunk, owned)) => (plan, vec![chunk], owned),
            None => {
                let (plan, chunks) = self
                    .plan_and_extract(media, duration, size, limit, scratch_dir)
                    .await?;
                (plan, chunks, true)
            }
        };

        observer.on_progress(Progress::Planned {
            chunks: chunks.len(),
            degraded_coverage: plan.degraded_coverage(),
        });

        let segments = self
            .transcribe_chunks(chunks, prompt, owned_chunks, observer)
            .await;

        if segments.iter().all(Segment::is_failed) {
            return Err(ScribeError::AllChunksFailed {
                chunks: segments.len(),
            });
        }

        let text = self.stitcher.stitch(&segments);
        let failed_chunks: Vec<usize> = segments
            .iter()
            .filter(|s| s.is_failed())
            .map(|s| s.index)
            .collect();
        if !failed_chunks.is_empty() {
            tracing::warn!(
                failed = failed_chunks.len(),
                total = segments.len(),
                "transcript has gaps from failed chunks"
            );
        }

        Ok(Transcript {
            stats: TranscriptStats::compute(&text, duration),
            text,
            chunk_count: segments.len(),
            failed_chunks,
            suspicious_chunks: segments
                .iter()
                .filter(|s| s.is_suspicious())
                .map(|s| s.index)
                .collect(),
            degraded_coverage: plan.degraded_coverage(),
        })
    }

    /// The whole file as one chunk. Containers the engine can't decode are
    /// re-encoded first, in which case the chunk file is ours to delete.
    /// `None` when the re-encoded file ends up over `limit`.
    async fn single_chunk(
        &self,
        media: &Path,
        duration: f64,
        size: u64,
        limit: u64,
        scratch_dir: &Path,
    ) -> Result<Option<(ChunkPlan, Chunk, bool)>> {
        let plan = ChunkPlanner::single(duration);
        let interval = plan.intervals()[0];

        let native = extension_of(media).is_some_and(|ext| defaults::is_engine_native_extension(&ext));
        if native {
            let chunk = Chunk {
                index: 0,
                interval,
                path: media.to_path_buf(),
                size_bytes: size,
            };
            return Ok(Some((plan, chunk, false)));
        }

        tracing::debug!(file = %media.display(), "re-encoding container the engine can't read");
        let mut chunks = self.extract(media, &plan, scratch_dir).await?;
        let chunk = chunks.pop().ok_or_else(|| ScribeError::InvalidChunkPlan {
            message: "single-chunk extraction produced nothing".to_string(),
        })?;
        if chunk.size_bytes > limit {
            tracing::warn!(
                size_bytes = chunk.size_bytes,
                limit_bytes = limit,
                "re-encoded file exceeds upload limit, chunking instead"
            );
            self.remove_chunks(vec![chunk.path]).await;
            return Ok(None);
        }
        Ok(Some((plan, chunk, true)))
    }

    /// Plans and extracts chunks, shrinking the byte target until every chunk
    /// fits under `limit`.
    async fn plan_and_extract(
        &self,
        media: &Path,
        duration: f64,
        size: u64,
        limit: u64,
        scratch_dir: &Path,
    ) -> Result<(ChunkPlan, Vec<Chunk>)> {
        let planner = ChunkPlanner::new(self.chunking.overlap_secs)
            .with_max_chunk_secs(self.chunking.max_chunk_secs);
        let mut target = self.chunking.target_chunk_bytes();
        let mut largest = 0;

        for attempt in 0..=self.chunking.max_shrink_attempts {
            let plan = planner.plan(duration, size, target)?;
            tracing::info!(
                chunks = plan.len(),
                chunk_secs = plan.chunk_ms() as f64 / 1000.0,
                target_bytes = target,
                attempt,
                "planned chunks"
            );

            let chunks = self.extract(media, &plan, scratch_dir).await?;
            largest = chunks.iter().map(|c| c.size_bytes).max().unwrap_or(0);
            if largest <= limit {
                return Ok((plan, chunks));
            }

            tracing::warn!(
                largest_bytes = largest,
                limit_bytes = limit,
                "chunk exceeds upload limit, re-planning with a smaller target"
            );
            self.remove_chunks(chunks.into_iter().map(|c| c.path).collect())
                .await;
            target = (target as f64 * self.chunking.shrink_factor) as u64;
        }

        Err(ScribeError::ChunkSizeNotConverged {
            attempts: self.chunking.max_shrink_attempts,
            largest,
            limit,
        })
    }

    async fn extract(&self, media: &Path, plan: &ChunkPlan, scratch_dir: &Path) -> Result<Vec<Chunk>> {
        let out_dir = scratch_dir.join(CHUNK_DIR);
        tokio::fs::create_dir_all(&out_dir).await?;

        let extractor = Arc::clone(&self.extractor);
        let media = media.to_path_buf();
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || extractor.extract_all(&media, &plan, &out_dir))
            .await
            .map_err(|e| ScribeError::Other(format!("Extraction task panicked: {}", e)))?
    }

    /// Transcribes chunks in order, deleting each owned chunk file as soon as
    /// it is done.
    async fn transcribe_chunks(
        &self,
        chunks: Vec<Chunk>,
        prompt: Option<&str>,
        owned: bool,
        observer: &dyn ProgressObserver,
    ) -> Vec<Segment> {
        let total = chunks.len();
        let mut segments = Vec::with_capacity(total);

        for chunk in chunks {
            let segment = self.transcriber.transcribe_chunk(&chunk, prompt, total).await;
            if let SegmentKind::Failed { reason } = &segment.kind {
                observer.on_progress(Progress::ChunkFailed {
                    index: chunk.index,
                    total,
                    interval: chunk.interval,
                    reason: reason.clone(),
                });
            } else {
                observer.on_progress(Progress::ChunkDone {
                    index: chunk.index,
                    total,
                });
            }
            if owned {
                self.remove_chunks(vec![chunk.path]).await;
            }
            segments.push(segment);
        }

        segments
    }

    async fn remove_chunks(&self, paths: Vec<PathBuf>) {
        let cleanup = self.cleanup;
        let result = tokio::task::spawn_blocking(move || {
            for path in &paths {
                cleanup.remove_file(path);
            }
        })
        .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "chunk cleanup task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Interval;
    use crate::defaults::MIB;
    use crate::error::TranscriptionError;
    use crate::stt::MockClient;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedProbe(f64);

    impl DurationProbe for FixedProbe {
        fn duration_secs(&self, _path: &Path) -> Result<f64> {
            Ok(self.0)
        }
    }

    /// Writes chunk files whose size comes from `size_for`, recording each call.
    struct FakeExtractor {
        size_for: Box<dyn Fn(Interval) -> u64 + Send + Sync>,
        calls: Mutex<Vec<Interval>>,
    }

    impl FakeExtractor {
        fn new(size_for: impl Fn(Interval) -> u64 + Send + Sync + 'static) -> Self {
            Self {
                size_for: Box::new(size_for),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Interval> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ChunkExtractor for FakeExtractor {
        fn extract(&self, _source: &Path, interval: Interval, index: usize, out_dir: &Path) -> Result<Chunk> {
            self.calls.lock().unwrap().push(interval);
            let size = (self.size_for)(interval);
            let path = out_dir.join(crate::chunking::chunk_file_name(index));
            // Real bytes only for small files; size is reported separately
            std::fs::write(&path, b"x")?;
            Ok(Chunk {
                index,
                interval,
                path,
                size_bytes: size,
            })
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.retry.retry_delay_ms = 0;
        config
    }

    fn pipeline(
        duration: f64,
        extractor: Arc<FakeExtractor>,
        client: Arc<MockClient>,
    ) -> TranscriptionPipeline {
        TranscriptionPipeline::new(Arc::new(FixedProbe(duration)), extractor, client, &config())
            .with_cleanup(Cleanup::new(1, Duration::ZERO))
    }

    /// A media file of `bytes` bytes (sparse, so large sizes are cheap).
    fn media_file(dir: &TempDir, name: &str, bytes: u64) -> PathBuf {
        let path = dir.path().join(name);
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_small_file_is_one_call_without_extraction() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "note.mp3", 1024);
        let extractor = Arc::new(FakeExtractor::new(|_| 1));
        let client = Arc::new(MockClient::new().with_response("short memo"));
        let pipeline = pipeline(60.0, Arc::clone(&extractor), Arc::clone(&client));

        let transcript = pipeline
            .transcribe_file(&media, Some("Names: Ada"), dir.path(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(transcript.text, "short memo");
        assert_eq!(transcript.chunk_count, 1);
        assert!(extractor.calls().is_empty());
        let calls = client.calls();
        assert_eq!(calls[0].audio, media);
        assert_eq!(calls[0].prompt.as_deref(), Some("Names: Ada"));
        assert!(media.exists(), "source media must survive the pipeline");
    }

    #[tokio::test]
    async fn test_default_prompt_file_applies_only_without_a_prompt() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "note.mp3", 1024);
        let prompt_file = dir.path().join("prompt.txt");
        std::fs::write(&prompt_file, "  Glossary: Kubernetes, gRPC\n").unwrap();
        let mut config = config();
        config.engine.default_prompt_file = Some(prompt_file);
        let client = Arc::new(MockClient::new());
        let pipeline = TranscriptionPipeline::new(
            Arc::new(FixedProbe(60.0)),
            Arc::new(FakeExtractor::new(|_| 1)),
            Arc::clone(&client) as Arc<dyn TranscriptionClient>,
            &config,
        );

        pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await
            .unwrap();
        pipeline
            .transcribe_file(&media, Some("Speakers: Ada"), dir.path(), &NoProgress)
            .await
            .unwrap();

        let prompts: Vec<Option<String>> = client.calls().into_iter().map(|c| c.prompt).collect();
        assert_eq!(
            prompts,
            vec![
                Some("Glossary: Kubernetes, gRPC".to_string()),
                Some("Speakers: Ada".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_default_prompt_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "note.mp3", 1024);
        let mut config = config();
        config.engine.default_prompt_file = Some(dir.path().join("absent.txt"));
        let client = Arc::new(MockClient::new());
        let pipeline = TranscriptionPipeline::new(
            Arc::new(FixedProbe(60.0)),
            Arc::new(FakeExtractor::new(|_| 1)),
            Arc::clone(&client) as Arc<dyn TranscriptionClient>,
            &config,
        );

        pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(client.calls()[0].prompt, None);
    }

    #[tokio::test]
    async fn test_video_container_is_reencoded_for_single_call() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "screen.mkv", 2048);
        let extractor = Arc::new(FakeExtractor::new(|_| 10));
        let client = Arc::new(MockClient::new().with_response("demo"));
        let pipeline = pipeline(90.0, Arc::clone(&extractor), Arc::clone(&client));

        pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(extractor.calls(), vec![Interval::new(0, 90_000)]);
        assert_eq!(client.calls()[0].audio, dir.path().join("chunks/chunk_000.mp3"));
        assert!(!dir.path().join("chunks/chunk_000.mp3").exists());
    }

    #[tokio::test]
    async fn test_reencode_over_limit_falls_back_to_chunking() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "talk.mkv", 20 * MIB);
        // 16 kB per second: the full 1700 s re-encode is ~27 MB
        let extractor = Arc::new(FakeExtractor::new(|i| (i.duration_secs() * 16_000.0) as u64));
        let client = Arc::new(MockClient::new().with_response("part"));
        let pipeline = pipeline(1700.0, Arc::clone(&extractor), Arc::clone(&client));

        let transcript = pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await
            .unwrap();

        let calls = extractor.calls();
        assert_eq!(calls[0], Interval::new(0, 1_700_000));
        assert!(transcript.chunk_count > 1);
        assert_eq!(client.call_count(), transcript.chunk_count);
        assert!(
            calls[1..]
                .iter()
                .all(|i| (i.duration_secs() * 16_000.0) as u64 <= defaults::MAX_UPLOAD_BYTES)
        );
        assert!(!dir.path().join("chunks/chunk_000.mp3").exists());
        assert!(media.exists());
    }

    #[tokio::test]
    async fn test_large_file_is_chunked_and_stitched() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "lecture.mp3", 70 * MIB);
        let extractor = Arc::new(FakeExtractor::new(|_| 19 * MIB));
        let client = Arc::new(MockClient::new().with_handler(|path, _| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            Ok(match name.as_str() {
                "chunk_000.mp3" => "intro words then the shared boundary phrase here",
                "chunk_001.mp3" => "the shared boundary phrase here and middle part",
                "chunk_002.mp3" => "middle part continues with details",
                _ => "closing remarks",
            }
            .to_string())
        }));
        let pipeline = pipeline(2000.0, Arc::clone(&extractor), Arc::clone(&client));

        let transcript = pipeline
            .transcribe_file(&media, Some("Topic: physics"), dir.path(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(transcript.chunk_count, 4);
        assert_eq!(
            transcript.text,
            "intro words then the shared boundary phrase here and middle part middle part continues with details closing remarks"
        );
        assert!(!transcript.is_partial());

        let prompts: Vec<String> = client.calls().into_iter().filter_map(|c| c.prompt).collect();
        assert_eq!(
            prompts[3],
            "Topic: physics\n\nThis is part 4 of 4 of the full audio."
        );
        // Chunk files are deleted after transcription
        assert_eq!(std::fs::read_dir(dir.path().join("chunks")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_chunks_trigger_replan() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "talk.mp3", 70 * MIB);
        // First plan's chunks come out too large; later plans fit
        let attempts = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&attempts);
        let extractor = Arc::new(FakeExtractor::new(move |interval| {
            if interval.start_ms == 0 {
                *counter.lock().unwrap() += 1;
            }
            if *counter.lock().unwrap() == 1 { 30 * MIB } else { 10 * MIB }
        }));
        let client = Arc::new(MockClient::new());
        let mut config = config();
        config.chunking.max_chunk_secs = 3600.0;
        let pipeline = TranscriptionPipeline::new(
            Arc::new(FixedProbe(2000.0)),
            Arc::clone(&extractor) as Arc<dyn ChunkExtractor>,
            client,
            &config,
        );

        let transcript = pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(*attempts.lock().unwrap(), 2);
        // 20 MiB target → 4 chunks, then 16 MiB → 5 chunks
        assert_eq!(transcript.chunk_count, 5);
    }

    #[tokio::test]
    async fn test_chunks_never_fitting_is_fatal() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "talk.mp3", 70 * MIB);
        let extractor = Arc::new(FakeExtractor::new(|_| 40 * MIB));
        let pipeline = pipeline(2000.0, extractor, Arc::new(MockClient::new()));

        let result = pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await;

        assert!(matches!(
            result,
            Err(ScribeError::ChunkSizeNotConverged { attempts: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_placeholder() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "talk.mp3", 70 * MIB);
        let extractor = Arc::new(FakeExtractor::new(|_| MIB));
        let client = Arc::new(MockClient::new().with_handler(|path, _| {
            if path.ends_with("chunk_001.mp3") {
                Err(TranscriptionError::Transient {
                    message: "timeout".to_string(),
                })
            } else {
                Ok("fine".to_string())
            }
        }));
        let pipeline = pipeline(2000.0, extractor, Arc::clone(&client));

        let events = Mutex::new(Vec::new());
        let observer = |p: Progress| events.lock().unwrap().push(p);
        let transcript = pipeline
            .transcribe_file(&media, None, dir.path(), &observer)
            .await
            .unwrap();

        assert_eq!(transcript.failed_chunks, vec![1]);
        assert!(
            transcript
                .text
                .contains("[Transcription failed for audio from 566.4s to 1137.9s]")
        );
        // Three attempts for the failing chunk, one for each of the other three
        assert_eq!(client.call_count(), 6);
        assert!(events.lock().unwrap().iter().any(|p| matches!(
            p,
            Progress::ChunkFailed { index: 1, total: 4, .. }
        )));
    }

    #[tokio::test]
    async fn test_all_chunks_failing_is_job_failure() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "noise.mp3", 70 * MIB);
        let extractor = Arc::new(FakeExtractor::new(|_| MIB));
        let client = Arc::new(MockClient::new().with_failure(TranscriptionError::Fatal {
            message: "Invalid file format".to_string(),
        }));
        let pipeline = pipeline(2000.0, extractor, client);

        let err = pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::AllChunksFailed { chunks: 4 }));
        assert!(err.to_string().contains("may be corrupted or unsupported"));
    }

    #[tokio::test]
    async fn test_single_call_failure_is_job_failure() {
        let dir = TempDir::new().unwrap();
        let media = media_file(&dir, "memo.wav", 4096);
        let client = Arc::new(MockClient::new().with_failure(TranscriptionError::Fatal {
            message: "401".to_string(),
        }));
        let pipeline = pipeline(30.0, Arc::new(FakeExtractor::new(|_| 1)), client);

        let result = pipeline
            .transcribe_file(&media, None, dir.path(), &NoProgress)
            .await;
        assert!(matches!(result, Err(ScribeError::AllChunksFailed { chunks: 1 })));
    }

    #[tokio::test]
    async fn test_long_small_file_is_still_chunked() {
        let dir = TempDir::new().unwrap();
        // 2 hours in 5 MiB: under the upload limit but over the single-call duration
        let media = media_file(&dir, "podcast.mp3", 5 * MIB);
        let extractor = Arc::new(FakeExtractor::new(|_| MIB));
        let pipeline = pipeline(7200.0, Arc::clone(&extractor), Arc::new(MockClient::new()));

        let events = Mutex::new(Vec::new());
        let observer = |p: Progress| events.lock().unwrap().push(p);
        pipeline
            .transcribe_file(&media, None, dir.path(), &observer)
            .await
            .unwrap();

        assert_eq!(extractor.calls().len(), 13);
        assert!(events.lock().unwrap().contains(&Progress::Planned {
            chunks: 13,
            degraded_coverage: false
        }));
    }
}
