//! Default configuration constants for longscribe.
//!
//! Shared by the config types, the planner and the CLI so the numbers live in
//! one place.

/// One mebibyte in bytes.
pub const MIB: u64 = 1024 * 1024;

/// Hard per-call upload ceiling of the transcription engine (25 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 25 * MIB;

/// Byte size each chunk is planned to hit.
///
/// Kept below [`MAX_UPLOAD_BYTES`] so bitrate variance rarely forces a re-plan.
pub const TARGET_CHUNK_MB: f64 = 20.0;

/// Temporal overlap between adjacent chunks in seconds.
pub const OVERLAP_SECS: f64 = 5.0;

/// Upper bound on a single chunk's duration in seconds (10 minutes).
pub const MAX_CHUNK_SECS: f64 = 600.0;

/// Longest file sent to the engine in one call (30 minutes).
pub const SINGLE_CALL_MAX_SECS: f64 = 1800.0;

/// Factor applied to the chunk byte target when a chunk comes out too large.
pub const SHRINK_FACTOR: f64 = 0.8;

/// Re-plans allowed before an oversized chunk becomes fatal.
pub const MAX_SHRINK_ATTEMPTS: u32 = 5;

/// Bitrate of extracted MP3 chunks.
pub const CHUNK_BITRATE: &str = "128k";

/// Transcription calls per chunk before it degrades to a placeholder.
pub const ATTEMPT_BUDGET: u32 = 3;

/// Pause between attempts on the same chunk in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Below this many characters per second a chunk's text is flagged as suspicious.
pub const MIN_CHARS_PER_SEC: f64 = 5.0;

/// Chunks shorter than this (seconds) are never flagged as suspicious.
pub const PLAUSIBILITY_MIN_SECS: f64 = 10.0;

/// Characters inspected on each side of a chunk boundary while stitching.
pub const STITCH_WINDOW_CHARS: usize = 500;

/// Shortest shared word run accepted as a real overlap.
pub const MIN_OVERLAP_WORDS: usize = 4;

/// Jobs processed concurrently by the worker pool.
pub const MAX_PARALLEL_JOBS: usize = 3;

/// Delete attempts for a temporary file before giving up.
pub const CLEANUP_ATTEMPTS: u32 = 5;

/// Pause between delete attempts in milliseconds.
pub const CLEANUP_RETRY_DELAY_MS: u64 = 1000;

/// Default transcription engine endpoint (OpenAI-compatible).
pub const ENGINE_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default transcription model name.
pub const ENGINE_MODEL: &str = "whisper-1";

/// Environment variable holding the engine API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Per-request timeout for the engine in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Default summary endpoint (Anthropic Messages API).
pub const SUMMARY_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default summary model name.
pub const SUMMARY_MODEL: &str = "claude-sonnet-4-20250514";

/// Environment variable holding the summary API key.
pub const SUMMARY_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Messages API version header value.
pub const SUMMARY_API_VERSION: &str = "2023-06-01";

/// Upper bound on summary length in tokens.
pub const SUMMARY_MAX_TOKENS: u32 = 4096;

/// Sampling temperature for summaries.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Per-request timeout for the summary endpoint in seconds.
pub const SUMMARY_TIMEOUT_SECS: u64 = 300;

/// Summary language used when none is given.
pub const SUMMARY_LANGUAGE: &str = "en";

/// File extensions accepted as media input.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm", "mkv", "avi", "mov", "ogg", "flac",
];

/// Returns true if `ext` (without the dot, any case) is a supported media extension.
pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Containers the engine decodes itself. Other supported inputs are
/// re-encoded before a single-call upload.
pub const ENGINE_NATIVE_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm", "ogg", "flac",
];

/// Returns true if the engine accepts files with extension `ext` as-is.
pub fn is_engine_native_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    ENGINE_NATIVE_EXTENSIONS.contains(&ext.as_str())
}
