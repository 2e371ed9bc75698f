//! Error types for longscribe.

use thiserror::Error;

/// Failure reported by a transcription engine for a single call.
///
/// The split between transient and fatal drives the per-chunk retry policy:
/// transient failures consume an attempt and try again, fatal ones stop at once.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    /// Network error, timeout, rate limit or engine-side hiccup.
    #[error("Transient transcription failure: {message}")]
    Transient { message: String },

    /// Request the engine will never accept (bad credentials, malformed audio).
    #[error("Transcription rejected: {message}")]
    Fatal { message: String },

    /// Input exceeds the engine's documented per-call ceiling.
    #[error("Audio payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },
}

impl TranscriptionError {
    /// Returns true if another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TranscriptionError::Transient { .. })
    }
}

#[derive(Error, Debug)]
pub enum ScribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input errors
    #[error("Unsupported input {path}: {reason}")]
    UnsupportedInput { path: String, reason: String },

    #[error("Could not determine duration of {path}: {message}")]
    DurationUnavailable { path: String, message: String },

    // Media tooling errors
    #[error("Media tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Failed to resolve media source {source_ref}: {message}")]
    MediaResolve { source_ref: String, message: String },

    // Chunking errors
    #[error("Cannot plan chunks: {message}")]
    InvalidChunkPlan { message: String },

    #[error(
        "Chunks still exceed the {limit} byte limit after {attempts} shrink attempts (largest: {largest} bytes)"
    )]
    ChunkSizeNotConverged {
        attempts: u32,
        largest: u64,
        limit: u64,
    },

    // Transcription errors
    #[error(
        "All {chunks} chunks failed to transcribe. Audio may be corrupted or unsupported."
    )]
    AllChunksFailed { chunks: usize },

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    // Summary errors
    #[error("Summarization not available: {reason}")]
    SummaryUnavailable { reason: String },

    #[error("Unsupported summary language {language}. Supported: {supported}")]
    UnsupportedSummaryLanguage { language: String, supported: String },

    #[error("Failed to generate summary: {message}")]
    Summary { message: String },

    // Queue errors
    #[error("Worker pool is shut down")]
    PoolClosed,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScribeError>;
