//! longscribe - transcription of long recordings
//!
//! Splits audio and video that exceed a speech-to-text engine's upload limit
//! into overlapping chunks, transcribes them with retries, and stitches the
//! results back into one transcript. A bounded worker pool runs many such
//! jobs at once and can summarize each transcript with a chat model.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod chunking;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod media;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod stt;
pub mod summary;
pub mod transcript;

// Boundaries (probe → extract → transcribe)
pub use chunking::{ChunkExtractor, ChunkPlan, ChunkPlanner};
pub use media::{CommandExecutor, DurationProbe, MediaResolver, SystemCommandExecutor};
pub use stt::TranscriptionClient;

// Pipeline and queue
pub use pipeline::TranscriptionPipeline;
pub use queue::{Job, JobEvent, JobEventKind, NotificationSink, WorkerPool};
pub use summary::{Summarizer, SummaryRequest};

// Error handling
pub use error::{Result, ScribeError, TranscriptionError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
