//! Speech-to-text: the engine boundary, the HTTP client and per-chunk retries.

pub mod client;
pub mod openai;
pub mod retrying;
pub mod segment;

pub use client::{MockCall, MockClient, TranscriptionClient};
pub use openai::OpenAiClient;
pub use retrying::{RetryPolicy, RetryingTranscriber, chunk_prompt};
pub use segment::{Segment, SegmentKind, placeholder};
