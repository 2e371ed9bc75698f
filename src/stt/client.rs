use crate::defaults;
use crate::error::TranscriptionError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Speech-to-text engine that accepts one audio file per call.
///
/// This trait allows swapping implementations (remote API vs mock).
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    /// Transcribe the audio file at `audio`.
    ///
    /// # Arguments
    /// * `audio` - Path to an encoded audio file no larger than [`max_upload_bytes`](Self::max_upload_bytes)
    /// * `prompt` - Optional context passed to the engine (vocabulary, speaker names)
    ///
    /// # Returns
    /// Transcribed text, or an error classified as transient or fatal
    async fn transcribe(
        &self,
        audio: &Path,
        prompt: Option<&str>,
    ) -> Result<String, TranscriptionError>;

    /// Engine or model name for logs.
    fn name(&self) -> &str;

    /// Largest file accepted per call. Larger inputs are rejected with
    /// `PayloadTooLarge` without contacting the engine.
    fn max_upload_bytes(&self) -> u64;
}

/// Implement TranscriptionClient for Arc<T> so one client can be shared by every worker.
#[async_trait]
impl<T: TranscriptionClient + ?Sized> TranscriptionClient for Arc<T> {
    async fn transcribe(
        &self,
        audio: &Path,
        prompt: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        (**self).transcribe(audio, prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn max_upload_bytes(&self) -> u64 {
        (**self).max_upload_bytes()
    }
}

/// Checks `audio` against `limit` before any upload.
pub(crate) fn check_payload_size(audio: &Path, limit: u64) -> Result<u64, TranscriptionError> {
    let size = std::fs::metadata(audio)
        .map_err(|e| TranscriptionError::Fatal {
            message: format!("cannot read {}: {}", audio.display(), e),
        })?
        .len();
    if size > limit {
        return Err(TranscriptionError::PayloadTooLarge { size, limit });
    }
    Ok(size)
}

type Handler =
    Arc<dyn Fn(&Path, Option<&str>) -> Result<String, TranscriptionError> + Send + Sync>;

/// One recorded call to a [`MockClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub audio: PathBuf,
    pub prompt: Option<String>,
}

/// Mock client for testing.
///
/// Answers from a script of queued results first, then from a handler
/// (which defaults to a fixed response). Every call is recorded.
#[derive(Clone)]
pub struct MockClient {
    name: String,
    handler: Handler,
    script: Arc<Mutex<VecDeque<Result<String, TranscriptionError>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    max_upload_bytes: u64,
    delay: Duration,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// Create a new mock client that returns "mock transcription"
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            handler: Arc::new(|_, _| Ok("mock transcription".to_string())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            delay: Duration::ZERO,
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(self, response: &str) -> Self {
        let response = response.to_string();
        self.with_handler(move |_, _| Ok(response.clone()))
    }

    /// Configure the mock to always fail with `error`
    pub fn with_failure(self, error: TranscriptionError) -> Self {
        self.with_handler(move |_, _| Err(error.clone()))
    }

    /// Compute each answer from the audio path and prompt
    pub fn with_handler(
        mut self,
        handler: impl Fn(&Path, Option<&str>) -> Result<String, TranscriptionError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Answer the next calls with `results`, in order, before falling back
    /// to the handler
    pub fn with_script(self, results: Vec<Result<String, TranscriptionError>>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(results);
        }
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptionClient for MockClient {
    async fn transcribe(
        &self,
        audio: &Path,
        prompt: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                audio: audio.to_path_buf(),
                prompt: prompt.map(str::to_string),
            });
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if audio.exists() {
            check_payload_size(audio, self.max_upload_bytes)?;
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(result) => result,
            None => (self.handler)(audio, prompt),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }
}
