//! Per-chunk retry wrapper around a [`TranscriptionClient`].
//!
//! A chunk that keeps failing degrades to a placeholder segment instead of
//! failing the whole job.

use crate::chunking::Chunk;
use crate::config::RetryConfig;
use crate::defaults;
use crate::stt::client::TranscriptionClient;
use crate::stt::segment::Segment;
use std::time::Duration;

/// How many times to call the engine per chunk and when to distrust the result.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub attempt_budget: u32,
    pub retry_delay: Duration,
    pub min_chars_per_sec: f64,
    pub plausibility_min_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_budget: defaults::ATTEMPT_BUDGET,
            retry_delay: Duration::from_millis(defaults::RETRY_DELAY_MS),
            min_chars_per_sec: defaults::MIN_CHARS_PER_SEC,
            plausibility_min_secs: defaults::PLAUSIBILITY_MIN_SECS,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempt_budget: config.attempt_budget,
            retry_delay: config.retry_delay(),
            min_chars_per_sec: config.min_chars_per_sec,
            plausibility_min_secs: config.plausibility_min_secs,
        }
    }
}

impl RetryPolicy {
    /// True if `text` is too short to plausibly cover `duration_secs` of speech.
    pub fn is_implausible(&self, text: &str, duration_secs: f64) -> bool {
        if duration_secs <= self.plausibility_min_secs {
            return false;
        }
        let chars = text.trim().chars().count() as f64;
        chars / duration_secs < self.min_chars_per_sec
    }
}

/// Prompt sent with chunk `index` of `total`.
///
/// Multi-chunk jobs get a positional hint appended to the caller's prompt.
/// Without a caller prompt nothing is sent.
pub fn chunk_prompt(prompt: Option<&str>, index: usize, total: usize) -> Option<String> {
    let prompt = prompt.map(str::trim).filter(|p| !p.is_empty())?;
    if total > 1 {
        Some(format!(
            "{}\n\nThis is part {} of {} of the full audio.",
            prompt,
            index + 1,
            total
        ))
    } else {
        Some(prompt.to_string())
    }
}

/// Transcribes chunks with a bounded number of attempts each.
pub struct RetryingTranscriber<C: TranscriptionClient> {
    client: C,
    policy: RetryPolicy,
}

impl<C: TranscriptionClient> RetryingTranscriber<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Transcribes one chunk of a `total_chunks`-chunk job.
    ///
    /// Never fails: transient errors are retried until the attempt budget is
    /// spent, fatal errors stop at once, and either way the result is a
    /// failed segment carrying the last error.
    pub async fn transcribe_chunk(
        &self,
        chunk: &Chunk,
        prompt: Option<&str>,
        total_chunks: usize,
    ) -> Segment {
        let prompt = chunk_prompt(prompt, chunk.index, total_chunks);
        let budget = self.policy.attempt_budget.max(1);
        let mut last_error = None;

        for attempt in 1..=budget {
            match self.client.transcribe(&chunk.path, prompt.as_deref()).await {
                Ok(text) => {
                    let text = text.trim().to_string();
                    let duration = chunk.interval.duration_secs();
                    let suspicious = self.policy.is_implausible(&text, duration);
                    if suspicious {
                        tracing::warn!(
                            chunk = chunk.index,
                            chars = text.chars().count(),
                            duration_secs = duration,
                            "suspiciously little text for chunk duration"
                        );
                    }
                    tracing::debug!(chunk = chunk.index, attempt, "chunk transcribed");
                    return Segment::transcribed(chunk.index, chunk.interval, text)
                        .with_suspicious(suspicious);
                }
                Err(e) if e.is_transient() && attempt < budget => {
                    tracing::warn!(
                        chunk = chunk.index,
                        attempt,
                        budget,
                        error = %e,
                        "transcription attempt failed, retrying"
                    );
                    last_error = Some(e);
                    if !self.policy.retry_delay.is_zero() {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(chunk = chunk.index, attempt, error = %e, "giving up on chunk");
                    last_error = Some(e);
                    break;
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        Segment::failed(chunk.index, chunk.interval, reason)
    }
}
