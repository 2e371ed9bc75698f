//! Client for OpenAI-compatible `/v1/audio/transcriptions` endpoints.

use crate::config::EngineConfig;
use crate::error::{Result, ScribeError, TranscriptionError};
use crate::media::probe::extension_of;
use crate::stt::client::{TranscriptionClient, check_payload_size};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

/// Remote transcription over multipart HTTP.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    language: Option<String>,
    api_key: Option<String>,
    max_upload_bytes: u64,
}

impl OpenAiClient {
    /// Builds a client from the `[engine]` config section.
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`. A missing key is allowed for local servers that don't
    /// authenticate.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "no API key set, sending unauthenticated requests"
            );
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ScribeError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
            api_key,
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    fn build_form(&self, audio: &Path, bytes: Vec<u8>, prompt: Option<&str>) -> std::result::Result<Form, TranscriptionError> {
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let mime = mime_for(audio);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| TranscriptionError::Fatal {
                message: format!("invalid mime type {}: {}", mime, e),
            })?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", part);
        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt.to_string());
        }
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl TranscriptionClient for OpenAiClient {
    async fn transcribe(
        &self,
        audio: &Path,
        prompt: Option<&str>,
    ) -> std::result::Result<String, TranscriptionError> {
        let size = check_payload_size(audio, self.max_upload_bytes)?;
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| TranscriptionError::Fatal {
                message: format!("cannot read {}: {}", audio.display(), e),
            })?;
        let form = self.build_form(audio, bytes, prompt)?;

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(file = %audio.display(), size, model = %self.model, "sending transcription request");
        let response = request.send().await.map_err(|e| TranscriptionError::Transient {
            message: describe_send_error(&e),
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Transient {
                message: format!("failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(classify_status(status, &body, size, self.max_upload_bytes));
        }
        Ok(body.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }
}

/// Maps a non-success HTTP status to the retry taxonomy.
pub fn classify_status(status: StatusCode, body: &str, size: u64, limit: u64) -> TranscriptionError {
    let message = format!("{}: {}", status, body.trim());
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => TranscriptionError::PayloadTooLarge { size, limit },
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            TranscriptionError::Transient { message }
        }
        s if s.is_server_error() => TranscriptionError::Transient { message },
        _ => TranscriptionError::Fatal { message },
    }
}

fn describe_send_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match extension_of(path).as_deref() {
        Some("mp3" | "mpga" | "mpeg") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("mp4") => "video/mp4",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}
