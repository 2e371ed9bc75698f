//! Chat-completion boundary used for summaries, with the HTTP client and a
//! mock.

use crate::config::SummaryConfig;
use crate::defaults;
use crate::error::{Result, ScribeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a chat model answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    /// Model that actually served the request.
    pub model: String,
}

/// A single-turn chat model: one system prompt, one user message.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply> {
        (**self).complete(system, user).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: [Message<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicClient {
    /// Builds a client from the `[summary]` config section.
    ///
    /// Unlike the transcription engine, the summary endpoint always needs a
    /// key; a missing one makes summaries unavailable.
    pub fn from_config(config: &SummaryConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ScribeError::SummaryUnavailable {
                reason: format!("{} is not set", config.api_key_env),
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ScribeError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply> {
        let body = MessagesRequest {
            model: &self.model,
            system,
            messages: [Message {
                role: "user",
                content: user,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, chars = user.len(), "sending summary request");
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", defaults::SUMMARY_API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScribeError::Summary {
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScribeError::Summary {
                message: format!("{}: {}", status, body.trim()),
            });
        }

        let reply: MessagesResponse = response.json().await.map_err(|e| ScribeError::Summary {
            message: format!("unreadable response: {}", e),
        })?;
        let text = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ScribeError::Summary {
                message: "response contained no text".to_string(),
            });
        }

        Ok(ChatReply {
            text,
            model: reply.model,
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// One recorded [`MockChatClient`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockChatCall {
    pub system: String,
    pub user: String,
}

/// Mock chat client for testing.
///
/// Answers every call with a fixed reply (or a fixed failure) and records
/// the prompts it was given.
#[derive(Clone)]
pub struct MockChatClient {
    reply: std::result::Result<String, String>,
    calls: Arc<Mutex<Vec<MockChatCall>>>,
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatClient {
    /// Create a new mock that answers "mock summary"
    pub fn new() -> Self {
        Self {
            reply: Ok("mock summary".to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Ok(reply.to_string());
        self
    }

    /// Fail every call with `message`
    pub fn with_failure(mut self, message: &str) -> Self {
        self.reply = Err(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<MockChatCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockChatCall {
                system: system.to_string(),
                user: user.to_string(),
            });
        }
        match &self.reply {
            Ok(text) => Ok(ChatReply {
                text: text.clone(),
                model: "mock".to_string(),
            }),
            Err(message) => Err(ScribeError::Summary {
                message: message.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn client(endpoint: &str) -> AnthropicClient {
        AnthropicClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            model: "test-model".to_string(),
            api_key: "secret".to_string(),
            max_tokens: 128,
            temperature: 0.3,
        }
    }

    /// Answers one request with `status` and `body`, sending the raw request back.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 8192];
            // The JSON body ends with its closing brace
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if String::from_utf8_lossy(&request).trim_end().ends_with('}') {
                    break;
                }
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });
        (format!("http://{}/v1/messages", addr), rx)
    }

    #[tokio::test]
    async fn test_reply_text_blocks_are_joined() {
        let (endpoint, request) = serve_once(
            "200 OK",
            r#"{"model":"served-model","content":[{"type":"text","text":"Key points: "},{"type":"text","text":"budget approved."}]}"#,
        )
        .await;

        let reply = client(&endpoint)
            .complete("Summarize in English.", "Transcription to summarize:\nhello")
            .await
            .unwrap();
        assert_eq!(reply.text, "Key points: budget approved.");
        assert_eq!(reply.model, "served-model");

        let request = request.await.unwrap().to_lowercase();
        assert!(request.contains("x-api-key: secret"));
        assert!(request.contains("anthropic-version: 2023-06-01"));
        assert!(request.contains(r#""system":"summarize in english.""#));
        assert!(request.contains(r#""max_tokens":128"#));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (endpoint, _request) =
            serve_once("401 Unauthorized", r#"{"error":{"message":"invalid x-api-key"}}"#).await;

        match client(&endpoint).complete("s", "u").await {
            Err(ScribeError::Summary { message }) => {
                assert!(message.contains("401"));
                assert!(message.contains("invalid x-api-key"));
            }
            other => panic!("Expected summary error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let (endpoint, _request) = serve_once("200 OK", r#"{"model":"m","content":[]}"#).await;
        assert!(client(&endpoint).complete("s", "u").await.is_err());
    }

    #[test]
    fn test_missing_key_makes_client_unavailable() {
        let config = SummaryConfig {
            api_key_env: "LONGSCRIBE_TEST_UNSET_SUMMARY_KEY".to_string(),
            ..SummaryConfig::default()
        };
        assert!(matches!(
            AnthropicClient::from_config(&config),
            Err(ScribeError::SummaryUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let mock = MockChatClient::new().with_reply("short");
        let reply = mock.complete("system", "user").await.unwrap();
        assert_eq!(reply.text, "short");
        assert_eq!(
            mock.calls(),
            vec![MockChatCall {
                system: "system".to_string(),
                user: "user".to_string()
            }]
        );

        let failing = MockChatClient::new().with_failure("overloaded");
        assert!(failing.complete("s", "u").await.is_err());
    }
}
