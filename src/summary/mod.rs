//! Transcript summaries through a chat model.
//!
//! A summary is written in one of the languages [`SummaryResources`] has a
//! system prompt for. A previous summary plus feedback turns the request into
//! a refinement of that summary.

pub mod client;
pub mod resources;

pub use client::{AnthropicClient, ChatClient, ChatReply, MockChatCall, MockChatClient};
pub use resources::SummaryResources;

use crate::config::SummaryConfig;
use crate::error::{Result, ScribeError};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to summarize and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryRequest {
    pub transcript: String,
    pub language: String,
    /// Extra instructions from the user, e.g. "focus on decisions".
    pub instructions: Option<String>,
    pub previous_summary: Option<String>,
    pub feedback: Option<String>,
}

impl SummaryRequest {
    pub fn new(transcript: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = non_blank(instructions.into());
        self
    }

    /// Ask for `previous` to be revised according to `feedback`.
    pub fn refining(mut self, previous: impl Into<String>, feedback: impl Into<String>) -> Self {
        self.previous_summary = non_blank(previous.into());
        self.feedback = non_blank(feedback.into());
        self
    }

    /// Refinement needs both a previous summary and feedback.
    pub fn is_refinement(&self) -> bool {
        self.previous_summary.is_some() && self.feedback.is_some()
    }

    /// The user message sent to the model.
    pub fn user_prompt(&self) -> String {
        let mut parts = Vec::new();
        if let (Some(previous), Some(feedback)) = (&self.previous_summary, &self.feedback) {
            parts.push(format!("Previous summary:\n{}\n", previous));
            parts.push(format!("User feedback:\n{}\n", feedback));
            parts.push(
                "Please refine the summary based on the feedback while maintaining accuracy \
                 to the original transcription.\n"
                    .to_string(),
            );
        }
        if let Some(instructions) = &self.instructions {
            parts.push(format!("Additional instructions:\n{}\n", instructions));
        }
        parts.push(format!("Transcription to summarize:\n{}", self.transcript));
        parts.join("\n")
    }
}

fn non_blank(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

/// A generated summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub text: String,
    pub language: String,
    pub model: String,
    pub refinement: bool,
    pub instructions_used: bool,
    pub created_at: DateTime<Local>,
}

/// Turns transcripts into summaries with a [`ChatClient`].
pub struct Summarizer {
    client: Arc<dyn ChatClient>,
    resources: SummaryResources,
}

impl Summarizer {
    pub fn new(client: Arc<dyn ChatClient>, resources: SummaryResources) -> Self {
        Self { client, resources }
    }

    /// Production wiring: the Messages API client and resources from
    /// `resources_dir`.
    pub fn from_config(config: &SummaryConfig) -> Result<Self> {
        let client = AnthropicClient::from_config(config)?;
        let resources = SummaryResources::load(&config.resources_dir())?;
        Ok(Self::new(Arc::new(client), resources))
    }

    pub fn languages(&self) -> Vec<&str> {
        self.resources.languages()
    }

    pub async fn summarize(&self, request: &SummaryRequest) -> Result<Summary> {
        if request.transcript.trim().is_empty() {
            return Err(ScribeError::Summary {
                message: "transcript is empty".to_string(),
            });
        }
        let system = self.resources.system_prompt(&request.language)?;

        tracing::info!(
            language = %request.language,
            model = %self.client.name(),
            refinement = request.is_refinement(),
            chars = request.transcript.len(),
            "summarizing transcript"
        );
        let reply = self.client.complete(&system, &request.user_prompt()).await?;

        Ok(Summary {
            text: reply.text.trim().to_string(),
            language: request.language.clone(),
            model: reply.model,
            refinement: request.is_refinement(),
            instructions_used: request.instructions.is_some(),
            created_at: Local::now(),
        })
    }
}

/// `<stem>_summary_<lang>_<YYYYmmdd_HHMMSS>.txt`
pub fn summary_file_name(stem: &str, language: &str, at: &DateTime<Local>) -> String {
    format!("{}_summary_{}_{}.txt", stem, language, at.format("%Y%m%d_%H%M%S"))
}

/// Writes `summary` into `dir` and returns the path.
pub fn save_summary(dir: &Path, stem: &str, summary: &Summary) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(summary_file_name(stem, &summary.language, &summary.created_at));
    std::fs::write(&path, &summary.text)?;
    tracing::info!(path = %path.display(), "saved summary");
    Ok(path)
}
