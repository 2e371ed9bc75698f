use crate::media::MediaSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier assigned to a job when it is submitted.
pub type JobId = u64;

/// One end-to-end transcription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque id of whoever receives this job's events (a chat, a terminal).
    pub destination: String,
    pub source: MediaSource,
    /// Context for the engine, e.g. speaker names or domain vocabulary.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Cookie file passed to downloaders for sources behind a login.
    #[serde(default)]
    pub cookies: Option<PathBuf>,
    /// Where to save `<stem>_<timestamp>.txt`. Nothing is saved when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Summarize the transcript once it is done.
    #[serde(default)]
    pub summary: Option<SummaryOptions>,
}

/// Per-job summary settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOptions {
    pub language: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Job {
    fn new(destination: impl Into<String>, source: MediaSource) -> Self {
        Self {
            destination: destination.into(),
            source,
            prompt: None,
            cookies: None,
            output_dir: None,
            summary: None,
        }
    }

    /// A file the caller owns. It is never deleted.
    pub fn from_file(destination: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(
            destination,
            MediaSource::LocalFile {
                path: path.into(),
                persistent: true,
            },
        )
    }

    /// A file handed over to the pool (an upload). It is deleted once the
    /// job finishes, whatever the outcome.
    pub fn from_upload(destination: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(
            destination,
            MediaSource::LocalFile {
                path: path.into(),
                persistent: false,
            },
        )
    }

    pub fn from_url(destination: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(destination, MediaSource::RemoteUrl { url: url.into() })
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn with_cookies(mut self, cookies: impl Into<PathBuf>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Also summarize the transcript in `language`.
    pub fn with_summary(mut self, language: impl Into<String>, instructions: Option<String>) -> Self {
        self.summary = Some(SummaryOptions {
            language: language.into(),
            instructions: instructions.filter(|i| !i.trim().is_empty()),
        });
        self
    }

    pub fn is_remote(&self) -> bool {
        self.source.is_remote()
    }
}
