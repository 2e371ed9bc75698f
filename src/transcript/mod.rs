//! Final transcripts: stitching, statistics and saving to disk.

pub mod stitcher;

pub use stitcher::{SegmentStitcher, stitch};

use crate::error::Result;
use crate::media::MediaSource;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Summary numbers reported alongside a finished transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptStats {
    pub words: usize,
    pub characters: usize,
    /// Duration of the source media in seconds.
    pub duration_secs: f64,
}

impl TranscriptStats {
    pub fn compute(text: &str, duration_secs: f64) -> Self {
        Self {
            words: text.split_whitespace().count(),
            characters: text.chars().count(),
            duration_secs,
        }
    }
}

/// A finished transcript and what it took to produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub stats: TranscriptStats,
    /// Number of chunks the media was split into (1 for a single call).
    pub chunk_count: usize,
    /// Indices of chunks that ended as placeholders.
    pub failed_chunks: Vec<usize>,
    /// Indices of chunks flagged for implausibly little text.
    pub suspicious_chunks: Vec<usize>,
    /// True if the chunk plan needed coverage repair.
    pub degraded_coverage: bool,
}

impl Transcript {
    pub fn is_partial(&self) -> bool {
        !self.failed_chunks.is_empty()
    }
}

/// File stem used when saving the transcript of `source`.
///
/// Local files keep their own stem; URLs use their last path segment.
/// Characters outside `[A-Za-z0-9_-]` become underscores.
pub fn transcript_stem(source: &MediaSource) -> String {
    let raw = match source {
        MediaSource::LocalFile { path, .. } => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        MediaSource::RemoteUrl { url } => reqwest::Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
            })
            .map(|segment| {
                Path::new(&segment)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or(segment)
            })
            .unwrap_or_default(),
    };

    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches('_');
    if sanitized.is_empty() {
        "transcript".to_string()
    } else {
        sanitized.to_string()
    }
}

/// `<stem>_<YYYYmmdd_HHMMSS>.txt`
pub fn transcript_file_name(stem: &str, at: &DateTime<Local>) -> String {
    format!("{}_{}.txt", stem, at.format("%Y%m%d_%H%M%S"))
}

/// Writes `text` into `dir` under a timestamped name and returns the path.
pub fn save_transcript(dir: &Path, stem: &str, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(transcript_file_name(stem, &Local::now()));
    std::fs::write(&path, text)?;
    tracing::info!(path = %path.display(), "saved transcript");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_stats_count_words_and_chars() {
        let stats = TranscriptStats::compute("Héllo  there,\nworld", 12.5);
        assert_eq!(stats.words, 3);
        assert_eq!(stats.characters, 19);
        assert_eq!(stats.duration_secs, 12.5);
    }

    #[test]
    fn test_file_name_format() {
        let at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(transcript_file_name("standup", &at), "standup_20260307_090501.txt");
    }

    #[test]
    fn test_stem_from_local_file() {
        let source = MediaSource::LocalFile {
            path: PathBuf::from("/media/Team Sync (March).mp4"),
            persistent: true,
        };
        assert_eq!(transcript_stem(&source), "Team_Sync__March");
    }

    #[test]
    fn test_stem_from_url() {
        let source = MediaSource::RemoteUrl {
            url: "https://cdn.example.com/podcasts/episode-42.mp3?token=abc".to_string(),
        };
        assert_eq!(transcript_stem(&source), "episode-42");

        let bare = MediaSource::RemoteUrl {
            url: "https://youtu.be/".to_string(),
        };
        assert_eq!(transcript_stem(&bare), "transcript");
    }

    #[test]
    fn test_save_transcript_writes_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/out");
        let path = save_transcript(&out, "talk", "hello world").unwrap();

        assert!(path.starts_with(&out));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("talk_") && name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");
    }
}
