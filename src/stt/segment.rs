use crate::chunking::Interval;

/// Outcome of transcribing one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    /// Text returned by the engine. `suspicious` marks implausibly little
    /// text for the chunk's duration.
    Transcribed { text: String, suspicious: bool },
    /// Every attempt failed; `reason` is the last error.
    Failed { reason: String },
}

/// Text (or a failure marker) for one chunk index.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub interval: Interval,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn transcribed(index: usize, interval: Interval, text: impl Into<String>) -> Self {
        Self {
            index,
            interval,
            kind: SegmentKind::Transcribed {
                text: text.into(),
                suspicious: false,
            },
        }
    }

    pub fn failed(index: usize, interval: Interval, reason: impl Into<String>) -> Self {
        Self {
            index,
            interval,
            kind: SegmentKind::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn with_suspicious(mut self, flag: bool) -> Self {
        if let SegmentKind::Transcribed { suspicious, .. } = &mut self.kind {
            *suspicious = flag;
        }
        self
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, SegmentKind::Failed { .. })
    }

    pub fn is_suspicious(&self) -> bool {
        matches!(self.kind, SegmentKind::Transcribed { suspicious: true, .. })
    }

    /// Transcribed text, or the placeholder for a failed chunk.
    pub fn text(&self) -> String {
        match &self.kind {
            SegmentKind::Transcribed { text, .. } => text.clone(),
            SegmentKind::Failed { .. } => placeholder(self.interval),
        }
    }
}

/// Marker inserted into the transcript where a chunk could not be transcribed.
pub fn placeholder(interval: Interval) -> String {
    format!(
        "[Transcription failed for audio from {:.1}s to {:.1}s]",
        interval.start_secs(),
        interval.end_secs()
    )
}
