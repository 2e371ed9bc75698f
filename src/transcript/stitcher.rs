//! Merges per-chunk segments into one transcript.
//!
//! Adjacent chunks share a few seconds of audio, so the end of one segment
//! usually repeats at the start of the next. The stitcher looks for the
//! longest run of words the two boundary windows have in common and keeps it
//! once. Without such a run the texts are joined with a single space.

use crate::config::StitchingConfig;
use crate::defaults;
use crate::stt::{Segment, SegmentKind};

/// Configurable boundary deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStitcher {
    /// Characters inspected at the end of the accumulator and at the start of
    /// the next segment.
    window_chars: usize,
    /// Shortest word run accepted as a genuine overlap.
    min_overlap_words: usize,
}

impl Default for SegmentStitcher {
    fn default() -> Self {
        Self::new(defaults::STITCH_WINDOW_CHARS, defaults::MIN_OVERLAP_WORDS)
    }
}

impl From<&StitchingConfig> for SegmentStitcher {
    fn from(config: &StitchingConfig) -> Self {
        Self::new(config.window_chars, config.min_overlap_words)
    }
}

impl SegmentStitcher {
    pub fn new(window_chars: usize, min_overlap_words: usize) -> Self {
        Self {
            window_chars,
            min_overlap_words: min_overlap_words.max(1),
        }
    }

    /// Stitches segments in the order given (which must be index order).
    ///
    /// Failed segments contribute their placeholder and are never matched
    /// against. Whitespace-only transcriptions are skipped.
    pub fn stitch(&self, segments: &[Segment]) -> String {
        let pieces = segments.iter().filter_map(|segment| match &segment.kind {
            SegmentKind::Transcribed { text, .. } => {
                (!text.trim().is_empty()).then(|| Piece::Text(text.clone()))
            }
            SegmentKind::Failed { .. } => Some(Piece::Placeholder(segment.text())),
        });
        self.stitch_pieces(pieces)
    }

    /// Stitches plain texts, all treated as real transcriptions.
    pub fn stitch_texts(&self, texts: &[&str]) -> String {
        let pieces = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Piece::Text(t.to_string()));
        self.stitch_pieces(pieces)
    }

    fn stitch_pieces(&self, pieces: impl Iterator<Item = Piece>) -> String {
        let mut pieces: Vec<Piece> = pieces.collect();
        // A lone segment is returned as transcribed
        if let [Piece::Text(only)] = pieces.as_mut_slice() {
            return std::mem::take(only);
        }

        let mut acc = String::new();
        let mut last_was_placeholder = false;

        for piece in pieces {
            let (text, is_placeholder) = match piece {
                Piece::Text(t) => (t.trim().to_string(), false),
                Piece::Placeholder(t) => (t, true),
            };

            if acc.is_empty() {
                acc = text;
            } else if last_was_placeholder || is_placeholder {
                acc.push(' ');
                acc.push_str(&text);
            } else {
                self.merge(&mut acc, &text);
            }
            last_was_placeholder = is_placeholder;
        }

        acc
    }

    /// Appends `next` to `acc`, collapsing a shared boundary run if one exists.
    fn merge(&self, acc: &mut String, next: &str) {
        match self.find_overlap(acc, next) {
            Some((acc_cut, next_start)) => {
                tracing::debug!(
                    dropped_chars = acc.len() - acc_cut,
                    "collapsed overlapping text at chunk boundary"
                );
                acc.truncate(acc_cut);
                acc.push_str(&next[next_start..]);
            }
            None => {
                acc.push(' ');
                acc.push_str(next);
            }
        }
    }

    /// Byte offsets `(in acc, in next)` where the longest shared word run
    /// starts, if it is at least `min_overlap_words` long.
    fn find_overlap(&self, acc: &str, next: &str) -> Option<(usize, usize)> {
        let tail = tail_words(acc, self.window_chars);
        let head = head_words(next, self.window_chars);
        if tail.len() < self.min_overlap_words || head.len() < self.min_overlap_words {
            return None;
        }

        // Longest common contiguous run. Ties go to the run latest in the tail
        // and earliest in the head.
        let mut best_len = 0;
        let mut best_tail_end = 0;
        let mut best_head_end = 0;
        let mut prev = vec![0usize; head.len() + 1];
        let mut curr = vec![0usize; head.len() + 1];
        for i in 1..=tail.len() {
            for j in 1..=head.len() {
                curr[j] = if tail[i - 1].normalized == head[j - 1].normalized {
                    prev[j - 1] + 1
                } else {
                    0
                };
                let len = curr[j];
                if len > 0 && (len > best_len || (len == best_len && i > best_tail_end)) {
                    best_len = len;
                    best_tail_end = i;
                    best_head_end = j;
                }
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        if best_len < self.min_overlap_words {
            return None;
        }
        Some((
            tail[best_tail_end - best_len].offset,
            head[best_head_end - best_len].offset,
        ))
    }
}

/// Stitches segments with the default window and minimum run.
pub fn stitch(segments: &[Segment]) -> String {
    SegmentStitcher::default().stitch(segments)
}

enum Piece {
    Text(String),
    Placeholder(String),
}

/// A word and its byte offset in the text it came from.
#[derive(Debug, PartialEq)]
struct Word {
    offset: usize,
    normalized: String,
}

/// Words of `s`, case-folded with surrounding punctuation removed.
fn words(s: &str, base: usize) -> Vec<Word> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        if c.is_whitespace() {
            if let Some(st) = start.take() {
                out.push(word(s, st, i, base));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(st) = start {
        out.push(word(s, st, s.len(), base));
    }
    out
}

fn word(s: &str, start: usize, end: usize, base: usize) -> Word {
    Word {
        offset: base + start,
        normalized: s[start..end]
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase(),
    }
}

/// Words in the last `window` characters of `text`, minus a leading word the
/// window cut in half.
fn tail_words(text: &str, window: usize) -> Vec<Word> {
    let char_count = text.chars().count();
    let start = if char_count > window {
        text.char_indices()
            .nth(char_count - window)
            .map(|(i, _)| i)
            .unwrap_or(0)
    } else {
        0
    };

    let mut tail = words(&text[start..], start);
    let cut_mid_word = start > 0
        && !text[..start].ends_with(char::is_whitespace)
        && tail.first().is_some_and(|w| w.offset == start);
    if cut_mid_word {
        tail.remove(0);
    }
    tail.retain(|w| !w.normalized.is_empty());
    tail
}

/// Words in the first `window` characters of `text`, minus a trailing word the
/// window cut in half.
fn head_words(text: &str, window: usize) -> Vec<Word> {
    let end = text
        .char_indices()
        .nth(window)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let head = &text[..end];
    let mut words = words(head, 0);
    let cut_mid_word = end < text.len()
        && !text[end..].starts_with(char::is_whitespace)
        && !head.ends_with(char::is_whitespace);
    if cut_mid_word {
        words.pop();
    }
    words.retain(|w| !w.normalized.is_empty());
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Interval;

    fn seg(index: usize, text: &str) -> Segment {
        let start = index as u64 * 60_000;
        Segment::transcribed(index, Interval::new(start, start + 65_000), text)
    }

    fn failed(index: usize) -> Segment {
        let start = index as u64 * 60_000;
        Segment::failed(index, Interval::new(start, start + 65_000), "timeout")
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(stitch(&[]), "");
        assert_eq!(stitch(&[seg(0, "just one segment")]), "just one segment");
        assert_eq!(
            stitch(&[failed(0)]),
            "[Transcription failed for audio from 0.0s to 65.0s]"
        );
    }

    #[test]
    fn test_single_segment_is_returned_unchanged() {
        assert_eq!(
            stitch(&[seg(0, "  indented line\n")]),
            "  indented line\n"
        );
    }

    #[test]
    fn test_punctuation_runs_never_count_as_overlap() {
        let a = "the speaker paused - -- ... - and then";
        let b = "- -- ... - resumed with the next slide";
        let out = stitch(&[seg(0, a), seg(1, b)]);
        assert_eq!(out, format!("{} {}", a, b));
    }

    #[test]
    fn test_punctuation_tokens_are_not_words() {
        let head = head_words("— well, -- that is … it", 500);
        let normalized: Vec<&str> = head.iter().map(|w| w.normalized.as_str()).collect();
        assert_eq!(normalized, vec!["well", "that", "is", "it"]);
    }

    #[test]
    fn test_no_overlap_joins_with_space() {
        let out = stitch(&[seg(0, "The meeting started late."), seg(1, "Budget review came next.")]);
        assert_eq!(out, "The meeting started late. Budget review came next.");
    }

    #[test]
    fn test_boundary_phrase_appears_once() {
        let a = "we covered the roadmap and then we talked about the quarterly hiring plan for the team";
        let b = "talked about the quarterly hiring plan for the team and the new office";
        let out = stitch(&[seg(0, a), seg(1, b)]);

        assert_eq!(
            out,
            "we covered the roadmap and then we talked about the quarterly hiring plan for the team and the new office"
        );
        assert_eq!(out.matches("quarterly hiring plan").count(), 1);
    }

    #[test]
    fn test_match_ignores_case_and_punctuation() {
        let a = "So that is where the Project Ends, really.";
        let b = "where the project ends really. Next topic is budgets.";
        let out = stitch(&[seg(0, a), seg(1, b)]);
        assert_eq!(out, "So that is where the project ends really. Next topic is budgets.");
    }

    #[test]
    fn test_three_word_overlap_is_not_enough() {
        let out = stitch(&[seg(0, "alpha beta gamma delta"), seg(1, "beta gamma delta epsilon")]);
        assert_eq!(out, "alpha beta gamma delta beta gamma delta epsilon");
    }

    #[test]
    fn test_placeholder_neighbours_concatenate() {
        let out = stitch(&[
            seg(0, "one two three four five"),
            failed(1),
            seg(2, "two three four five six"),
        ]);
        assert_eq!(
            out,
            "one two three four five [Transcription failed for audio from 60.0s to 125.0s] two three four five six"
        );
    }

    #[test]
    fn test_leading_placeholder_then_text() {
        let out = stitch(&[failed(0), seg(1, "hello there")]);
        assert_eq!(
            out,
            "[Transcription failed for audio from 0.0s to 65.0s] hello there"
        );
    }

    #[test]
    fn test_whitespace_only_segments_skipped() {
        let out = stitch(&[seg(0, "first part"), seg(1, "   \n"), seg(2, "second part")]);
        assert_eq!(out, "first part second part");
    }

    #[test]
    fn test_overlap_outside_window_is_ignored() {
        let stitcher = SegmentStitcher::new(20, 4);
        let a = "one two three four and then a lot more words here";
        let b = "one two three four again";
        assert_eq!(stitcher.stitch_texts(&[a, b]), format!("{} {}", a, b));
    }

    #[test]
    fn test_tie_prefers_latest_run_in_tail() {
        // "a b c d" occurs twice in the tail; the later copy is the real overlap
        let stitcher = SegmentStitcher::new(500, 4);
        let out = stitcher.stitch_texts(&["a b c d x y a b c d", "a b c d z"]);
        assert_eq!(out, "a b c d x y a b c d z");
    }

    #[test]
    fn test_tail_window_drops_partial_word() {
        // Window starts inside "abcdefgh"; the fragment must not match "efgh"
        let tail = tail_words("abcdefgh one two", 12);
        let normalized: Vec<&str> = tail.iter().map(|w| w.normalized.as_str()).collect();
        assert_eq!(normalized, vec!["one", "two"]);
    }

    #[test]
    fn test_head_window_drops_partial_word() {
        let head = head_words("one two threefour", 11);
        let normalized: Vec<&str> = head.iter().map(|w| w.normalized.as_str()).collect();
        assert_eq!(normalized, vec!["one", "two"]);
    }

    #[test]
    fn test_multibyte_text_is_char_boundary_safe() {
        let a = "Привет мир это тест стыковки сегментов ".repeat(30);
        let b = "это тест стыковки сегментов и продолжение";
        let out = SegmentStitcher::default().stitch_texts(&[&a, b]);
        assert!(out.ends_with("это тест стыковки сегментов и продолжение"));
        assert_eq!(out.matches("продолжение").count(), 1);
    }

    #[test]
    fn test_four_chunk_chain() {
        let texts = [
            "chapter one begins with a quiet morning in the village square",
            "morning in the village square where the baker opens his shop",
            "where the baker opens his shop and the children run to school",
            "the children run to school before the bell rings",
        ];
        let out = SegmentStitcher::default().stitch_texts(&texts);
        assert_eq!(
            out,
            "chapter one begins with a quiet morning in the village square where the baker opens his shop and the children run to school before the bell rings"
        );
    }
}
