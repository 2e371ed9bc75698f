//! Terminal rendering for `longscribe transcribe` and `longscribe plan`.

use crate::chunking::ChunkPlan;
use crate::queue::{JobEvent, JobEventKind, JobId};
use crate::transcript::TranscriptStats;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::collections::HashMap;

const MIB: f64 = 1024.0 * 1024.0;

/// `1h 02m 03s`, `4m 05s`, or `12.3s`.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        return format!("{:.1}s", secs);
    }
    let total = secs.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else {
        format!("{}m {:02}s", m, s)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / MIB)
}

pub fn format_stats(stats: &TranscriptStats) -> String {
    format!(
        "{} words, {} characters, {} of audio",
        stats.words,
        stats.characters,
        format_duration(stats.duration_secs)
    )
}

/// Human-readable chunk plan, one line per interval.
pub fn format_plan(plan: &ChunkPlan, size_bytes: u64) -> String {
    let mut out = format!(
        "{} chunk(s) for {} ({}), chunk length {}, overlap {}\n",
        plan.len(),
        format_duration(plan.total_ms() as f64 / 1000.0),
        format_bytes(size_bytes),
        format_duration(plan.chunk_ms() as f64 / 1000.0),
        format_duration(plan.overlap_ms() as f64 / 1000.0),
    );
    for (i, interval) in plan.intervals().iter().enumerate() {
        out.push_str(&format!(
            "  {:>3}  {:>10.3}s - {:>10.3}s  ({})\n",
            i + 1,
            interval.start_secs(),
            interval.end_secs(),
            format_duration(interval.duration_secs())
        ));
    }
    if plan.degraded_coverage() {
        out.push_str("  coverage was repaired; boundaries may be uneven\n");
    }
    out
}

/// One-line description of an event, or `None` for events shown only as
/// progress.
pub fn event_line(event: &JobEvent) -> Option<String> {
    let who = &event.destination;
    match &event.kind {
        JobEventKind::Queued { position } => Some(format!("{}: queued (#{})", who, position)),
        JobEventKind::Started => None,
        JobEventKind::DownloadStarted { .. } => Some(format!("{}: downloading", who)),
        JobEventKind::DownloadFinished { .. } => Some(format!("{}: download finished", who)),
        JobEventKind::TranscriptionStarted { duration_secs } => Some(format!(
            "{}: transcribing {} of audio",
            who,
            format_duration(*duration_secs)
        )),
        JobEventKind::ChunksPlanned { count } if *count > 1 => {
            Some(format!("{}: split into {} chunks", who, count))
        }
        JobEventKind::ChunksPlanned { .. } => None,
        JobEventKind::ChunkCompleted { .. } => None,
        JobEventKind::ChunkFailed {
            index,
            total,
            start_secs,
            end_secs,
            reason,
        } => Some(format!(
            "{}: chunk {}/{} ({:.1}s-{:.1}s) failed: {}",
            who,
            index + 1,
            total,
            start_secs,
            end_secs,
            reason
        )),
        JobEventKind::SummaryReady {
            language,
            saved_path: Some(path),
            ..
        } => Some(format!(
            "{}: {} summary saved to {}",
            who,
            language,
            path.display()
        )),
        JobEventKind::SummaryReady { language, .. } => {
            Some(format!("{}: {} summary ready", who, language))
        }
        JobEventKind::SummaryFailed { reason } => {
            Some(format!("{}: summary failed: {}", who, reason))
        }
        JobEventKind::Succeeded {
            stats,
            saved_path,
            failed_chunks,
            ..
        } => {
            let mut line = format!("{}: done, {}", who, format_stats(stats));
            if let Some(path) = saved_path {
                line.push_str(&format!(", saved to {}", path.display()));
            }
            if !failed_chunks.is_empty() {
                line.push_str(&format!(", {} chunk(s) missing", failed_chunks.len()));
            }
            Some(line)
        }
        JobEventKind::Failed { reason } => Some(format!("{}: failed: {}", who, reason)),
    }
}

/// Renders job events to the terminal.
///
/// Progress and status go to stderr; transcripts that were not saved go to
/// stdout.
pub struct EventRenderer {
    multi: MultiProgress,
    bars: HashMap<JobId, ProgressBar>,
    quiet: bool,
    json: bool,
    succeeded: usize,
    failed: usize,
}

impl EventRenderer {
    pub fn new(quiet: bool, json: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            quiet,
            json,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn handle(&mut self, event: JobEvent) {
        match &event.kind {
            JobEventKind::Succeeded { .. } => self.succeeded += 1,
            JobEventKind::Failed { .. } => self.failed += 1,
            _ => {}
        }

        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "could not serialize event"),
            }
            return;
        }

        self.update_bar(&event);

        if !self.quiet
            && let Some(line) = event_line(&event)
        {
            let line = match &event.kind {
                JobEventKind::Succeeded { failed_chunks, .. } if failed_chunks.is_empty() => {
                    line.green().to_string()
                }
                JobEventKind::Succeeded { .. }
                | JobEventKind::ChunkFailed { .. }
                | JobEventKind::SummaryFailed { .. } => line.yellow().to_string(),
                JobEventKind::Failed { .. } => line.red().to_string(),
                _ => line.dimmed().to_string(),
            };
            self.multi.suspend(|| eprintln!("{}", line));
        }

        match &event.kind {
            JobEventKind::Succeeded {
                transcript,
                saved_path: None,
                ..
            } => self.multi.suspend(|| println!("{}", transcript)),
            JobEventKind::SummaryReady {
                summary,
                saved_path: None,
                ..
            } => self.multi.suspend(|| println!("{}\n", summary)),
            _ => {}
        }
    }

    fn update_bar(&mut self, event: &JobEvent) {
        if self.quiet {
            return;
        }
        match &event.kind {
            JobEventKind::ChunksPlanned { count } => {
                let bar = self.multi.add(ProgressBar::new(*count as u64));
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} chunks")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar.set_message(event.destination.clone());
                self.bars.insert(event.job_id, bar);
            }
            JobEventKind::ChunkCompleted { .. } | JobEventKind::ChunkFailed { .. } => {
                if let Some(bar) = self.bars.get(&event.job_id) {
                    bar.inc(1);
                }
            }
            kind if kind.is_terminal() => {
                if let Some(bar) = self.bars.remove(&event.job_id) {
                    bar.finish_and_clear();
                }
            }
            _ => {}
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}
