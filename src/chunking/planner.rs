//! Chunk planning for size-limited transcription engines.
//!
//! Splits a media timeline into overlapping intervals whose encoded size should
//! stay under a byte target. Byte size stands in for duration at a constant
//! bitrate, which is an approximation: variable-bitrate sources can produce
//! chunks larger than planned, and the pipeline re-plans with a smaller target
//! when that happens.

use crate::error::{Result, ScribeError};

/// A half-open time range `[start_ms, end_ms)` on the source timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Interval {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn len_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    pub fn start_secs(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    pub fn duration_secs(&self) -> f64 {
        self.len_ms() as f64 / 1000.0
    }
}

/// Ordered, overlapping intervals covering a whole media file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    intervals: Vec<Interval>,
    total_ms: u64,
    chunk_ms: u64,
    overlap_ms: u64,
    degraded_coverage: bool,
}

impl ChunkPlan {
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// Planned length of every chunk except (possibly) the last.
    pub fn chunk_ms(&self) -> u64 {
        self.chunk_ms
    }

    pub fn overlap_ms(&self) -> u64 {
        self.overlap_ms
    }

    /// True if a gap or a short final chunk had to be repaired.
    pub fn degraded_coverage(&self) -> bool {
        self.degraded_coverage
    }

    /// Positions `i` where interval `i` starts after interval `i - 1` ends.
    pub fn gaps(&self) -> Vec<usize> {
        self.intervals
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[1].start_ms > pair[0].end_ms)
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// True if the union of intervals is exactly `[0, total_ms]`.
    pub fn covers_fully(&self) -> bool {
        match (self.intervals.first(), self.intervals.last()) {
            (Some(first), Some(last)) => {
                first.start_ms == 0 && last.end_ms == self.total_ms && self.gaps().is_empty()
            }
            _ => false,
        }
    }
}

/// Computes chunk plans with a fixed overlap and an optional duration cap.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlanner {
    overlap_secs: f64,
    max_chunk_secs: Option<f64>,
}

impl ChunkPlanner {
    pub fn new(overlap_secs: f64) -> Self {
        Self {
            overlap_secs,
            max_chunk_secs: None,
        }
    }

    /// Caps every chunk at `secs` regardless of what the byte formula allows.
    pub fn with_max_chunk_secs(mut self, secs: f64) -> Self {
        self.max_chunk_secs = Some(secs);
        self
    }

    /// A plan with one interval spanning the whole file.
    pub fn single(total_duration_secs: f64) -> ChunkPlan {
        let total_ms = secs_to_ms(total_duration_secs);
        ChunkPlan {
            intervals: vec![Interval::new(0, total_ms)],
            total_ms,
            chunk_ms: total_ms,
            overlap_ms: 0,
            degraded_coverage: false,
        }
    }

    /// Plans chunks for a file of `total_duration_secs` and `total_bytes`,
    /// aiming for `target_chunk_bytes` per chunk.
    pub fn plan(
        &self,
        total_duration_secs: f64,
        total_bytes: u64,
        target_chunk_bytes: u64,
    ) -> Result<ChunkPlan> {
        if !(total_duration_secs.is_finite() && total_duration_secs > 0.0) {
            return Err(invalid(format!(
                "total duration must be positive, got {}",
                total_duration_secs
            )));
        }
        if total_bytes == 0 {
            return Err(invalid("total byte size is zero".to_string()));
        }
        if target_chunk_bytes == 0 {
            return Err(invalid("target chunk size is zero".to_string()));
        }
        if !(self.overlap_secs.is_finite() && self.overlap_secs >= 0.0) {
            return Err(invalid(format!(
                "overlap must be non-negative, got {}",
                self.overlap_secs
            )));
        }

        let total_ms = secs_to_ms(total_duration_secs);
        let mut chunk_secs = total_duration_secs * target_chunk_bytes as f64 / total_bytes as f64;
        if let Some(max) = self.max_chunk_secs {
            chunk_secs = chunk_secs.min(max);
        }
        let chunk_ms = (chunk_secs * 1000.0) as u64;
        let overlap_ms = secs_to_ms(self.overlap_secs);

        if chunk_ms >= total_ms {
            return Ok(Self::single(total_duration_secs));
        }
        if chunk_ms <= overlap_ms {
            return Err(invalid(format!(
                "chunk duration {}ms does not exceed the {}ms overlap",
                chunk_ms, overlap_ms
            )));
        }

        let step_ms = chunk_ms - overlap_ms;
        let chunk_count = total_ms.div_ceil(step_ms).max(1);

        let mut intervals = Vec::with_capacity(chunk_count as usize);
        for i in 0..chunk_count {
            let start_ms = i * step_ms;
            let end_ms = if i == chunk_count - 1 {
                total_ms
            } else {
                (start_ms + chunk_ms).min(total_ms)
            };
            intervals.push(Interval::new(start_ms, end_ms));
            // Anything after an interval that already reaches the end is fully inside it
            if end_ms == total_ms {
                break;
            }
        }

        let mut plan = ChunkPlan {
            intervals,
            total_ms,
            chunk_ms,
            overlap_ms,
            degraded_coverage: false,
        };
        repair_coverage(&mut plan);
        Ok(plan)
    }
}

/// Plans chunks with no duration cap.
///
/// `chunk_duration = total_duration * target_chunk_bytes / total_bytes`, stepped by
/// `chunk_duration - overlap_secs`, with the last chunk ending exactly at the
/// total duration.
pub fn plan(
    total_duration_secs: f64,
    total_bytes: u64,
    target_chunk_bytes: u64,
    overlap_secs: f64,
) -> Result<ChunkPlan> {
    ChunkPlanner::new(overlap_secs).plan(total_duration_secs, total_bytes, target_chunk_bytes)
}

/// Widens any gap between neighbours and extends a plan that stops short of
/// the end. Both repairs mark the plan as degraded.
fn repair_coverage(plan: &mut ChunkPlan) {
    for i in plan.gaps() {
        let next_start = plan.intervals[i].start_ms;
        let previous = &mut plan.intervals[i - 1];
        tracing::warn!(
            chunk = i,
            gap_ms = next_start - previous.end_ms,
            "gap between planned chunks, widening previous chunk"
        );
        previous.end_ms = next_start;
        plan.degraded_coverage = true;
    }

    let last_end = plan.intervals.last().map(|i| i.end_ms).unwrap_or(0);
    if last_end < plan.total_ms {
        tracing::warn!(
            missing_ms = plan.total_ms - last_end,
            "plan stops short of the end, appending a final chunk"
        );
        plan.intervals.push(Interval::new(
            plan.total_ms.saturating_sub(plan.chunk_ms),
            plan.total_ms,
        ));
        plan.degraded_coverage = true;
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

fn invalid(message: String) -> ScribeError {
    ScribeError::InvalidChunkPlan { message }
}
