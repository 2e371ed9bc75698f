//! Splitting long media into overlapping, size-bounded chunks.

pub mod extractor;
pub mod planner;

pub use extractor::{Chunk, ChunkExtractor, FfmpegChunkExtractor, chunk_file_name};
pub use planner::{ChunkPlan, ChunkPlanner, Interval, plan};
