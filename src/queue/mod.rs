//! Job queue: bounded-parallel workers that resolve, transcribe and report.

pub mod events;
pub mod job;
pub mod pool;
mod worker;

pub use events::{ChannelSink, CollectingSink, JobEvent, JobEventKind, LogSink, NotificationSink};
pub use job::{Job, JobId, SummaryOptions};
pub use pool::{PoolStatus, ShutdownReport, WorkerPool};
