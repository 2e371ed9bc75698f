//! Media handling: external tools, duration probing, source resolution and
//! scratch-file cleanup.

pub mod cleanup;
pub mod command;
pub mod probe;
pub mod resolver;

pub use cleanup::Cleanup;
pub use command::{CommandExecutor, SystemCommandExecutor};
pub use probe::{DefaultDurationProbe, DurationProbe, FfprobeDurationProbe, WavDurationProbe};
pub use resolver::{
    DefaultMediaResolver, MediaHandle, MediaResolver, MediaSource, SourceKind, classify_url,
    drive_download_url, drive_file_id,
};
