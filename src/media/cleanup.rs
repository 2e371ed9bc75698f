//! Best-effort removal of worker scratch files.
//!
//! Deleting a path that is already gone counts as success, so cleanup can run
//! more than once for the same file. Other errors are retried a bounded number
//! of times and then logged; they never fail a job.

use crate::defaults;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Retry policy for deleting temporary files and directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleanup {
    attempts: u32,
    delay: Duration,
}

impl Default for Cleanup {
    fn default() -> Self {
        Self::new(
            defaults::CLEANUP_ATTEMPTS,
            Duration::from_millis(defaults::CLEANUP_RETRY_DELAY_MS),
        )
    }
}

impl Cleanup {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Removes a single file. Returns true if the file is gone afterwards.
    ///
    /// Blocks between attempts; call from a blocking context.
    pub fn remove_file(&self, path: &Path) -> bool {
        self.retry(path, || std::fs::remove_file(path))
    }

    /// Removes a directory and everything under it. Returns true if it is gone.
    pub fn remove_dir_all(&self, path: &Path) -> bool {
        self.retry(path, || std::fs::remove_dir_all(path))
    }

    fn retry(&self, path: &Path, mut op: impl FnMut() -> io::Result<()>) -> bool {
        for attempt in 1..=self.attempts {
            match op() {
                Ok(()) => return true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
                Err(e) if attempt < self.attempts => {
                    tracing::debug!(path = %path.display(), attempt, error = %e, "cleanup failed, retrying");
                    std::thread::sleep(self.delay);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        attempts = self.attempts,
                        error = %e,
                        "giving up on temporary file cleanup"
                    );
                }
            }
        }
        false
    }
}
