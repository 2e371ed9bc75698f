//! Media duration probing.
//!
//! Duration sizes the chunk plan and is reported back to callers, so every
//! job probes its media exactly once before planning.

use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::media::command::CommandExecutor;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

/// Determines the total playable duration of a media file.
pub trait DurationProbe: Send + Sync {
    /// Duration in seconds. Fails with `DurationUnavailable` or
    /// `UnsupportedInput` when the file cannot be decoded.
    fn duration_secs(&self, path: &Path) -> Result<f64>;
}

impl<T: DurationProbe + ?Sized> DurationProbe for Arc<T> {
    fn duration_secs(&self, path: &Path) -> Result<f64> {
        (**self).duration_secs(path)
    }
}

/// Lowercased extension of `path`, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Fails with `UnsupportedInput` unless `path` has a supported media extension.
pub fn ensure_supported(path: &Path) -> Result<()> {
    match extension_of(path) {
        Some(ext) if defaults::is_supported_extension(&ext) => Ok(()),
        Some(ext) => Err(ScribeError::UnsupportedInput {
            path: path.display().to_string(),
            reason: format!("unknown extension '{}'", ext),
        }),
        None => Err(ScribeError::UnsupportedInput {
            path: path.display().to_string(),
            reason: "file has no extension".to_string(),
        }),
    }
}

fn validate_duration(path: &Path, secs: f64) -> Result<f64> {
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(ScribeError::DurationUnavailable {
            path: path.display().to_string(),
            message: format!("probe reported {}", secs),
        })
    }
}

/// Probe backed by `ffprobe -show_entries format=duration`.
pub struct FfprobeDurationProbe<E: CommandExecutor> {
    executor: E,
    program: String,
}

impl<E: CommandExecutor> FfprobeDurationProbe<E> {
    pub fn new(executor: E, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }
}

impl<E: CommandExecutor> DurationProbe for FfprobeDurationProbe<E> {
    fn duration_secs(&self, path: &Path) -> Result<f64> {
        let args: [&OsStr; 7] = [
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-show_entries"),
            OsStr::new("format=duration"),
            OsStr::new("-of"),
            OsStr::new("default=noprint_wrappers=1:nokey=1"),
            path.as_os_str(),
        ];

        let stdout = self
            .executor
            .execute(&self.program, &args)
            .map_err(|e| match e {
                ScribeError::ToolFailed { message, .. } => ScribeError::UnsupportedInput {
                    path: path.display().to_string(),
                    reason: message,
                },
                other => other,
            })?;

        let line = stdout.lines().map(str::trim).find(|l| !l.is_empty());
        let secs = line
            .and_then(|l| l.parse::<f64>().ok())
            .ok_or_else(|| ScribeError::DurationUnavailable {
                path: path.display().to_string(),
                message: format!("unparseable ffprobe output: {:?}", stdout.trim()),
            })?;

        validate_duration(path, secs)
    }
}

/// Probe that reads WAV headers directly, no external tool needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDurationProbe;

impl DurationProbe for WavDurationProbe {
    fn duration_secs(&self, path: &Path) -> Result<f64> {
        let reader = hound::WavReader::open(path).map_err(|e| ScribeError::UnsupportedInput {
            path: path.display().to_string(),
            reason: format!("failed to parse WAV header: {}", e),
        })?;

        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(ScribeError::DurationUnavailable {
                path: path.display().to_string(),
                message: "WAV header reports a zero sample rate".to_string(),
            });
        }

        // `duration()` counts frames (samples per channel)
        let secs = reader.duration() as f64 / spec.sample_rate as f64;
        validate_duration(path, secs)
    }
}

/// Rejects unsupported extensions, reads WAV natively and sends everything
/// else to ffprobe.
pub struct DefaultDurationProbe<E: CommandExecutor> {
    wav: WavDurationProbe,
    ffprobe: FfprobeDurationProbe<E>,
}

impl<E: CommandExecutor> DefaultDurationProbe<E> {
    pub fn new(executor: E, ffprobe_program: impl Into<String>) -> Self {
        Self {
            wav: WavDurationProbe,
            ffprobe: FfprobeDurationProbe::new(executor, ffprobe_program),
        }
    }
}

impl<E: CommandExecutor> DurationProbe for DefaultDurationProbe<E> {
    fn duration_secs(&self, path: &Path) -> Result<f64> {
        ensure_supported(path)?;
        match extension_of(path).as_deref() {
            // Compressed or odd WAV variants hound can't read still get a chance with ffprobe
            Some("wav") => self
                .wav
                .duration_secs(path)
                .or_else(|_| self.ffprobe.duration_secs(path)),
            _ => self.ffprobe.duration_secs(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::command::mock::MockExecutor;
    use tempfile::TempDir;

    fn write_wav(dir: &TempDir, name: &str, sample_rate: u32, channels: u16, secs: f64) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let frames = (sample_rate as f64 * secs) as usize;
        for _ in 0..frames * channels as usize {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_ffprobe_parses_duration() {
        let probe = FfprobeDurationProbe::new(MockExecutor::returning("2000.512000\n"), "ffprobe");
        let secs = probe.duration_secs(Path::new("/media/talk.mp4")).unwrap();
        assert!((secs - 2000.512).abs() < 1e-9);
    }

    #[test]
    fn test_ffprobe_passes_path_last() {
        let executor = MockExecutor::returning("12.5");
        let probe = FfprobeDurationProbe::new(executor, "/opt/bin/ffprobe");
        probe.duration_secs(Path::new("/media/a.mp3")).unwrap();

        let calls = probe.executor.calls();
        assert_eq!(calls[0].0, "/opt/bin/ffprobe");
        assert_eq!(calls[0].1.last().map(String::as_str), Some("/media/a.mp3"));
        assert!(calls[0].1.contains(&"format=duration".to_string()));
    }

    #[test]
    fn test_ffprobe_na_output_is_duration_unavailable() {
        let probe = FfprobeDurationProbe::new(MockExecutor::returning("N/A\n"), "ffprobe");
        let result = probe.duration_secs(Path::new("/media/stream.webm"));
        assert!(matches!(
            result,
            Err(ScribeError::DurationUnavailable { .. })
        ));
    }

    #[test]
    fn test_ffprobe_zero_duration_rejected() {
        let probe = FfprobeDurationProbe::new(MockExecutor::returning("0.000000"), "ffprobe");
        assert!(probe.duration_secs(Path::new("/media/empty.mp3")).is_err());
    }

    #[test]
    fn test_ffprobe_failure_becomes_unsupported_input() {
        let executor = MockExecutor::new(|tool, _| {
            Err(ScribeError::ToolFailed {
                tool: tool.to_string(),
                message: "Invalid data found when processing input".to_string(),
            })
        });
        let probe = FfprobeDurationProbe::new(executor, "ffprobe");
        match probe.duration_secs(Path::new("/media/corrupt.mp3")) {
            Err(ScribeError::UnsupportedInput { reason, .. }) => {
                assert!(reason.contains("Invalid data"))
            }
            other => panic!("Expected UnsupportedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_ffprobe_missing_tool_propagates() {
        let executor = MockExecutor::new(|tool, _| {
            Err(ScribeError::ToolNotFound {
                tool: tool.to_string(),
            })
        });
        let probe = FfprobeDurationProbe::new(executor, "ffprobe");
        assert!(matches!(
            probe.duration_secs(Path::new("/media/a.mp3")),
            Err(ScribeError::ToolNotFound { .. })
        ));
    }

    #[test]
    fn test_wav_probe_reads_mono_duration() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "mono.wav", 16000, 1, 2.5);
        let secs = WavDurationProbe.duration_secs(&path).unwrap();
        assert!((secs - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_wav_probe_counts_frames_not_samples() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "stereo.wav", 8000, 2, 1.0);
        let secs = WavDurationProbe.duration_secs(&path).unwrap();
        assert!((secs - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wav_probe_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.wav");
        std::fs::write(&path, b"definitely not a wav file").unwrap();
        assert!(matches!(
            WavDurationProbe.duration_secs(&path),
            Err(ScribeError::UnsupportedInput { .. })
        ));
    }

    #[test]
    fn test_default_probe_uses_wav_reader_without_ffprobe() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "clip.WAV", 16000, 1, 1.0);
        let executor = MockExecutor::new(|_, _| panic!("ffprobe must not run for WAV"));
        let probe = DefaultDurationProbe::new(executor, "ffprobe");
        let secs = probe.duration_secs(&path).unwrap();
        assert!((secs - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_probe_rejects_unknown_extension() {
        let probe = DefaultDurationProbe::new(MockExecutor::returning("10"), "ffprobe");
        assert!(matches!(
            probe.duration_secs(Path::new("/media/notes.txt")),
            Err(ScribeError::UnsupportedInput { .. })
        ));
        assert!(matches!(
            probe.duration_secs(Path::new("/media/no_extension")),
            Err(ScribeError::UnsupportedInput { .. })
        ));
    }

    #[test]
    fn test_default_probe_sends_video_to_ffprobe() {
        let probe = DefaultDurationProbe::new(MockExecutor::returning("61.0"), "ffprobe");
        let secs = probe.duration_secs(Path::new("/media/lecture.mkv")).unwrap();
        assert_eq!(secs, 61.0);
    }
}
