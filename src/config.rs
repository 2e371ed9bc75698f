use crate::defaults;
use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub chunking: ChunkingConfig,
    pub retry: RetryConfig,
    pub stitching: StitchingConfig,
    pub queue: QueueConfig,
    pub tools: ToolsConfig,
    pub summary: SummaryConfig,
}

/// Remote transcription engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoint: String,
    pub model: String,
    /// ISO-639-1 hint passed to the engine; `None` lets it auto-detect.
    pub language: Option<String>,
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    pub max_upload_bytes: u64,
    pub request_timeout_secs: u64,
    /// Prompt text used for jobs that bring none of their own.
    pub default_prompt_file: Option<PathBuf>,
}

/// Chunk planning and extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub target_chunk_mb: f64,
    pub overlap_secs: f64,
    pub max_chunk_secs: f64,
    pub single_call_max_secs: f64,
    pub shrink_factor: f64,
    pub max_shrink_attempts: u32,
    pub bitrate: String,
}

/// Per-chunk retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub attempt_budget: u32,
    pub retry_delay_ms: u64,
    pub min_chars_per_sec: f64,
    pub plausibility_min_secs: f64,
}

/// Segment stitching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StitchingConfig {
    pub window_chars: usize,
    pub min_overlap_words: usize,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub max_parallel: usize,
    /// Parent directory for per-job scratch space; system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

/// Transcript summarization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummaryConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Directory with `system_prompt_<lang>.txt` files and a `glossary/`
    /// subdirectory of `glossary_<lang>.txt` files.
    pub resources_dir: Option<PathBuf>,
    pub default_language: String,
}

/// External media tool locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub yt_dlp: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::ENGINE_ENDPOINT.to_string(),
            model: defaults::ENGINE_MODEL.to_string(),
            language: None,
            api_key_env: defaults::API_KEY_ENV.to_string(),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            default_prompt_file: None,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chunk_mb: defaults::TARGET_CHUNK_MB,
            overlap_secs: defaults::OVERLAP_SECS,
            max_chunk_secs: defaults::MAX_CHUNK_SECS,
            single_call_max_secs: defaults::SINGLE_CALL_MAX_SECS,
            shrink_factor: defaults::SHRINK_FACTOR,
            max_shrink_attempts: defaults::MAX_SHRINK_ATTEMPTS,
            bitrate: defaults::CHUNK_BITRATE.to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempt_budget: defaults::ATTEMPT_BUDGET,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
            min_chars_per_sec: defaults::MIN_CHARS_PER_SEC,
            plausibility_min_secs: defaults::PLAUSIBILITY_MIN_SECS,
        }
    }
}

impl Default for StitchingConfig {
    fn default() -> Self {
        Self {
            window_chars: defaults::STITCH_WINDOW_CHARS,
            min_overlap_words: defaults::MIN_OVERLAP_WORDS,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_parallel: defaults::MAX_PARALLEL_JOBS,
            temp_dir: None,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::SUMMARY_ENDPOINT.to_string(),
            model: defaults::SUMMARY_MODEL.to_string(),
            api_key_env: defaults::SUMMARY_API_KEY_ENV.to_string(),
            max_tokens: defaults::SUMMARY_MAX_TOKENS,
            temperature: defaults::SUMMARY_TEMPERATURE,
            request_timeout_secs: defaults::SUMMARY_TIMEOUT_SECS,
            resources_dir: None,
            default_language: defaults::SUMMARY_LANGUAGE.to_string(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            yt_dlp: "yt-dlp".to_string(),
        }
    }
}

impl ChunkingConfig {
    /// Target chunk size in bytes.
    pub fn target_chunk_bytes(&self) -> u64 {
        (self.target_chunk_mb * defaults::MIB as f64) as u64
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl QueueConfig {
    /// Directory under which per-job scratch directories are created.
    pub fn scratch_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl SummaryConfig {
    /// Where prompts and glossaries are read from; `summarization/` next to
    /// the config file when unset.
    pub fn resources_dir(&self) -> PathBuf {
        self.resources_dir.clone().unwrap_or_else(|| {
            Config::default_path()
                .parent()
                .map(|dir| dir.join("summarization"))
                .unwrap_or_else(|| PathBuf::from("summarization"))
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScribeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ScribeError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ScribeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LONGSCRIBE_MODEL → engine.model
    /// - LONGSCRIBE_MAX_PARALLEL → queue.max_parallel
    /// - LONGSCRIBE_TEMP_DIR → queue.temp_dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("LONGSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.engine.model = model;
        }

        if let Ok(parallel) = std::env::var("LONGSCRIBE_MAX_PARALLEL")
            && let Ok(parallel) = parallel.trim().parse::<usize>()
        {
            self.queue.max_parallel = parallel;
        }

        if let Ok(dir) = std::env::var("LONGSCRIBE_TEMP_DIR")
            && !dir.is_empty()
        {
            self.queue.temp_dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> ScribeError {
            ScribeError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.queue.max_parallel == 0 {
            return Err(invalid("queue.max_parallel", "must be at least 1"));
        }
        if self.retry.attempt_budget == 0 {
            return Err(invalid("retry.attempt_budget", "must be at least 1"));
        }
        if !(self.chunking.shrink_factor > 0.0 && self.chunking.shrink_factor < 1.0) {
            return Err(invalid(
                "chunking.shrink_factor",
                "must be between 0 and 1 (exclusive)",
            ));
        }
        if self.chunking.overlap_secs < 0.0 {
            return Err(invalid("chunking.overlap_secs", "must not be negative"));
        }
        if self.chunking.overlap_secs >= self.chunking.max_chunk_secs {
            return Err(invalid(
                "chunking.overlap_secs",
                "must be shorter than chunking.max_chunk_secs",
            ));
        }
        if self.chunking.target_chunk_bytes() == 0
            || self.chunking.target_chunk_bytes() > self.engine.max_upload_bytes
        {
            return Err(invalid(
                "chunking.target_chunk_mb",
                "must be positive and no larger than engine.max_upload_bytes",
            ));
        }
        if self.stitching.min_overlap_words == 0 {
            return Err(invalid("stitching.min_overlap_words", "must be at least 1"));
        }
        if self.summary.max_tokens == 0 {
            return Err(invalid("summary.max_tokens", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.summary.temperature) {
            return Err(invalid("summary.temperature", "must be between 0 and 1"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/longscribe/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("longscribe")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_longscribe_env() {
        remove_env("LONGSCRIBE_MODEL");
        remove_env("LONGSCRIBE_MAX_PARALLEL");
        remove_env("LONGSCRIBE_TEMP_DIR");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.engine.model, "whisper-1");
        assert_eq!(config.engine.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.engine.language, None);

        assert_eq!(config.chunking.target_chunk_mb, 20.0);
        assert_eq!(config.chunking.overlap_secs, 5.0);
        assert_eq!(config.chunking.shrink_factor, 0.8);

        assert_eq!(config.retry.attempt_budget, 3);
        assert_eq!(config.stitching.window_chars, 500);
        assert_eq!(config.stitching.min_overlap_words, 4);

        assert_eq!(config.queue.max_parallel, 3);
        assert_eq!(config.tools.ffprobe, "ffprobe");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [engine]
            model = "whisper-large"
            language = "ru"

            [chunking]
            target_chunk_mb = 15.0
            overlap_secs = 3.0

            [retry]
            attempt_budget = 5

            [queue]
            max_parallel = 2
            temp_dir = "/var/tmp/longscribe"

            [summary]
            default_language = "ru"
            resources_dir = "/srv/longscribe/summarization"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.engine.model, "whisper-large");
        assert_eq!(config.engine.language, Some("ru".to_string()));
        assert_eq!(config.chunking.target_chunk_mb, 15.0);
        assert_eq!(config.chunking.overlap_secs, 3.0);
        assert_eq!(config.retry.attempt_budget, 5);
        assert_eq!(config.queue.max_parallel, 2);
        assert_eq!(
            config.queue.temp_dir,
            Some(PathBuf::from("/var/tmp/longscribe"))
        );
        assert_eq!(config.summary.default_language, "ru");
        assert_eq!(
            config.summary.resources_dir(),
            PathBuf::from("/srv/longscribe/summarization")
        );
        assert_eq!(config.summary.max_tokens, 4096);
        // Untouched sections keep their defaults
        assert_eq!(config.stitching, StitchingConfig::default());
        assert_eq!(config.engine.default_prompt_file, None);
    }

    #[test]
    fn test_target_chunk_bytes() {
        let config = ChunkingConfig {
            target_chunk_mb: 20.0,
            ..ChunkingConfig::default()
        };
        assert_eq!(config.target_chunk_bytes(), 20 * 1024 * 1024);
    }

    #[test]
    fn test_env_override_model_and_parallel() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_longscribe_env();

        set_env("LONGSCRIBE_MODEL", "whisper-2");
        set_env("LONGSCRIBE_MAX_PARALLEL", "6");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.engine.model, "whisper-2");
        assert_eq!(config.queue.max_parallel, 6);

        clear_longscribe_env();
    }

    #[test]
    fn test_env_override_invalid_or_empty_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_longscribe_env();

        set_env("LONGSCRIBE_MODEL", "");
        set_env("LONGSCRIBE_MAX_PARALLEL", "lots");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.engine.model, "whisper-1");
        assert_eq!(config.queue.max_parallel, 3);

        clear_longscribe_env();
    }

    #[test]
    fn test_env_override_temp_dir() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_longscribe_env();

        set_env("LONGSCRIBE_TEMP_DIR", "/scratch");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.queue.scratch_root(), PathBuf::from("/scratch"));

        clear_longscribe_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[engine\nmodel = \"broken").unwrap();

        let result = Config::load(temp_file.path());
        assert!(matches!(result, Err(ScribeError::Config(_))));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing = Path::new("/tmp/nonexistent_longscribe_config_12345.toml");
        let config = Config::load_or_default(missing).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_propagates_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[queue\nmax_parallel = ").unwrap();

        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_parallel() {
        let mut config = Config::default();
        config.queue.max_parallel = 0;
        match config.validate() {
            Err(ScribeError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "queue.max_parallel")
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_shrink_factor() {
        let mut config = Config::default();
        config.chunking.shrink_factor = 1.0;
        assert!(config.validate().is_err());
        config.chunking.shrink_factor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_target_above_upload_limit() {
        let mut config = Config::default();
        config.chunking.target_chunk_mb = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_longer_than_chunk() {
        let mut config = Config::default();
        config.chunking.overlap_secs = 700.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_summary_temperature_out_of_range() {
        let mut config = Config::default();
        config.summary.temperature = 1.5;
        match config.validate() {
            Err(ScribeError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "summary.temperature")
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("longscribe"));
        assert!(path_str.ends_with("config.toml"));
    }
}
