//! Command-line interface for longscribe
//!
//! Provides argument parsing using clap derive macros.

use crate::queue::Job;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Transcribe long audio and video through a size-limited speech-to-text engine
#[derive(Parser, Debug)]
#[command(
    name = "longscribe",
    version,
    about = "Transcribe long audio and video through a size-limited speech-to-text engine"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info logs, -vv: debug logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe local files and URLs (YouTube, Google Drive, LinkedIn, direct links)
    Transcribe {
        /// Files or URLs to transcribe
        #[arg(required = true, value_name = "SOURCE")]
        sources: Vec<String>,

        /// Context for the engine, e.g. speaker names or domain vocabulary
        #[arg(long, short = 'p', value_name = "TEXT")]
        prompt: Option<String>,

        /// Save transcripts as <name>_<timestamp>.txt here instead of printing them
        #[arg(long, short = 'o', value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Number of jobs to run at once (default: from config)
        #[arg(long, value_name = "N")]
        parallel: Option<usize>,

        /// Cookie file for sources behind a login
        #[arg(long, value_name = "FILE")]
        cookies: Option<PathBuf>,

        /// Print job events as JSON lines instead of progress bars
        #[arg(long)]
        json: bool,

        /// Also summarize each transcript in this language (e.g. en, ru)
        #[arg(long, value_name = "LANG")]
        summarize: Option<String>,

        /// Extra instructions for the summary
        #[arg(long, value_name = "TEXT", requires = "summarize")]
        summary_instructions: Option<String>,
    },

    /// Summarize a saved transcript, or refine an earlier summary
    Summarize {
        /// Transcript text file
        transcript: PathBuf,

        /// Summary language (default: from config)
        #[arg(long, short = 'l', value_name = "LANG")]
        language: Option<String>,

        /// Extra instructions, e.g. "focus on action items"
        #[arg(long, short = 'i', value_name = "TEXT")]
        instructions: Option<String>,

        /// Earlier summary to refine
        #[arg(long, value_name = "FILE", requires = "feedback")]
        previous: Option<PathBuf>,

        /// What to change in the earlier summary
        #[arg(long, value_name = "TEXT", requires = "previous")]
        feedback: Option<String>,

        /// Save as <name>_summary_<lang>_<timestamp>.txt here instead of printing
        #[arg(long, short = 'o', value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show how a file would be split without transcribing it
    Plan {
        /// Local media file
        file: PathBuf,

        /// Target chunk size in MiB (default: from config)
        #[arg(long, value_name = "MIB")]
        target_mb: Option<f64>,

        /// Overlap between chunks (default: from config). Examples: 2, 2s, 1500ms
        #[arg(long, value_name = "DURATION", value_parser = parse_overlap_secs)]
        overlap: Option<f64>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

/// Parse an overlap duration into seconds.
///
/// Bare numbers are seconds; anything else goes through `humantime`
/// (`2s`, `1500ms`, `1m`).
fn parse_overlap_secs(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Ok(secs);
        }
        return Err(format!("overlap must be a non-negative number, got {}", s));
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs_f64())
        .map_err(|e| e.to_string())
}

/// Turns a command-line source into a job: http(s) URLs are downloaded, anything
/// else is a local file left in place.
pub fn job_for_source(source: &str) -> Job {
    let lower = source.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Job::from_url(source, source)
    } else {
        Job::from_file(source, source)
    }
}
