use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use longscribe::chunking::ChunkPlanner;
use longscribe::cli::{Cli, Commands, ConfigAction, job_for_source};
use longscribe::config::Config;
use longscribe::media::{DefaultDurationProbe, DurationProbe, SystemCommandExecutor};
use longscribe::output::{EventRenderer, format_plan};
use longscribe::queue::{ChannelSink, Job, WorkerPool};
use longscribe::summary::{Summarizer, SummaryRequest, save_summary};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Transcribe {
            sources,
            prompt,
            output_dir,
            parallel,
            cookies,
            json,
            summarize,
            summary_instructions,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(parallel) = parallel {
                config.queue.max_parallel = parallel;
            }
            config.validate()?;
            let options = JobOptions {
                prompt,
                output_dir,
                cookies,
                summary_language: summarize,
                summary_instructions,
            };
            let failed = run_transcribe(config, sources, options, json, cli.quiet).await?;
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Plan {
            file,
            target_mb,
            overlap,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(target_mb) = target_mb {
                config.chunking.target_chunk_mb = target_mb;
            }
            if let Some(overlap) = overlap {
                config.chunking.overlap_secs = overlap;
            }
            config.validate()?;
            show_plan(&config, &file)?;
        }
        Commands::Summarize {
            transcript,
            language,
            instructions,
            previous,
            feedback,
            output_dir,
        } => {
            let config = load_config(cli.config.as_deref())?;
            config.validate()?;
            let language = language.unwrap_or_else(|| config.summary.default_language.clone());
            let mut request = SummaryRequest::new(read_text(&transcript).await?, language);
            if let Some(instructions) = instructions {
                request = request.with_instructions(instructions);
            }
            if let (Some(previous), Some(feedback)) = (previous, feedback) {
                request = request.refining(read_text(&previous).await?, feedback);
            }
            run_summarize(&config, &transcript, &request, output_dir.as_deref()).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "longscribe",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-q` → warn, default → warn for deps and info
/// for us, `-v` → info, `-vv` → debug.
fn init_logging(quiet: bool, verbose: u8) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "warn,longscribe=info",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/longscribe/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

/// Per-job settings shared by every source on the command line.
struct JobOptions {
    prompt: Option<String>,
    output_dir: Option<PathBuf>,
    cookies: Option<PathBuf>,
    summary_language: Option<String>,
    summary_instructions: Option<String>,
}

impl JobOptions {
    fn apply(&self, mut job: Job) -> Job {
        if let Some(prompt) = &self.prompt {
            job = job.with_prompt(prompt.clone());
        }
        if let Some(cookies) = &self.cookies {
            job = job.with_cookies(cookies.clone());
        }
        if let Some(dir) = &self.output_dir {
            job = job.with_output_dir(dir.clone());
        }
        if let Some(language) = &self.summary_language {
            job = job.with_summary(language.clone(), self.summary_instructions.clone());
        }
        job
    }
}

/// Runs every source through a worker pool. Returns the number of failed jobs.
async fn run_transcribe(
    config: Config,
    sources: Vec<String>,
    options: JobOptions,
    json: bool,
    quiet: bool,
) -> Result<usize> {
    let (sink, events) = ChannelSink::new();
    let pool = WorkerPool::from_config(&config, Arc::new(sink))?;

    let render = tokio::task::spawn_blocking(move || {
        let mut renderer = EventRenderer::new(quiet, json);
        for event in events {
            renderer.handle(event);
        }
        renderer.failed()
    });

    for source in &sources {
        pool.submit(options.apply(job_for_source(source)))?;
    }

    tokio::select! {
        _ = pool.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "Interrupted, finishing running jobs".yellow());
        }
    }
    pool.shutdown().await;

    // The pool held the last sender; the renderer's loop ends once it is gone
    let failed = render.await.context("event renderer panicked")?;
    Ok(failed)
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))
}

async fn run_summarize(
    config: &Config,
    transcript: &Path,
    request: &SummaryRequest,
    output_dir: Option<&Path>,
) -> Result<()> {
    let summarizer = Summarizer::from_config(&config.summary)?;
    let summary = summarizer.summarize(request).await?;

    match output_dir {
        Some(dir) => {
            let stem = transcript
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "transcript".to_string());
            let path = save_summary(dir, &stem, &summary)?;
            eprintln!("{} {}", "Summary saved to".green(), path.display());
        }
        None => println!("{}", summary.text),
    }
    Ok(())
}

fn show_plan(config: &Config, file: &Path) -> Result<()> {
    let probe = DefaultDurationProbe::new(
        Arc::new(SystemCommandExecutor::new()),
        config.tools.ffprobe.clone(),
    );
    let duration = probe.duration_secs(file)?;
    let size = std::fs::metadata(file)
        .with_context(|| format!("cannot read {}", file.display()))?
        .len();

    let planner = ChunkPlanner::new(config.chunking.overlap_secs)
        .with_max_chunk_secs(config.chunking.max_chunk_secs);
    let plan = planner.plan(duration, size, config.chunking.target_chunk_bytes())?;

    if size <= config.engine.max_upload_bytes && duration <= config.chunking.single_call_max_secs {
        println!("{}", "Fits in a single call; no chunking needed.".green());
    }
    print!("{}", format_plan(&plan, size));
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
