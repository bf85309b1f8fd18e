//! CLI binary for resume-insight.
//!
//! A thin shim over the library crate. Each subcommand corresponds to one
//! operation of [`Pipeline`]; flags map onto [`PipelineConfig`].

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use resume_insight::pipeline::{encode, input};
use resume_insight::{
    display_outcome, Credential, ExtractionProgress, GeminiModel, GenerationOptions,
    GenerativeModel, Pipeline, PipelineConfig, PromptStore, ProviderModel, StageKind,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Progress bar over extraction events ──────────────────────────────────────

/// Terminal progress: a bar over pages plus one log line per page. Pages may
/// finish out of order when extraction runs concurrently.
struct CliProgress {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering résumé…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut times| times.remove(&page_num))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractionProgress for CliProgress {
    fn on_extraction_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, record_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{record_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.finish_and_clear();
    }

    fn on_extraction_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages extracted",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Write the default prompt templates to ./prompts
  resume-insight init-prompts

  # Extract a résumé against a job description
  resume-insight process cv.pdf --job-file job.txt

  # Keep the rendered pages
  resume-insight process cv.pdf --job-description "Backend engineer" --pages-dir pages/

  # Show the extracted data, then generate artifacts
  resume-insight show
  resume-insight generate interview-questions
  resume-insight generate skill-gap
  resume-insight generate cover-letter

  # Separate state per user
  resume-insight --session alice process cv.pdf --job-file job.txt

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY / GEMINI_API_KEY   Gemini API key
  RESUME_INSIGHT_PROVIDER           gemini (default) or an edgequake-llm provider
                                    (openai, anthropic, ollama, …) that reads its
                                    own key from the environment
  RESUME_INSIGHT_STATE_DIR          Where the latest run is persisted
  RESUME_INSIGHT_PROMPTS_DIR        Where the prompt templates live
  PDFIUM_LIB_PATH                   Directory containing libpdfium
  RUST_LOG                          Overrides the log filter

A .env file in the working directory is loaded on startup.
"#;

/// Analyse a résumé PDF against a job description with generative models.
#[derive(Parser, Debug)]
#[command(
    name = "resume-insight",
    version,
    about = "Extract résumé data and generate interview questions, skill-gap analyses and cover letters",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// API key for the Gemini backend (falls back to GEMINI_API_KEY).
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model backend: gemini, or any edgequake-llm provider name.
    #[arg(long, global = true, env = "RESUME_INSIGHT_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Text model used by the generation stages.
    #[arg(long, global = true, env = "RESUME_INSIGHT_MODEL")]
    model: Option<String>,

    /// Vision model used for extraction. Defaults to --model when set.
    #[arg(long, global = true, env = "RESUME_INSIGHT_VISION_MODEL")]
    vision_model: Option<String>,

    /// Directory holding the prompt templates.
    #[arg(long, global = true, env = "RESUME_INSIGHT_PROMPTS_DIR", default_value = "prompts")]
    prompts_dir: PathBuf,

    /// Directory holding the persisted state.
    #[arg(long, global = true, env = "RESUME_INSIGHT_STATE_DIR", default_value = ".resume-insight")]
    state_dir: PathBuf,

    /// Keep state in a separate slot named by this id.
    #[arg(long, global = true, env = "RESUME_INSIGHT_SESSION")]
    session: Option<String>,

    /// Rendering DPI (36–400).
    #[arg(long, global = true, env = "RESUME_INSIGHT_DPI", default_value_t = 72,
          value_parser = clap::value_parser!(u32).range(36..=400))]
    dpi: u32,

    /// Pages extracted concurrently.
    #[arg(long, global = true, env = "RESUME_INSIGHT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Retries per page on a transient model error.
    #[arg(long, global = true, env = "RESUME_INSIGHT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per model call timeout in seconds.
    #[arg(long, global = true, env = "RESUME_INSIGHT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds, for URL inputs.
    #[arg(long, global = true, env = "RESUME_INSIGHT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Remove a code fence wrapping each extracted record.
    #[arg(long, global = true, env = "RESUME_INSIGHT_STRIP_FENCES")]
    strip_fences: bool,

    /// Directory containing the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RESUME_INSIGHT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RESUME_INSIGHT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render and extract a résumé, then persist it with the job description.
    Process(ProcessArgs),
    /// Print the extracted data of the latest run as JSON.
    Show,
    /// Generate one artifact from the latest run.
    Generate {
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// Write the built-in prompt templates to the prompts directory.
    InitPrompts {
        /// Overwrite existing template files.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Job description text.
    #[arg(long, conflicts_with = "job_file", required_unless_present = "job_file")]
    job_description: Option<String>,

    /// File containing the job description.
    #[arg(long)]
    job_file: Option<PathBuf>,

    /// Also write the rendered pages as page-NNN.png into this directory.
    #[arg(long)]
    pages_dir: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long, env = "RESUME_INSIGHT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    InterviewQuestions,
    SkillGap,
    CoverLetter,
}

impl From<KindArg> for StageKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::InterviewQuestions => StageKind::InterviewQuestions,
            KindArg::SkillGap => StageKind::SkillGap,
            KindArg::CoverLetter => StageKind::CoverLetter,
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let g = &cli.global;

    // The progress bar gives the feedback that matters during `process`,
    // so library INFO logs are only shown when it is off.
    let show_progress = matches!(&cli.command, Command::Process(p) if !p.no_progress) && !g.quiet;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(g)?;

    if let Command::InitPrompts { force } = cli.command {
        let store = PromptStore::new(&config.prompt_dir);
        let written = store
            .write_defaults(force)
            .await
            .context("Failed to write prompt templates")?;
        if !g.quiet {
            for path in &written {
                eprintln!("{} {}", green("✓"), path.display());
            }
            if written.is_empty() {
                eprintln!("All templates already exist; use --force to overwrite.");
            }
        }
        return Ok(());
    }

    let (model, credential) = build_model(g, &config)?;
    if credential.is_provider_managed()
        && is_gemini(g)
        && !matches!(cli.command, Command::Show)
    {
        bail!("No API key: pass --api-key or set GOOGLE_API_KEY / GEMINI_API_KEY");
    }
    let mut pipeline = Pipeline::new(config, model);
    if let Some(ref id) = g.session {
        pipeline = pipeline.with_session(id).context("Invalid --session")?;
    }

    match cli.command {
        Command::Process(ref args) => {
            run_process(&cli.global, args, pipeline, &credential, show_progress).await
        }
        Command::Show => print_outcome(pipeline.view_extracted_data().await),
        Command::Generate { kind } => {
            print_outcome(pipeline.generate_artifact(kind.into(), &credential).await)
        }
        Command::InitPrompts { .. } => Ok(()),
    }
}

/// Map global flags to `PipelineConfig`.
fn build_config(g: &GlobalArgs) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .prompt_dir(&g.prompts_dir)
        .state_dir(&g.state_dir)
        .dpi(g.dpi)
        .extraction_concurrency(g.concurrency)
        .max_retries(g.max_retries)
        .api_timeout_secs(g.api_timeout)
        .download_timeout_secs(g.download_timeout)
        .strip_code_fences(g.strip_fences);

    if let Some(ref model) = g.model {
        builder = builder.text_model(model).vision_model(model);
    }
    if let Some(ref vision) = g.vision_model {
        builder = builder.vision_model(vision);
    }
    if let Some(ref dir) = g.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir);
    }

    builder.build().context("Invalid configuration")
}

fn is_gemini(g: &GlobalArgs) -> bool {
    g.provider.eq_ignore_ascii_case("gemini")
}

/// Pick the backend and the credential it is called with.
///
/// A missing Gemini key yields a provider-managed credential; calls made
/// with it fail with `MissingCredential`.
fn build_model(
    g: &GlobalArgs,
    config: &PipelineConfig,
) -> Result<(Arc<dyn GenerativeModel>, Credential)> {
    let options = GenerationOptions::from(config);

    if is_gemini(g) {
        let credential = g
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .and_then(|key| Credential::api_key(key).ok())
            .unwrap_or_else(Credential::provider_managed);
        let model = GeminiModel::new(&config.vision_model, &config.text_model, options)
            .context("Failed to build the Gemini client")?;
        return Ok((Arc::new(model), credential));
    }

    // The config defaults name Gemini models, which no other provider serves.
    if g.model.is_none() {
        bail!(
            "Provider '{}' needs a model: pass --model (or set RESUME_INSIGHT_MODEL)",
            g.provider
        );
    }

    let model = ProviderModel::from_factory(
        &g.provider,
        &config.vision_model,
        &config.text_model,
        options,
    )
    .with_context(|| format!("Failed to set up provider '{}'", g.provider))?;
    Ok((Arc::new(model), Credential::provider_managed()))
}

async fn run_process(
    g: &GlobalArgs,
    args: &ProcessArgs,
    pipeline: Pipeline,
    credential: &Credential,
    show_progress: bool,
) -> Result<()> {
    let job_description = match (&args.job_description, &args.job_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description from {:?}", path))?,
        (None, None) => bail!("Pass --job-description or --job-file"),
    };

    let pdf_bytes = input::resolve_input(&args.input, pipeline.config().download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load '{}'", args.input))?;

    let progress = show_progress.then(CliProgress::new);
    let pipeline = match &progress {
        Some(p) => pipeline.with_progress(p.clone()),
        None => pipeline,
    };

    let result = pipeline
        .process_resume(pdf_bytes, &job_description, credential)
        .await;
    if let Some(p) = &progress {
        p.abandon();
    }
    let processed = result.context("Processing failed")?;

    if let Some(ref dir) = args.pages_dir {
        write_pages(dir, &processed.pages).await?;
        if !g.quiet {
            eprintln!(
                "{} {} page images → {}",
                green("✔"),
                processed.pages.len(),
                bold(&dir.display().to_string())
            );
        }
    }

    if !g.quiet {
        eprintln!(
            "{} Saved run {}  {}",
            green("✔"),
            bold(&processed.state.run_id.to_string()),
            dim(&processed.state.saved_at.to_rfc3339()),
        );
        eprintln!(
            "   Next: {}",
            cyan("resume-insight show | resume-insight generate <kind>")
        );
    }
    Ok(())
}

async fn write_pages(dir: &Path, pages: &[resume_insight::PageImage]) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {:?}", dir))?;
    for page in pages {
        let path = dir.join(format!("page-{:03}.png", page.page_num()));
        let png = encode::png_bytes(&page.image)
            .with_context(|| format!("Failed to encode page {}", page.page_num()))?;
        tokio::fs::write(&path, png)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
    }
    Ok(())
}

/// Print a result the way the UI tabs show it; failures still exit non-zero.
fn print_outcome(result: Result<String, resume_insight::PipelineError>) -> Result<()> {
    let failed = result.is_err();
    println!("{}", display_outcome(result));
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("resume-insight").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn other_providers_require_an_explicit_model() {
        let cli = parse(&["--provider", "openai", "show"]);
        let config = build_config(&cli.global).unwrap();
        assert_eq!(config.text_model, PipelineConfig::default().text_model);

        let err = match build_model(&cli.global, &config) {
            Ok(_) => panic!("a Gemini model id was accepted for openai"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("--model"), "got: {err}");
        assert!(err.contains("openai"), "got: {err}");
    }

    #[test]
    fn gemini_runs_on_the_default_models() {
        let cli = parse(&["--api-key", "test-key", "show"]);
        let config = build_config(&cli.global).unwrap();
        let (model, credential) = build_model(&cli.global, &config).unwrap();
        assert!(!credential.is_provider_managed());
        assert!(model.name().contains(&config.vision_model), "got: {}", model.name());
    }

    #[test]
    fn model_flag_sets_both_models_and_vision_model_overrides() {
        let cli = parse(&["--model", "gpt-4o", "--vision-model", "gpt-4o-mini", "show"]);
        let config = build_config(&cli.global).unwrap();
        assert_eq!(config.text_model, "gpt-4o");
        assert_eq!(config.vision_model, "gpt-4o-mini");
    }
}
