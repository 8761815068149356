//! CLI binary for beaware.
//!
//! A thin shim over the library crate: maps flags onto `AnalyzerConfig`,
//! runs one analysis (or the HTTP service) and prints the result.

use anyhow::{bail, Context, Result};
use beaware::pipeline::ocr;
use beaware::{
    report, Allergen, AnalysisProgress, AnalysisResult, Analyzer, AnalyzerConfig, Nutrient, Stage,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the analysis stages.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgress for CliProgress {
    fn on_stage(&self, stage: Stage) {
        self.bar.set_message(stage.to_string());
    }

    fn on_recognition_page(&self, page_num: usize, total_pages: usize) {
        self.bar
            .set_message(format!("{}  page {page_num}/{total_pages}", Stage::Recognizing));
    }

    fn on_model_attempt(&self, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            self.bar.println(format!(
                "  {} retrying model call ({attempt}/{max_attempts})",
                red("↻")
            ));
        }
        self.bar
            .set_message(format!("{}  attempt {attempt}/{max_attempts}", Stage::QueryingModel));
    }

    fn on_complete(&self, error: Option<&str>) {
        self.bar.finish_and_clear();
        match error {
            None => eprintln!("{} analysis complete", green("✔")),
            Some(e) => eprintln!("{} {}", red("✘"), e),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a label, print a summary
  beaware analyze label.pdf

  # Full JSON result, French report alongside
  beaware analyze --json --report report.pdf --language fr label.pdf

  # Analyse from URL
  beaware analyze https://example.com/label.pdf

  # Re-render a report from a saved result
  beaware report result.json -o report.pdf --language de

  # Run the HTTP service
  beaware serve --bind 0.0.0.0:8000

  # Check tesseract and the model connection
  beaware probe

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY      API key for the default provider
  LLM_PROVIDER            openrouter (default), openai, anthropic, gemini, mistral, ollama
  LLM_MODEL               Model ID (default: deepseek/deepseek-chat-v3.1)
  LLM_TIMEOUT             Per-call timeout in seconds
  LLM_MAX_RETRIES         Attempts per analysis
  OCR_LANGUAGES           Tesseract languages (e.g. eng+fra+deu+hun)
  TESSERACT_CMD           Path to the tesseract binary
  MIN_TEXT_LENGTH         Pages with fewer characters go to OCR
  PDF_DPI                 OCR rendering DPI
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  CORS_ORIGINS            Comma-separated allowed origins, or *
  MAX_UPLOAD_SIZE_BYTES   Upload limit for the HTTP service

A .env file in the working directory is loaded first.
"#;

/// Extract allergens and nutrition values from food-label PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "beaware",
    version,
    about = "Extract allergens and nutrition values from food-label PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BEAWARE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "BEAWARE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one PDF (local path or HTTP/HTTPS URL).
    Analyze(AnalyzeArgs),
    /// Render a report PDF from a saved JSON result.
    Report(ReportArgs),
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Check the OCR engine and the model connection.
    Probe(ModelArgs),
}

/// Overrides applied on top of the environment configuration.
#[derive(Args, Debug, Clone)]
struct ModelArgs {
    /// LLM provider (openrouter, openai, anthropic, gemini, mistral, ollama).
    #[arg(long)]
    provider: Option<String>,

    /// LLM model ID.
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// UI language echoed in the result and used for the report (en, fr, de, hu).
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Print the full JSON result instead of a summary.
    #[arg(long)]
    json: bool,

    /// Also write a localised report PDF.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Tesseract languages, e.g. eng+fra.
    #[arg(long)]
    ocr_languages: Option<String>,

    /// Disable the spinner.
    #[arg(long, env = "BEAWARE_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// JSON file with `allergens` / `nutritional_values` (or `-` for stdin).
    input: String,

    /// Output PDF path.
    #[arg(short, long, default_value = report::REPORT_FILE_NAME)]
    output: PathBuf,

    /// Report language; overrides `language` in the JSON.
    #[arg(short, long)]
    language: Option<String>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address; overrides BEAWARE_BIND.
    #[arg(long)]
    bind: Option<String>,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        match cli.command {
            // The spinner provides the feedback; keep library logs quiet.
            Command::Analyze(ref a) if !a.no_progress && !a.json => "error",
            _ => "info",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Analyze(args) => run_analyze(args, cli.quiet).await,
        Command::Report(args) => run_report(args, cli.quiet),
        Command::Serve(args) => run_serve(args).await,
        Command::Probe(args) => run_probe(args).await,
    }
}

/// Environment configuration with CLI overrides applied.
fn load_config(model: &ModelArgs) -> Result<AnalyzerConfig> {
    let mut config = AnalyzerConfig::from_env().context("Invalid configuration")?;
    if let Some(ref p) = model.provider {
        config.provider_name = p.clone();
    }
    if let Some(ref m) = model.model {
        config.model = m.clone();
    }
    Ok(config)
}

async fn run_analyze(args: AnalyzeArgs, quiet: bool) -> Result<()> {
    let mut config = load_config(&args.model)?;
    if let Some(ref langs) = args.ocr_languages {
        config.ocr_languages = langs.clone();
    }

    let mut analyzer = Analyzer::from_config(config);
    if !quiet && !args.no_progress && !args.json {
        analyzer = analyzer.with_progress(CliProgress::new());
    }

    let result = analyzer
        .analyze_input(&args.input, &args.language)
        .await
        .with_context(|| format!("Failed to load '{}'", args.input))?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else {
        print_summary(&result);
    }

    if let Some(ref path) = args.report {
        let bytes = report::render(&result, &args.language).context("Report rendering failed")?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        if !quiet {
            eprintln!("{} report → {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if let Some(ref e) = result.error {
        bail!("Analysis failed: {e}");
    }
    Ok(())
}

fn print_summary(result: &AnalysisResult) {
    let meta = &result.metadata;
    println!(
        "{}",
        bold(meta.file_name.as_deref().unwrap_or("(unnamed)"))
    );
    println!(
        "  {}",
        dim(&format!(
            "language={}  confidence={:?}  ocr={}  pages={}  chars={}",
            meta.language_detected,
            meta.confidence,
            meta.ocr_used,
            meta.page_count.unwrap_or(0),
            meta.extracted_text_length.unwrap_or(0)
        ))
    );

    println!("\n{}", bold("Allergens"));
    for allergen in Allergen::ALL {
        let mark = if result.allergens.get(allergen) {
            red("● present")
        } else {
            dim("○ absent")
        };
        println!("  {:<12} {}", allergen.key(), mark);
    }

    println!("\n{}", bold("Nutrition per 100 g"));
    for nutrient in Nutrient::ALL {
        println!(
            "  {:<12} {}",
            nutrient.key(),
            result.nutritional_values.get(nutrient)
        );
    }
}

fn run_report(args: ReportArgs, quiet: bool) -> Result<()> {
    let raw = if args.input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("Failed to read {}", args.input))?
    };

    let mut payload: serde_json::Value =
        serde_json::from_str(&raw).context("Input is not valid JSON")?;
    if let (Some(lang), Some(obj)) = (args.language, payload.as_object_mut()) {
        obj.insert("language".into(), serde_json::Value::String(lang));
    }

    let bytes = report::render_payload(&payload).context("Report rendering failed")?;
    std::fs::write(&args.output, bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    if !quiet {
        eprintln!(
            "{} report → {}",
            green("✔"),
            bold(&args.output.display().to_string())
        );
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.model)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    beaware::server::serve(Analyzer::from_config(config))
        .await
        .context("HTTP service failed")
}

async fn run_probe(args: ModelArgs) -> Result<()> {
    let config = load_config(&args)?;

    let probe_config = config.clone();
    let probe = tokio::task::spawn_blocking(move || ocr::probe(&probe_config))
        .await
        .context("OCR probe panicked")?;

    println!("{}", bold("OCR"));
    if probe.success {
        println!(
            "  {} tesseract {} ({})",
            green("✔"),
            probe.version.as_deref().unwrap_or("?"),
            probe.tesseract_path
        );
        println!(
            "  configured: {}  installed: {}",
            probe.configured_languages,
            probe.available_languages.join(", ")
        );
    } else {
        println!(
            "  {} {}",
            red("✘"),
            probe.error.as_deref().unwrap_or("tesseract not available")
        );
    }

    println!("\n{}", bold("Model"));
    let analyzer = Analyzer::from_config(config);
    let test = analyzer.model().test_connection().await;
    if test.success {
        println!(
            "  {} {}",
            green("✔"),
            dim(test.response.as_deref().unwrap_or(""))
        );
    } else {
        println!(
            "  {} {}",
            red("✘"),
            test.error.as_deref().unwrap_or("connection test failed")
        );
    }

    if !probe.success || !test.success {
        bail!("probe found problems");
    }
    Ok(())
}
