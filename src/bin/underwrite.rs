//! CLI binary for edgequake-underwrite.
//!
//! The terminal presentation layer: maps flags to `AssessmentConfig`, renders
//! the orchestrator's events as they arrive, and prints the verdict markdown
//! to stdout unchanged.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_underwrite::prompts::DEFAULT_RULES;
use edgequake_underwrite::secrets::{self, ApiKey, DEFAULT_KEY_VAR};
use edgequake_underwrite::{
    AssessmentConfig, AssessmentEvent, AssessmentObserver, AssessmentPhase, Assessor,
    ChatCompletionsClient, InferenceClient, PdfiumExtractor, ProviderClient, RiskLevel, RuleText,
    Severity, UnderwriteError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Renders assessment events as a spinner plus one line per notable event.
struct CliObserver {
    bar: ProgressBar,
    /// Spinner visible; lines go through the bar so they don't tear it.
    show_progress: bool,
    /// Only warnings and errors are printed.
    quiet: bool,
}

impl CliObserver {
    fn new(show_progress: bool, quiet: bool) -> Self {
        let bar = if show_progress {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.set_prefix("Processing");
            bar.set_message("files… this may take a moment");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            show_progress,
            quiet,
        }
    }

    /// Stop the spinner and report an error that never reached `on_event`.
    fn fail(&self, e: &UnderwriteError) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✗"), red(&shorten(&e.to_string(), 160)));
    }

    fn line(&self, s: String) {
        if self.show_progress {
            self.bar.println(s);
        } else {
            eprintln!("{s}");
        }
    }
}

/// Keep one-line messages tidy; the full text is in the debug log.
fn shorten(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

impl AssessmentObserver for CliObserver {
    fn on_event(&self, event: &AssessmentEvent) {
        match event {
            AssessmentEvent::PhaseChanged { to, .. } if to.is_terminal() => {
                self.bar.finish_and_clear();
            }
            AssessmentEvent::PhaseChanged { to, .. } => {
                self.bar.set_prefix(event.to_string());
                self.bar.set_message("");
                if !self.quiet {
                    let icon = match to {
                        AssessmentPhase::ExtractingReport => "📄",
                        AssessmentPhase::AnalyzingImages => "🖼️ ",
                        _ => "🧠",
                    };
                    self.line(format!("{} {}…", icon, bold(&event.to_string())));
                }
            }
            AssessmentEvent::ImageStarted { name, .. } => {
                self.bar.set_message(name.clone());
            }
            _ => match event.severity() {
                Severity::Info if !self.quiet => {
                    self.line(format!("  {} {}", green("✓"), dim(&event.to_string())));
                }
                Severity::Info => {}
                Severity::Warning => {
                    self.line(format!("  {} {}", yellow("⚠"), yellow(&event.to_string())));
                }
                Severity::Error => {
                    self.line(format!(
                        "  {} {}",
                        red("✗"),
                        red(&shorten(&event.to_string(), 160))
                    ));
                }
            },
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Assess a property with the default guidelines
  underwrite --report appraisal.pdf --image roof.jpg --image panel.png

  # Use your own guidelines
  underwrite --report appraisal.pdf --image roof.jpg --rules my_rules.txt

  # Start from the default guidelines
  underwrite --print-default-rules > my_rules.txt

  # Describe up to four photos at once
  underwrite -c 4 --report appraisal.pdf --image *.jpg

  # Use an edgequake-llm provider instead of Groq
  underwrite --provider openai --model gpt-4.1-mini --report a.pdf --image roof.jpg

ENVIRONMENT VARIABLES:
  GROQ_API_KEY            API key for the default endpoint
  UNDERWRITE_SECRETS      Secrets file (default .underwrite/secrets.toml)
  OPENAI_API_KEY, …       Keys read by --provider backends
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)

SECRETS FILE:
  GROQ_API_KEY = "gsk_..."
"#;

/// Assess property insurance risk from an appraisal report and photos.
#[derive(Parser, Debug)]
#[command(
    name = "underwrite",
    version,
    about = "Assess property insurance risk from an appraisal report and photos using Vision LLMs",
    long_about = "Extracts the appraisal report text, asks a vision model to describe each \
property photo, and asks the same model for an overall risk level and justification under \
your underwriting guidelines.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Appraisal report (PDF).
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Property photo (JPG, PNG). Repeat for several; order is kept.
    #[arg(short, long = "image", value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Text file with underwriting guidelines. Default: built-in rulebook.
    #[arg(long, env = "UNDERWRITE_RULES")]
    rules: Option<PathBuf>,

    /// Print the built-in guidelines and exit.
    #[arg(long)]
    print_default_rules: bool,

    /// Model ID used for every call.
    #[arg(long, env = "UNDERWRITE_MODEL", default_value = edgequake_underwrite::DEFAULT_MODEL)]
    model: String,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, …) instead of
    /// the chat-completions endpoint.
    #[arg(long, env = "UNDERWRITE_PROVIDER")]
    provider: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "UNDERWRITE_BASE_URL", default_value = edgequake_underwrite::inference::DEFAULT_BASE_URL)]
    base_url: String,

    /// Environment variable / secrets key holding the API key.
    #[arg(long, default_value = DEFAULT_KEY_VAR)]
    api_key_var: String,

    /// Secrets TOML file.
    #[arg(long)]
    secrets: Option<PathBuf>,

    /// Number of image calls in flight at once.
    #[arg(short, long, env = "UNDERWRITE_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Skip images larger than this many bytes.
    #[arg(long, env = "UNDERWRITE_MAX_IMAGE_BYTES", default_value_t = edgequake_underwrite::config::DEFAULT_MAX_IMAGE_BYTES)]
    max_image_bytes: usize,

    /// Report characters kept as evidence.
    #[arg(long, env = "UNDERWRITE_REPORT_CHARS", default_value_t = edgequake_underwrite::config::DEFAULT_REPORT_CHAR_LIMIT)]
    report_chars: usize,

    /// HTTP timeout in seconds (default: transport default).
    #[arg(long, env = "UNDERWRITE_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable the spinner.
    #[arg(long, env = "UNDERWRITE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "UNDERWRITE_VERBOSE")]
    verbose: bool,

    /// Only print warnings, errors and the verdict.
    #[arg(short, long, env = "UNDERWRITE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_default_rules {
        print!("{DEFAULT_RULES}");
        return Ok(());
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner and event lines are the user-facing output; library logs
    // stay at ERROR unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Credential / client (startup-fatal) ──────────────────────────────
    let client: Arc<dyn InferenceClient> = match &cli.provider {
        Some(name) => Arc::new(ProviderClient::from_name(name, &cli.model).map_err(report_fatal)?),
        None => {
            let secrets_path = cli.secrets.clone().unwrap_or_else(secrets::default_secrets_path);
            let key = ApiKey::load(&cli.api_key_var, &secrets_path).map_err(report_fatal)?;
            let mut http = ChatCompletionsClient::new(key).with_base_url(&cli.base_url);
            if let Some(secs) = cli.api_timeout {
                http = http.with_timeout(secs)?;
            }
            Arc::new(http)
        }
    };

    // ── Config ───────────────────────────────────────────────────────────
    let rules = match &cli.rules {
        Some(path) => RuleText::from_file(path)
            .with_context(|| format!("reading guidelines from {}", path.display()))?,
        None => RuleText::default(),
    };

    let config = AssessmentConfig::builder()
        .model(&cli.model)
        .concurrency(cli.concurrency)
        .max_image_bytes(cli.max_image_bytes)
        .report_char_limit(cli.report_chars)
        .build()?;

    let extractor = match &cli.pdfium_lib {
        Some(path) => PdfiumExtractor::with_library_path(path),
        None => PdfiumExtractor::from_env(),
    };
    let assessor = Assessor::new(client, config).with_extractor(Arc::new(extractor));

    // ── Run ──────────────────────────────────────────────────────────────
    let observer = CliObserver::new(show_progress, cli.quiet);
    let result = assessor
        .assess_files(cli.report.as_ref(), &cli.images.iter().collect::<Vec<_>>(), &rules, &observer)
        .await;

    match result {
        Ok(report) => {
            let level = report
                .risk_level
                .map(|l| match l {
                    RiskLevel::Low => green(l.label()),
                    RiskLevel::Medium => yellow(l.label()),
                    RiskLevel::High | RiskLevel::Unacceptable => red(l.label()),
                })
                .unwrap_or_else(|| dim("level not stated"));
            eprintln!(
                "\n{} {}  {}",
                green("✅"),
                bold("Final Underwriting Assessment"),
                level
            );
            if !cli.quiet {
                eprintln!(
                    "{}",
                    dim(&format!(
                        "{}/{} images analyzed, {} skipped, {} tokens in / {} out, {:.1}s",
                        report.stats.analyzed_images,
                        report.stats.total_images,
                        report.stats.rejected_images,
                        report.stats.total_input_tokens,
                        report.stats.total_output_tokens,
                        report.stats.total_duration_ms as f64 / 1000.0
                    ))
                );
            }
            println!("{}", report.verdict);
            Ok(())
        }
        // Already shown by the observer; the session just ends without a verdict.
        Err(e @ UnderwriteError::InputMissing { .. })
        | Err(e @ UnderwriteError::SynthesisFailed { .. }) => {
            tracing::debug!("Run ended in {:?}: {}", e.terminal_phase(), e);
            Ok(())
        }
        Err(e) => {
            observer.fail(&e);
            Err(e.into())
        }
    }
}

/// Print a startup-fatal error once, in the same style as run errors.
fn report_fatal(e: UnderwriteError) -> anyhow::Error {
    eprintln!("{} {}", red("✗"), red(&e.to_string()));
    anyhow::anyhow!("cannot start without a configured inference backend")
}
