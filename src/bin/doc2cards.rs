//! CLI binary for doc2cards.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig`, runs every input through one shared pipeline and
//! prints the cards.

use anyhow::{Context, Result};
use clap::Parser;
use doc2cards::{
    classify_and_log, resolve_input, write_output, ClassifiedError, ErrorBody, FlashcardPipeline,
    GenerationConfig, GenerationOutput, LlmModelClient,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Cards for a text file, printed as Q/A pairs
  doc2cards notes.txt

  # Several documents at once, JSON response bodies
  doc2cards --json lecture.pdf chapter3.docx handout.doc

  # Write the JSON body to a file
  doc2cards lecture.pdf -o cards.json

  # Download from a URL, forcing the declared type
  doc2cards --mime application/pdf https://example.com/download?id=42

  # Use a specific model and retry rate-limited calls twice
  doc2cards --provider openai --model gpt-4o --max-retries 2 notes.txt

SUPPORTED FORMATS:
  text/plain                  .txt
  application/pdf             .pdf   (text layer only, no OCR)
  application/vnd.openxmlformats-officedocument.wordprocessingml.document
                              .docx
  application/msword          .doc   (Word 97-2003)

EXIT STATUS:
  0 when every document produced flashcards, 1 otherwise. Each failure is
  reported as "[status category] message", e.g. "[429 RateLimited] ...".

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium, needed for PDF input when it is
                          not installed system-wide
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Upper bound for `--max-size-mb`.
const MAX_SIZE_MB: u64 = 4096;

/// Generate question/answer flashcards from documents using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "doc2cards",
    version,
    about = "Generate question/answer flashcards from documents using an LLM",
    long_about = "Extract the text of plain-text, PDF and Word documents (local files or URLs) \
and ask an LLM to turn it into question/answer flashcards. Supports OpenAI, Anthropic, \
Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Declared MIME type for every input (default: detect from header or extension).
    #[arg(long, env = "DOC2CARDS_MIME")]
    mime: Option<String>,

    /// Write the JSON response body to this file (single input only).
    #[arg(short, long, env = "DOC2CARDS_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4o-mini, gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Max tokens the model may generate for the card array.
    #[arg(long, env = "DOC2CARDS_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0). Default: provider default.
    #[arg(long, env = "DOC2CARDS_TEMPERATURE")]
    temperature: Option<f32>,

    /// Retries for rate-limited LLM calls. Other failures are never retried.
    #[arg(long, env = "DOC2CARDS_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// LLM call timeout in seconds (0 disables).
    #[arg(long, env = "DOC2CARDS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC2CARDS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Largest accepted document in MiB (1 to 4096).
    #[arg(long, env = "DOC2CARDS_MAX_SIZE_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..=MAX_SIZE_MB))]
    max_size_mb: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DOC2CARDS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Number of documents processed concurrently.
    #[arg(short, long, env = "DOC2CARDS_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u64).range(1..=64))]
    concurrency: u64,

    /// Print the JSON response body instead of Q/A text.
    #[arg(long, env = "DOC2CARDS_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOC2CARDS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2CARDS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2CARDS_QUIET")]
    quiet: bool,
}

/// Outcome for one input, in command-line order.
struct Outcome {
    input: String,
    result: Result<GenerationOutput, ClassifiedError>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; keep INFO logs out of
    // its way unless verbose output was asked for.
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

    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output accepts a single input, got {}", cli.inputs.len());
    }

    let config = build_config(&cli).await?;
    let pipeline =
        FlashcardPipeline::from_config(&config).context("Failed to set up the LLM provider")?;

    // ── Run every input ──────────────────────────────────────────────────
    let bar = show_progress.then(|| spinner(cli.inputs.len()));
    let outcomes = run_all(&cli, &config, &pipeline, bar.as_ref()).await;
    // The spinner already printed one line per input.
    let reported_live = bar.is_some();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    // ── Report ───────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        if let Some(Outcome {
            result: Ok(output), ..
        }) = outcomes.first()
        {
            write_output(output, output_path)
                .await
                .context("Failed to write flashcards")?;
        }
    } else if cli.json {
        print_json(&outcomes)?;
    } else {
        print_text(&outcomes)?;
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if !reported_live {
        for outcome in &outcomes {
            if let Err(ref e) = outcome.result {
                eprintln!("{} {}: {}", red("✗"), bold(&outcome.input), e);
            }
        }
    }

    if !cli.quiet {
        print_summary(&outcomes, cli.output.as_ref());
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} documents failed", outcomes.len());
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(cli: &Cli) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_document_bytes(mib_to_bytes(cli.max_size_mb));

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

fn mib_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

fn spinner(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  {pos}/{len} documents  ⏱ {elapsed_precise}  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner())
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

    bar.set_style(style);
    bar.set_prefix("Generating");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Resolve and process every input, at most `concurrency` at a time.
async fn run_all(
    cli: &Cli,
    config: &GenerationConfig,
    pipeline: &FlashcardPipeline<LlmModelClient>,
    bar: Option<&ProgressBar>,
) -> Vec<Outcome> {
    let mime = cli.mime.as_deref();

    let mut indexed: Vec<(usize, Outcome)> =
        stream::iter(cli.inputs.iter().enumerate().map(|(idx, input)| async move {
            if let Some(bar) = bar {
                bar.set_message(input.clone());
            }
            let result = match resolve_input(input, mime, config).await {
                Ok(document) => pipeline.respond(Some(&document)).await,
                Err(e) => Err(classify_and_log(&e)),
            };
            if let Some(bar) = bar {
                match &result {
                    Ok(output) => bar.println(format!(
                        "  {} {}  {}",
                        green("✓"),
                        input,
                        dim(&format!(
                            "{} cards  {:.1}s",
                            output.flashcards.len(),
                            output.stats.total_duration_ms as f64 / 1000.0
                        )),
                    )),
                    Err(e) => bar.println(format!("  {} {}  {}", red("✗"), input, red(&e.to_string()))),
                }
                bar.inc(1);
            }
            (
                idx,
                Outcome {
                    input: input.clone(),
                    result,
                },
            )
        }))
        .buffer_unordered(cli.concurrency as usize)
        .collect()
        .await;

    indexed.sort_by_key(|(idx, _)| *idx);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

/// One body for a single input; an array of tagged bodies otherwise.
fn print_json(outcomes: &[Outcome]) -> Result<()> {
    let bodies: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(output) => serde_json::to_value(output),
            Err(e) => serde_json::to_value(ErrorBody::from(e)),
        })
        .collect::<Result<_, _>>()
        .context("Failed to serialise output")?;

    let value = match bodies.as_slice() {
        [single] => single.clone(),
        _ => serde_json::Value::Array(
            outcomes
                .iter()
                .zip(bodies)
                .map(|(o, body)| {
                    let status = match &o.result {
                        Ok(_) => 200,
                        Err(e) => e.status,
                    };
                    serde_json::json!({ "input": o.input, "status": status, "body": body })
                })
                .collect(),
        ),
    };

    let json = serde_json::to_string_pretty(&value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn print_text(outcomes: &[Outcome]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let many = outcomes.len() > 1;

    for outcome in outcomes {
        let Ok(ref output) = outcome.result else {
            continue;
        };
        if many {
            writeln!(handle, "{}", bold(&format!("# {}", outcome.input)))
                .context("Failed to write to stdout")?;
        }
        for card in &output.flashcards {
            writeln!(handle, "Q: {}\nA: {}\n", card.question, card.answer)
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn print_summary(outcomes: &[Outcome], output_path: Option<&PathBuf>) {
    let succeeded: Vec<&GenerationOutput> =
        outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
    let cards: usize = succeeded.iter().map(|o| o.flashcards.len()).sum();
    let tokens_in: usize = succeeded.iter().map(|o| o.stats.prompt_tokens).sum();
    let tokens_out: usize = succeeded.iter().map(|o| o.stats.completion_tokens).sum();

    let mark = if succeeded.len() == outcomes.len() {
        green("✔")
    } else if succeeded.is_empty() {
        red("✘")
    } else {
        cyan("⚠")
    };

    match output_path {
        Some(path) if !succeeded.is_empty() => eprintln!(
            "{}  {} cards from {}/{} documents  →  {}",
            mark,
            bold(&cards.to_string()),
            succeeded.len(),
            outcomes.len(),
            bold(&path.display().to_string()),
        ),
        _ => eprintln!(
            "{}  {} cards from {}/{} documents",
            mark,
            bold(&cards.to_string()),
            succeeded.len(),
            outcomes.len(),
        ),
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&tokens_in.to_string()),
        dim(&tokens_out.to_string()),
    );
}
