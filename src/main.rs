//! tts-markup CLI
//!
//! `preview` показывает чанки, документ разметки и план батчей без обращения к
//! движку; `synthesize` отправляет текст HTTP-движку и пишет итоговую дорожку в файл.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use tts_markup::notification::LogProgressObserver;
use tts_markup::tts::{EngineCapabilities, HttpEngine};
use tts_markup::utils::logger::{init_logger_with_default, DEFAULT_FILTER, VERBOSE_FILTER};
use tts_markup::{TtsMarkup, TtsMarkupConfig};

#[derive(Parser, Debug)]
#[command(name = "tts-markup")]
#[command(author, version, about = "Inline TTS markup, batching and synthesis through an external engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Text to process, may contain [[key=value;...]] markers
    #[arg(short, long)]
    text: Option<String>,

    /// Read the text from a file
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print chunks, markup document, batches and warnings as JSON
    Preview {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Synthesize the text with an HTTP engine and write the merged track
    Synthesize {
        #[command(flatten)]
        input: InputArgs,

        /// Engine base URL (POST {endpoint}/synthesize, GET {endpoint}/voices)
        #[arg(short, long)]
        endpoint: String,

        /// Output audio file
        #[arg(short, long)]
        output: PathBuf,

        /// The engine does not accept markup documents
        #[arg(long)]
        no_markup: bool,

        /// The engine does not accept style as a request field
        #[arg(long)]
        no_native_style: bool,

        /// The engine does not accept rate/pitch/volume as request fields
        #[arg(long)]
        no_prosody_parameters: bool,
    },
}

impl InputArgs {
    fn read(&self) -> Result<String> {
        match (&self.text, &self.input) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file {}", path.display())),
            (None, None) => anyhow::bail!("Either --text or --input is required"),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TtsMarkupConfig> {
    let config = match path {
        Some(path) => TtsMarkupConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => TtsMarkupConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

/// Движок нужен только для синтеза; preview его не вызывает
fn preview(config: TtsMarkupConfig, text: &str) -> Result<()> {
    let engine = Arc::new(HttpEngine::new("http://localhost", EngineCapabilities::full("preview", env!("CARGO_PKG_VERSION"))));
    let pipeline = TtsMarkup::new(config, engine)?;
    let preview = pipeline.preview(text);

    for warning in &preview.warnings {
        log::warn!("{}", warning);
    }
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

async fn synthesize(config: TtsMarkupConfig, text: &str, engine: HttpEngine, output: &Path) -> Result<()> {
    let mut pipeline = TtsMarkup::new(config, Arc::new(engine))?;
    pipeline.add_observer(Box::new(LogProgressObserver::new()));

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current batch");
            signal_token.cancel();
        }
    });

    let result = pipeline.synthesize_text(text, Some(cancel)).await;
    pipeline.shutdown().await;
    let result = result.context("Synthesis failed")?;

    for warning in &result.warnings {
        log::warn!("{}", warning);
    }
    if result.track.is_empty() {
        log::warn!("Input produced no speech, writing an empty file");
    }
    tokio::fs::write(output, &result.track.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "output": output.display().to_string(),
            "bytes": result.track.len(),
            "format": result.track.format,
            "chunks": result.resolved_chunks.len(),
            "warnings": result.warnings,
        }))?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger_with_default(if cli.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER });

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Preview { input } => preview(config, &input.read()?),
        Command::Synthesize {
            input,
            endpoint,
            output,
            no_markup,
            no_native_style,
            no_prosody_parameters,
        } => {
            let capabilities = EngineCapabilities {
                markup: !no_markup,
                native_style: !no_native_style,
                prosody_parameters: !no_prosody_parameters,
                ..EngineCapabilities::full("http", env!("CARGO_PKG_VERSION"))
            };
            let engine = HttpEngine::new(endpoint, capabilities);
            synthesize(config, &input.read()?, engine, &output).await
        }
    }
}
