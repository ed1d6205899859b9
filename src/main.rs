//! Chartwise CLI
//!
//! Command-line interface for the chart engine:
//! - Run an intent against a source and print the chart JSON
//! - Print the SQL an intent would run
//! - Generate a default config file

use anyhow::{bail, Context};
use chartwise::config::{self, Config, LoggingConfig};
use chartwise::{query, ChartPipeline, ChartResult, SourceDescriptor};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "chartwise")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn structured chart intents into chart-ready data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an intent and print the chart response
    Run {
        /// Intent JSON, inline or a path to a file
        #[arg(short, long)]
        intent: String,
        /// Source descriptor (JSON or TOML), inline or a path to a file
        #[arg(short, long)]
        source: String,
        /// The user's original question
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Print the SQL an intent would run against a source
    Sql {
        #[arg(short, long)]
        intent: String,
        #[arg(short, long)]
        source: String,
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Run {
            intent,
            source,
            question,
        } => {
            let intent = read_intent(&intent)?;
            let source = read_source(&source)?;
            let pipeline = ChartPipeline::from_config(&config).context("Failed to build adapters")?;

            match pipeline.run_intent(&intent, question.as_deref(), &source).await {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(err) if err.is_empty_outcome() => {
                    tracing::warn!(source = %err.source_id, "{}", err);
                    println!("{}", serde_json::to_string_pretty(&ChartResult::default())?);
                }
                Err(err) => {
                    if let Some(sql) = err.error.sql() {
                        tracing::error!(code = err.error.code(), sql = %sql, "Query failed");
                    }
                    return Err(err).with_context(|| format!("Chart query on {} failed", source.source_id()));
                }
            }
        }

        Commands::Sql {
            intent,
            source,
            question,
        } => {
            let intent = query::validate_intent(&read_intent(&intent)?, question.as_deref())?;
            let source = read_source(&source)?;
            let pipeline = ChartPipeline::from_config(&config).context("Failed to build adapters")?;
            println!("{}", pipeline.describe(&intent.data_query, &source));
        }

        Commands::Config { output } => {
            let config = config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr (or the configured file) so stdout stays pure JSON
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chartwise={}", logging.level)));

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init(),
        other => bail!("Unknown log format `{}` (expected pretty or json)", other),
    }
    Ok(())
}

/// Inline text, or the contents of the file it names
fn read_arg(arg: &str) -> anyhow::Result<(String, Option<PathBuf>)> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('{') || trimmed.contains('\n') || trimmed.contains('=') {
        return Ok((arg.to_string(), None));
    }
    let path = PathBuf::from(arg);
    let content = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok((content, Some(path)))
}

fn read_intent(arg: &str) -> anyhow::Result<serde_json::Value> {
    let (text, _) = read_arg(arg)?;
    serde_json::from_str(&text).context("Intent is not valid JSON")
}

fn read_source(arg: &str) -> anyhow::Result<SourceDescriptor> {
    let (text, path) = read_arg(arg)?;
    let is_toml = path
        .as_deref()
        .and_then(Path::extension)
        .map(|ext| ext == "toml")
        .unwrap_or_else(|| !text.trim_start().starts_with('{'));

    if is_toml {
        toml::from_str(&text).context("Source descriptor is not valid TOML")
    } else {
        serde_json::from_str(&text).context("Source descriptor is not valid JSON")
    }
}
