//! llm-mock CLI - LLM chat completion emulator
//!
//! Usage:
//!   llm-mock serve [OPTIONS]          Start the HTTP server
//!   llm-mock split <INPUT> [OPTIONS]  Build a corpus file from plain text
//!   llm-mock rate <FILE>              Measure bytes per token of a text file
//!
//! Examples:
//!   llm-mock serve --config config.yaml
//!   llm-mock serve --config config.yaml --port 9000
//!   llm-mock split novel.txt -o tokens.json

use clap::{Parser, Subcommand};
use llm_mock::cli::{Config, ConfigError};
use llm_mock::tokenizer::Tokenizer;
use llm_mock::tokens::BYTES_PER_TOKEN;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "llm-mock")]
#[command(author, version, about = "LLM chat completion emulator", long_about = None)]
struct Cli {
    /// Enable JSON logging
    #[arg(long, global = true, env = "LLM_MOCK_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the llm-mock HTTP server
    Serve {
        /// Configuration file path (YAML)
        #[arg(short, long, default_value = "config.yaml", env = "LLM_MOCK_CONFIG")]
        config: PathBuf,

        /// Port to listen on (overrides the configuration file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the configuration file)
        #[arg(long)]
        host: Option<String>,
    },
    /// Split a text file into a corpus of single-token fragments
    Split {
        /// Plain text input file
        input: PathBuf,

        /// Output corpus file (defaults to `<INPUT>.tokens.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the bytes-per-token ratio of a text file
    Rate {
        /// Plain text input file
        file: PathBuf,
    },
}

fn build_config(
    path: PathBuf,
    port: Option<u16>,
    host: Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = Config::from_file(&path)?;

    // Override with CLI arguments
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    Ok(config)
}

fn split(
    input: PathBuf,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&input)?;
    let tokens = Tokenizer::new()?.split_text(&text)?;

    let json = if pretty {
        serde_json::to_string_pretty(&tokens)?
    } else {
        serde_json::to_string(&tokens)?
    };

    let output = output.unwrap_or_else(|| {
        let mut name = input.clone().into_os_string();
        name.push(".tokens.json");
        PathBuf::from(name)
    });
    std::fs::write(&output, json)?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        fragments = tokens.len(),
        "Corpus written"
    );
    Ok(())
}

fn rate(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&file)?;
    let tokenizer = Tokenizer::new()?;

    println!("bytes:           {}", text.len());
    println!("tokens:          {}", tokenizer.count(&text));
    println!("bytes per token: {:.4}", tokenizer.byte_token_rate(&text));
    println!("fast counter:    {:.2}", BYTES_PER_TOKEN);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "llm_mock=info,tower_http=info".into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Serve { config, port, host } => {
            let config = build_config(config, port, host)?;
            llm_mock::cli::run_server(config).await?;
        }
        Commands::Split {
            input,
            output,
            pretty,
        } => split(input, output, pretty)?,
        Commands::Rate { file } => rate(file)?,
    }

    Ok(())
}
