//! HEDGESLIP: hedged betting-slip portfolio generator
//!
//! Entry point. Loads configuration, initialises structured logging, and
//! either serves the HTTP API or runs a single generation from a file.
//!
//! ```text
//! hedgeslip [--config config.toml] [serve]
//! hedgeslip [--config config.toml] generate <request.json> [--seed N]
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use hedgeslip::api::{self, ApiState, GenerateRequest};
use hedgeslip::config::AppConfig;
use hedgeslip::rng::CancelFlag;

const BANNER: &str = r#"
 _   _ _____ ____   ____ _____ ____  _     ___ ____
| | | | ____|  _ \ / ___| ____/ ___|| |   |_ _|  _ \
| |_| |  _| | | | | |  _|  _| \___ \| |    | || |_) |
|  _  | |___| |_| | |_| | |___ ___) | |___ | ||  __/
|_| |_|_____|____/ \____|_____|____/|_____|___|_|

  Hedged slip portfolio generator
"#;

#[derive(Parser, Debug)]
#[command(name = "hedgeslip", version, about = "Hedged betting-slip portfolio generator")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Defaults to `serve`.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Serve the HTTP API.
    Serve,
    /// Run one generation from a JSON request file and print the response.
    Generate {
        /// Path to the request JSON.
        path: PathBuf,

        /// Seed overriding the one in the request.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default(&cli.config)?;

    init_logging();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cfg).await,
        Commands::Generate { path, seed } => generate_once(cfg, &path, seed).await,
    }
}

async fn serve(cfg: AppConfig) -> Result<()> {
    println!("{BANNER}");
    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.server.host, cfg.server.port))?;
    info!(
        %addr,
        request_timeout_secs = cfg.server.request_timeout_secs,
        iterations = cfg.engine.simulation.iterations,
        candidates = cfg.engine.generator.num_candidates,
        "HEDGESLIP starting up"
    );

    let state = Arc::new(ApiState::new(
        cfg.slip_builder(),
        Duration::from_secs(cfg.server.request_timeout_secs),
    ));
    api::serve(state, addr).await?;

    info!("HEDGESLIP shut down cleanly.");
    Ok(())
}

/// Run one generation from a request file and print the JSON response.
async fn generate_once(cfg: AppConfig, path: &Path, seed: Option<u64>) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    let request: GenerateRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse request file: {}", path.display()))?;

    let builder = cfg.slip_builder();
    let seed = seed.or(request.seed);
    let response = tokio::task::spawn_blocking(move || {
        builder.generate(&request.master_slip, seed, &CancelFlag::new())
    })
    .await
    .context("generation task failed")??;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hedgeslip=info"));

    let json_logging = std::env::var("HEDGESLIP_LOG_JSON").is_ok();

    // Logs go to stderr so `generate` output stays clean JSON.
    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
