//! marathon-tlb: a TCP load balancer fed by Marathon.
//!
//! # Architecture Overview
//!
//! ```text
//!   Marathon REST + SSE
//!          │
//!          ▼
//!   ┌──────────────┐   Command (mpsc)   ┌──────────────┐
//!   │  discovery   │ ─────────────────▶ │   dispatch   │
//!   │  processor   │                    │    router    │
//!   └──────────────┘                    └──────┬───────┘
//!                                              │ one per app
//!                                              ▼
//!   client ──────▶ frontend listener ──▶ strategy ──▶ relay ──▶ backend task
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use marathon_tlb::config::validation::validate_config;
use marathon_tlb::config::{load_config, ConfigError, TlbConfig};
use marathon_tlb::lifecycle;
use marathon_tlb::observability::logging;

#[derive(Parser)]
#[command(name = "marathon-tlb")]
#[command(about = "TCP load balancer for applications running on Marathon", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Marathon base URL, overriding the configuration file.
    #[arg(short, long)]
    marathon_url: Option<String>,

    /// Log level, overriding the configuration file.
    #[arg(short, long)]
    log_level: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<TlbConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TlbConfig::default(),
    };
    if let Some(url) = &cli.marathon_url {
        config.marathon.url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("marathon-tlb: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        marathon = %config.marathon.url,
        bind_host = %config.listener.bind_host,
        static_frontends = config.frontends.len(),
        "marathon-tlb starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "marathon-tlb exiting");
            ExitCode::FAILURE
        }
    }
}
