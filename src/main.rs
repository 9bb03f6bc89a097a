//! rproxy
//!
//! A reverse proxy that shares one plaintext port between SSH and HTTP and
//! routes HTTPS traffic to container workloads by their labels.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌────────────────────────────────────────────────────┐
//!                         │                      RPROXY                        │
//!                         │                                                    │
//!   Client (port 80)      │  ┌──────────┐   ┌──────────┐   SSH   ┌───────────┐ │
//!   ──────────────────────┼─▶│ listener │──▶│ classify │───────▶│passthrough│─┼──▶ SSH upstream
//!                         │  └──────────┘   └────┬─────┘         └───────────┘ │
//!                         │                      │ HTTP                        │
//!                         │                      ▼                             │
//!                         │                ┌──────────┐    302 to https://     │
//!                         │                │ handoff  │──▶ redirect router     │
//!                         │                └──────────┘                        │
//!                         │                                                    │
//!   Client (port 443)     │  ┌──────────┐   ┌──────────┐   ┌──────────────┐    │
//!   ──────────────────────┼─▶│   TLS    │──▶│  proxy   │──▶│   routing    │────┼──▶ Backend
//!                         │  │ (rustls) │   │ handler  │   │   snapshot   │    │
//!                         │  └──────────┘   └──────────┘   └──────▲───────┘    │
//!                         │                                       │            │
//!   Docker events         │  ┌──────────┐   ┌──────────────┐      │            │
//!   ──────────────────────┼─▶│  events  │──▶│ routing table│──────┘            │
//!                         │  └──────────┘   └──────────────┘                   │
//!                         └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use rproxy::config::{load_config, ProxyConfig};
use rproxy::events::DockerEvents;
use rproxy::lifecycle::cancel_on_signal;
use rproxy::observability::{logging, metrics};
use rproxy::tls::StaticCertificates;
use rproxy::{ProxyError, Server};

#[derive(Parser, Debug)]
#[command(name = "rproxy", version, about = "SSH/HTTP multiplexing reverse proxy")]
struct Cli {
    /// Path to the TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(load_config).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("rproxy: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rproxy starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "rproxy exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let certificates = Arc::new(StaticCertificates::load(&config.tls).await?);
    let events = DockerEvents::from_config(&config.docker).subscribe().await?;

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    Server::new(config, certificates).run(events, &shutdown).await
}
