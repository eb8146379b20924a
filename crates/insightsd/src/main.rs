//! insightsd — the workflow insights exporter daemon.
//!
//! Polls the CI provider's workflow insights endpoint and serves each
//! workflow's success rate as a Prometheus gauge:
//! - Config resolution (environment over optional TOML file)
//! - Snapshot scheduler (fetch, swap, graded failure handling)
//! - HTTP server (`/metrics`, `/healthz`)
//!
//! # Usage
//!
//! ```text
//! API_CREDENTIAL=... INSIGHTS_ORG=acme INSIGHTS_REPO=monorepo \
//!     insightsd --listen 0.0.0.0:8080
//! ```

mod exporter;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,insightsd=debug,insights_metrics=debug";

#[derive(Parser)]
#[command(name = "insightsd", about = "Workflow insights Prometheus exporter")]
struct Cli {
    /// Address to serve /metrics and /healthz on.
    #[arg(long, env = "INSIGHTS_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Optional TOML file with [target] and [poll] sections.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run a single snapshot cycle, print the exposition, and exit.
    #[arg(long)]
    once: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    // Configuration problems are fatal before anything is armed.
    let config = exporter::load_config(&|name: &str| std::env::var(name).ok(), cli.config.as_deref())
        .inspect_err(|e| error!(error = %e, "invalid configuration"))?;

    if cli.once {
        let exposition = exporter::run_once(&config).await?;
        print!("{exposition}");
        return Ok(());
    }

    exporter::run(cli.listen, config).await
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
