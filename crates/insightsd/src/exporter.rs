//! Exporter wiring: config, scheduler, and HTTP server.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};

use insights_client::InsightsClient;
use insights_core::{ConfigError, ExporterConfig, FileConfig};
use insights_metrics::{SnapshotScheduler, TickOutcome, metric_registry, render_prometheus};

/// Resolve configuration from a variable lookup and an optional file.
pub fn load_config(
    env: &impl Fn(&str) -> Option<String>,
    path: Option<&Path>,
) -> Result<ExporterConfig, ConfigError> {
    let file = path.map(FileConfig::from_file).transpose()?;
    ExporterConfig::resolve(env, file.as_ref())
}

/// Run one snapshot cycle and return the rendered exposition.
pub async fn run_once(config: &ExporterConfig) -> anyhow::Result<String> {
    let client = InsightsClient::new(config).context("failed to build insights client")?;
    let (writer, reader) = metric_registry();
    let mut scheduler = SnapshotScheduler::new(client, writer, config.interval);

    match scheduler.tick().await {
        TickOutcome::Published { .. } => {
            let snapshot = reader.snapshot().await;
            Ok(render_prometheus(&snapshot))
        }
        TickOutcome::Retained { error } | TickOutcome::Escalated { error } => {
            Err(error).context("snapshot cycle failed")
        }
    }
}

/// Serve metrics until a shutdown signal or scheduler escalation.
pub async fn run(listen: SocketAddr, config: ExporterConfig) -> anyhow::Result<()> {
    info!(
        project = %config.target.project_slug(),
        branch = %config.target.branch,
        reporting_window = config.target.reporting_window.as_str(),
        interval_secs = config.interval.as_secs(),
        timeout_secs = config.request_timeout.as_secs(),
        "insights exporter starting"
    );

    // ── Initialize subsystems ──────────────────────────────────

    let client = InsightsClient::new(&config).context("failed to build insights client")?;
    let (writer, reader) = metric_registry();
    let scheduler = SnapshotScheduler::new(client, writer, config.interval);
    let status = scheduler.status();

    // Bind before arming the timer so a taken port fails fast.
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!(addr = %listen, "metrics server listening");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_shutdown = shutdown_tx.subscribe();

    // ── Start background tasks ─────────────────────────────────

    let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let router = insights_api::build_router(reader, status);
    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    let result = tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            let _ = (&mut scheduler_handle).await;
            Ok(())
        }
        joined = &mut scheduler_handle => {
            let _ = shutdown_tx.send(true);
            match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "snapshot scheduler escalated, stopping exporter");
                    Err(e.into())
                }
                Err(e) => Err(anyhow::Error::new(e).context("snapshot scheduler task failed")),
            }
        }
        served = &mut server_handle => {
            let _ = shutdown_tx.send(true);
            let _ = (&mut scheduler_handle).await;
            return match served {
                Ok(Ok(())) => Err(anyhow::anyhow!("metrics server stopped unexpectedly")),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("metrics server failed")),
                Err(e) => Err(anyhow::Error::new(e).context("metrics server task failed")),
            };
        }
    };

    // Let in-flight scrapes finish.
    let _ = server_handle.await;
    info!("insights exporter stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
