use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_unit_replicator::config::Cli;
use fleet_unit_replicator::fleet::FleetHttpClient;
use fleet_unit_replicator::operator::{DryRunOperator, FleetOperator, Operator};
use fleet_unit_replicator::server::{AppState, build_router};
use fleet_unit_replicator::service::Service;
use fleet_unit_replicator::stats::TracingStats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_unit_replicator=info,stats=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Cli::parse()
        .into_settings()
        .context("invalid configuration")?;

    let fleet = Arc::new(
        FleetHttpClient::new(&settings.fleet_endpoint).context("failed to build fleet client")?,
    );

    let operator = if settings.dry_run {
        warn!("Dry run: fleet will not be modified");
        Operator::DryRun(DryRunOperator::new())
    } else {
        Operator::ReadWrite(FleetOperator::new(
            fleet.clone(),
            settings.retry,
            settings.wait,
        ))
    };

    info!(
        endpoint = %fleet.endpoint(),
        prefix = %settings.replicator.unit_prefix,
        machine_tag = ?settings.replicator.machine_tag,
        "Starting fleet unit replicator"
    );

    let shutdown = CancellationToken::new();
    let service = Service::new(settings.replicator, fleet, operator, Arc::new(TracingStats));
    let (handle, service_task) = service.spawn(shutdown.clone());

    let server_task = match settings.listen {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!("Control API listening on {}", addr);

            let app = build_router(AppState::new(handle));
            let server_shutdown = shutdown.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(server_shutdown.cancelled_owned())
                    .await
            }))
        }
        None => None,
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Signal received, shutting down");
        signal_shutdown.cancel();
    });

    service_task.await.context("replicator task panicked")?;
    // The service can stop on its own; take the HTTP server down with it.
    shutdown.cancel();

    if let Some(task) = server_task {
        task.await
            .context("server task panicked")?
            .context("server error")?;
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, only Ctrl-C will stop the service");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
