use std::{process::ExitCode, sync::Arc};

use pfi_compliance::{SanctionsRoster, source_from_config};
use pfi_server::{ServerConfig, telemetry};
use pfi_types::{PfiError, Result, constants};
use tokio::{net::TcpListener, signal, sync::broadcast, task::JoinSet};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pfi-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = ServerConfig::from_env()?;
    telemetry::init(&config.log_level, config.log_format)?;
    tracing::info!(
        version = constants::VERSION,
        env = %config.env,
        config = ?config,
        "starting mock PFIs"
    );

    let roster = Arc::new(SanctionsRoster::new(source_from_config(
        &config.compliance.roster_source,
    )));
    if roster.load().await.is_err() {
        tracing::warn!("credential issuance refuses until the sanctions roster loads");
    }
    let refresh = config
        .compliance
        .refresh_interval()
        .map(|interval| Arc::clone(&roster).spawn_refresh(interval));

    let hosted = pfi_server::assemble(&config, roster).await?;

    for h in &hosted {
        match h.pfi.resume_all().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(pfi = %h.instance.name, resumed = n, "resumed exchanges"),
            Err(e) => tracing::warn!(pfi = %h.instance.name, error = %e, "could not scan exchanges"),
        }
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut servers = JoinSet::new();
    for h in hosted {
        let listener = TcpListener::bind(h.addr)
            .await
            .map_err(|e| PfiError::Configuration(format!("bind {}: {e}", h.addr)))?;
        tracing::info!(pfi = %h.instance.name, did = %h.pfi.did(), addr = %h.addr, "listening");

        let mut shutdown_rx = shutdown_tx.subscribe();
        let name = h.instance.name.clone();
        servers.spawn(async move {
            let served = axum::serve(listener, h.router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(pfi = %name, error = %e, "server error");
            }
            tracing::info!(pfi = %name, "server stopped");
        });
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(());
    while servers.join_next().await.is_some() {}
    if let Some(task) = refresh {
        task.abort();
    }
    tracing::info!("all servers stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
