use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use ouath::{AppState, app, initialize_state, telemetry};

/// How often expired codes and refresh tokens are dropped from memory.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    telemetry::setup_logging();

    let metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(%err, "cannot install Prometheus recorder, `/metrics` disabled");
            None
        },
    };

    let state = match initialize_state(metrics).await {
        Ok(state) => state,
        Err(err) => {
            // Without a key pair nothing can be signed.
            tracing::error!(%err, "cannot initialize state");
            std::process::exit(1);
        },
    };

    tokio::spawn(sweep(state.clone()));

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, state.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, issuer = %state.config.url, "server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Bound memory used by abandoned grants.
async fn sweep(state: AppState) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        let codes = state.codes.purge_expired();
        let refresh_tokens = state.refresh_tokens.purge_expired();
        if codes + refresh_tokens > 0 {
            tracing::debug!(codes, refresh_tokens, "expired grants purged");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
