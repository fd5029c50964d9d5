use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use fleetgate_server::config::Config;
use fleetgate_server::service::GateService;
use fleetgate_server::transport::{Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    let level = config.log_level.to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("fleetgate={level}").parse()?)
                .add_directive(format!("fleetgate_server={level}").parse()?),
        )
        .init();

    let service = Arc::new(GateService::from_config(&config)?);
    service.start();

    let limits = &config.limits;
    tracing::info!(
        "Policies: strict {}/{}ms, standard {}/{}ms, lenient {}/{}ms",
        limits.strict.max,
        limits.strict.window_ms,
        limits.standard.max,
        limits.standard.window_ms,
        limits.lenient.max,
        limits.lenient.window_ms
    );

    let shutdown = CancellationToken::new();
    let mut transport_tasks = JoinSet::new();

    {
        let service = service.clone();
        let shutdown = shutdown.clone();
        let host = config.http.host.clone();
        let port = config.http.port;

        transport_tasks.spawn(async move {
            tracing::info!("Starting HTTP transport on {}:{}", host, port);
            HttpTransport::new(&host, port).start(service, shutdown).await
        });
    }

    let mut outcome = Ok(());
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
        }
        Some(result) = transport_tasks.join_next() => {
            outcome = match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    tracing::error!("Transport task failed: {}", e);
                    Err(e)
                }
                Err(e) => {
                    tracing::error!("Transport task panicked: {}", e);
                    Err(anyhow::anyhow!("Transport task panicked"))
                }
            };
        }
    }

    shutdown.cancel();
    while let Some(result) = transport_tasks.join_next().await {
        if let Ok(Err(e)) = result {
            tracing::error!("Transport task failed during shutdown: {}", e);
        }
    }
    service.shutdown().await;

    outcome
}
