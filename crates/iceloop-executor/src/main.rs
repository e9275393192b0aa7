//! Iceloop service binary

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use iceloop_common::VERSION;
use iceloop_executor::{api, telemetry, IceConfig, Iceloop};

#[tokio::main]
async fn main() -> Result<()> {
    let config = IceConfig::load()?;
    telemetry::init_tracing(&config.logging)?;

    info!("Starting Iceloop v{}", VERSION);
    info!(
        mode = ?config.executor.mode,
        strategy = ?config.strategy,
        interval_secs = config.epoch.interval_seconds,
        min_interval_secs = config.executor.min_interval_seconds,
        "Configuration loaded"
    );

    let engine = Iceloop::from_config(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let api_task = if engine.config().api.enabled {
        let addr = engine.config().api.addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Status API listening on {}", addr);

        let app = api::router(engine.api_state());
        let mut api_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = api_shutdown.changed().await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "Status API stopped with error");
            }
        }))
    } else {
        None
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    engine.run(shutdown_rx).await?;

    if let Some(task) = api_task {
        task.await?;
    }

    info!("Iceloop stopped");
    Ok(())
}
