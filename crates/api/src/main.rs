use std::sync::Arc;

use anyhow::Context;

use timetable_api::app;
use timetable_api::config::ApiConfig;
use timetable_infra::workers::IndexSweepWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    timetable_observability::init();

    let config = ApiConfig::from_env().context("loading configuration")?;
    let services = Arc::new(app::build_services(&config).await?);

    let sweeper = config
        .session
        .index_sweep_interval
        .filter(|_| config.session.multi_device_enabled)
        .map(|interval| IndexSweepWorker::spawn(services.sessions.clone(), interval));

    let router = app::build_app(services).context("building route policies")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    if let Some(worker) = sweeper {
        worker.shutdown().await;
    }
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
