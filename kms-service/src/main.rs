use kms_service::{
    build_router,
    config::KmsConfig,
    db,
    workers::ChangeFeedWorker,
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = KmsConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    kms_service::services::metrics::init_metrics()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("metrics registry: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting KMS replica service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let mut state = AppState::new(config.clone(), pool);

    let feed = if config.change_feed.enabled {
        let (worker, handle) =
            ChangeFeedWorker::new(state.processor.clone(), config.change_feed.queue_size);
        let join = worker.spawn();
        tracing::info!(queue_size = config.change_feed.queue_size, "Change feed worker started");
        state = state.with_feed(handle.clone());
        Some((handle, join))
    } else {
        tracing::warn!("Change feed worker disabled; POST /changes applies batches inline");
        None
    };

    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some((handle, join)) = feed {
        handle.shutdown();
        match join.await {
            Ok(Ok(())) => tracing::info!("Change feed worker stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Change feed worker halted"),
            Err(e) => tracing::error!(error = %e, "Change feed worker terminated abnormally"),
        }
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
