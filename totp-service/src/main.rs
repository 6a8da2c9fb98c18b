use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::{init_metrics, init_tracing};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use totp_service::{
    build_router,
    config::TotpServiceConfig,
    db,
    middleware::IdentityVerifier,
    services::{Database, SecretCipher, SecretService, SecretStore, ShareService, ShareSettings},
    totp::TotpEngine,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = TotpServiceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    let metrics = init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting TOTP service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(e.into()))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(e.into()))?;
    let store: Arc<dyn SecretStore> = Arc::new(Database::new(pool));

    let cipher = Arc::new(SecretCipher::from_base64_key(&config.encryption.secret_key)?);
    let identity = Arc::new(IdentityVerifier::from_config(&config.identity)?);

    let secrets = SecretService::new(
        store.clone(),
        cipher.clone(),
        TotpEngine::default(),
        config.service_name.clone(),
    );
    let shares = ShareService::new(
        store.clone(),
        cipher,
        ShareSettings {
            public_base_url: config.share.public_base_url.clone(),
            default_expiration_hours: config.share.default_expiration_hours,
            max_expiration_hours: config.share.max_expiration_hours,
        },
    );

    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    let redeem_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.redeem_attempts,
        config.rate_limit.redeem_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Global IP and Share Redemption");

    let addr = config.common.socket_addr();
    let config = Arc::new(config);

    let state = AppState {
        config: config.clone(),
        store,
        secrets,
        shares,
        identity,
        metrics,
        ip_rate_limiter,
        redeem_rate_limiter,
    };
    let app = build_router(state);

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

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
