use client_records_api::auth::JwtVerifier;
use client_records_api::azure_blob::{AzureBlobConfig, AzureBlobStore};
use client_records_api::client_store::PgClientStore;
use client_records_api::config::Config;
use client_records_api::db::Database;
use client_records_api::handlers::AppState;
use client_records_api::records::ClientRecordWriter;
use client_records_api::routes;
use client_records_api::uploads::DocumentUploader;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, blob storage and
/// the token verifier, then serves the HTTP API until a shutdown signal.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "client_records_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connection pool established");

    let blob_store = AzureBlobStore::new(AzureBlobConfig {
        account_name: config.azure_account_name.clone(),
        account_key: config.azure_account_key.clone(),
        container: config.azure_container.clone(),
        endpoint: config.azure_endpoint.clone(),
    })?;
    tracing::info!("Blob storage client initialized: container {}", config.azure_container);

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let app_state = Arc::new(AppState {
        config: config.clone(),
        writer: ClientRecordWriter::new(Arc::new(PgClientStore::new(db.pool.clone()))),
        uploader: DocumentUploader::new(Arc::new(blob_store)),
        verifier: Arc::new(JwtVerifier::new(&config.jwt_secret)),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Health check stays outside the rate limiter
    let protected = routes::protected_routes(config.max_upload_bytes).layer(GovernorLayer {
        config: governor_conf,
    });
    let app = routes::app(app_state, protected);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.close().await;
    tracing::info!("Database pool closed");

    Ok(())
}
