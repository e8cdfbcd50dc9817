use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use generation_api::config::StorageBackend;
use generation_api::{build_router, AppState, Config, Services, Storage};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use truetone_core::metrics::OPERATION_DURATION_SECONDS;
use truetone_core::{
    KindePropertyStore, MemoryPropertyStore, OpenAiProvider, PropertyStore, TokenValidator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("generation_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting TrueTone Generation API");

    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        anonymous_limit = config.quota.anonymous_limit,
        free_limit = config.quota.free_limit,
        paid_limit = config.quota.paid_monthly_limit,
        premium_limit = config.quota.premium_monthly_limit,
        "Configuration loaded"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    let storage = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            let pool = truetone_db::create_pool(database_url).await?;
            tracing::info!("Database pool created");
            if config.run_migrations {
                truetone_db::run_migrations(&pool).await?;
                tracing::info!("Migrations applied");
            }
            Storage::postgres(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; counters reset on restart");
            Storage::memory()
        }
    };

    let properties: Arc<dyn PropertyStore> = match &config.kinde {
        Some(kinde) => Arc::new(KindePropertyStore::new(kinde.clone())),
        None => {
            tracing::warn!("Kinde M2M credentials not set; entitlements kept in memory");
            Arc::new(MemoryPropertyStore::new())
        }
    };

    let services = Services {
        verifier: Arc::new(TokenValidator::new(config.identity.clone())),
        properties,
        provider: Arc::new(OpenAiProvider::new(config.openai.clone())),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = AppState::new(config, storage, services);
    let app = build_router(state, metrics_handle);

    run_http_server(app, addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Peer addresses key anonymous visitors
    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Quota checks sit in the tens of milliseconds; generations run for seconds
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(OPERATION_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    truetone_core::metrics::describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
