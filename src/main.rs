use advisory_backoffice::app;
use advisory_backoffice::backend_client::BackendClient;
use advisory_backoffice::clock::SystemClock;
use advisory_backoffice::config::Config;
use advisory_backoffice::handlers::AppState;
use advisory_backoffice::notifier::TracingNotifier;
use moka::future::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the backend client and the
/// subscription cache, then serves the dashboard API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "advisory_backoffice=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let backend = BackendClient::new(
        config.backend_base_url.clone(),
        Duration::from_secs(config.backend_timeout_secs),
    )?;
    tracing::info!("Backend client initialized: {}", backend.base_url());

    // Subscription lists are re-fetched after the TTL or after a renewal
    let subscription_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.subscription_cache_ttl_secs))
        .max_capacity(10_000)
        .build();
    tracing::info!(
        "Subscription cache initialized ({}s TTL)",
        config.subscription_cache_ttl_secs
    );

    let app_state = Arc::new(AppState {
        config: config.clone(),
        backend,
        subscription_cache,
        clock: Arc::new(SystemClock),
        notifier: Arc::new(TracingNotifier),
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
    let protected_routes = app::api_routes().layer(ServiceBuilder::new().layer(GovernorLayer {
        config: governor_conf,
    }));
    let app = app::finish(protected_routes, app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
