//! PhraseBank API Gateway
//!
//! HTTP front for the phrase collection.
//! Handles:
//! - Phrase CRUD routing
//! - Request validation
//! - Rate limiting
//! - Observability (logging, metrics, request ids)

mod extract;
mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    BoxError, Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use phrasebank_common::{
    config::{AppConfig, ObservabilityConfig, DATABASE_URL_VAR},
    db, metrics, PhraseService,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::{rate_limit_middleware, RateLimit};
use crate::middleware::timeout::timeout_error;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub phrases: PhraseService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // A missing DATABASE_URL stops startup here
    let config = AppConfig::load().with_context(|| {
        format!("Failed to load configuration (is {} set?)", DATABASE_URL_VAR)
    })?;

    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting PhraseBank API Gateway v{}",
        phrasebank_common::VERSION
    );

    let config = Arc::new(config);

    // Initialize metrics
    install_metrics_exporter(&config.observability)?;
    metrics::register_metrics();

    // One store handle for the lifetime of the process
    let store = db::connect(&config.database).await?;
    let phrases = PhraseService::new(store, config.listing.clone());

    let state = AppState {
        config: config.clone(),
        phrases,
    };

    let app = create_router(state);

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server.host: {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Structured logging, JSON unless disabled. `RUST_LOG` wins over the config level.
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve Prometheus metrics on their own port (0 disables)
fn install_metrics_exporter(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut app = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Phrase collection
        .route(
            "/",
            get(handlers::phrases::list_phrases).post(handlers::phrases::create_phrase),
        )
        .route(
            "/{id}",
            get(handlers::phrases::get_phrase)
                .put(handlers::phrases::update_phrase)
                .delete(handlers::phrases::delete_phrase),
        )
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes));

    if config.rate_limit.enabled {
        let limit = RateLimit::new(&config.rate_limit);
        app = app.layer(from_fn_with_state(limit, rate_limit_middleware));
    }

    // Deadline errors come back through the API error envelope
    let timeout_secs = config.server.request_timeout_secs;
    let deadline = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(move |err: BoxError| async move {
            timeout_error(err, timeout_secs)
        }))
        .layer(TimeoutLayer::new(config.request_timeout()));

    app.layer(deadline)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
