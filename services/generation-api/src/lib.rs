//! TrueTone Generation API
//!
//! Gates AI content generation for newsletter readers and streams the
//! result from the LLM provider.
//!
//! ## REST Endpoints
//!
//! - `POST /api/generation-stream` - Debit one generation and stream the output
//! - `GET /api/usage` - Current quota snapshot for the caller
//! - `GET /api/subscription` - Subscription snapshot for the signed-in user
//! - `POST /api/onboarding/complete` - Create the user and grant a product
//! - `GET /api/articles` - Published articles
//! - `GET /api/articles/{id}/artifacts` - The caller's saved generations
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check
//! - `GET /metrics` - Prometheus metrics

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::{AppState, Services, Storage};

use crate::handlers::{health, ready};

/// Build the HTTP router with its middleware stack
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    let api = Router::new()
        .route("/generation-stream", post(handlers::generation_stream))
        .route("/usage", get(handlers::get_usage))
        .route("/subscription", get(handlers::get_subscription))
        .route("/onboarding/complete", post(handlers::complete_onboarding))
        .route("/articles", get(handlers::list_articles))
        .route("/articles/{id}/artifacts", get(handlers::list_artifacts));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Bounds time to first byte; streamed bodies are not cut off
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api", api)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}
