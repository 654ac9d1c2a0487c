//! HTTP surface
//!
//! Mounts the feature routes under `/api/v1` and adds the service-level
//! endpoints (`/`, `/health`) plus the middleware stack.

pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::{future::Future, net::SocketAddr};
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::db::SharedStore;
use crate::features;
use crate::middleware;

/// Build the application router with all routes and middleware
pub fn create_router(store: SharedStore, config: &Config) -> Router {
    let feature_state = features::FeatureState {
        store: store.clone(),
        versioning: config.versioning.clone(),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(store)
        .nest("/api/v1", features::router(feature_state))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Bind to the configured address and serve until `shutdown` resolves
pub async fn serve(
    store: SharedStore,
    config: &Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(store, config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "unitver server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check handler
async fn health(State(store): State<SharedStore>) -> Result<Response, StatusCode> {
    match store.health_check().await {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "store": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Store health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}
