//! Router assembly and the HTTP server loop.

use std::{net::SocketAddr, sync::Arc};

use {
    anyhow::Context,
    axum::{
        Router,
        routing::{get, post},
    },
    saturn_memory::MemoryManager,
    tower_http::{cors::CorsLayer, trace::TraceLayer},
    tracing::info,
};

use crate::routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<MemoryManager>,
}

/// Build the Axum router with all routes.
pub fn build_router(manager: Arc<MemoryManager>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/init", post(routes::init))
        .route("/stats", get(routes::stats))
        .route("/store", post(routes::store))
        .route("/search", post(routes::search))
        .route("/memories", get(routes::list))
        .route(
            "/memory/{id}",
            get(routes::get_memory).delete(routes::delete_memory),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { manager })
}

/// Serve the API on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, manager: Arc<MemoryManager>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, model = %manager.model_name(), "memory gateway listening");
    axum::serve(listener, build_router(Arc::clone(&manager)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    // Retries any write whose persist failed while serving.
    manager
        .save()
        .await
        .context("saving memory store on shutdown")?;
    info!("memory gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
