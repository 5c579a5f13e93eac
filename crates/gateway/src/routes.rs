//! Request handlers.

use {
    axum::{
        Json,
        extract::{
            Path, Query, State,
            rejection::{JsonRejection, QueryRejection},
        },
        http::StatusCode,
    },
    saturn_memory::{ChunkRecord, MemoryStats, PageSubmission, SearchHit, SearchQuery},
    tracing::debug,
};

use crate::{
    error::ApiError,
    params::{DeleteResponse, HealthResponse, InitResponse, ListParams},
    server::AppState,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online".into(),
        model: state.manager.model_name().to_string(),
        ai_ready: state.manager.is_ready(),
    })
}

/// Load the embedding model now. Answers 503 while it cannot be loaded.
pub async fn init(State(state): State<AppState>) -> (StatusCode, Json<InitResponse>) {
    match state.manager.init().await {
        Ok(()) => (
            StatusCode::OK,
            Json(InitResponse {
                status: "ready".into(),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(InitResponse {
                status: "unavailable".into(),
            }),
        ),
    }
}

pub async fn stats(State(state): State<AppState>) -> Json<MemoryStats> {
    Json(state.manager.stats().await)
}

pub async fn store(
    State(state): State<AppState>,
    payload: Result<Json<PageSubmission>, JsonRejection>,
) -> ApiResult<ChunkRecord> {
    let Json(page) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    debug!(url = %page.url, is_html = page.is_html, "store request");
    Ok(Json(state.manager.ingest(page).await?))
}

pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchQuery>, JsonRejection>,
) -> ApiResult<Vec<SearchHit>> {
    let Json(query) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(state.manager.search(&query).await?))
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<ChunkRecord>> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(
        state
            .manager
            .list(params.bounded_limit(), params.offset)
            .await,
    ))
}

pub async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ChunkRecord> {
    Ok(Json(state.manager.get(&id).await?))
}

pub async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    let removed = state.manager.delete(&id).await?;
    Ok(Json(DeleteResponse {
        status: "deleted".into(),
        removed,
    }))
}
