use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::time::Duration;
use tracing::info;

use super::error::ApiError;
use super::models::{
    AcquireQuery, AcquireResponse, HealthResponse, InfoResponse, LookupQuery, RefreshResponse,
};
use super::state::AppState;
use crate::reference::MediaRef;

/// Liveness plus a summary of what the engine can do
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let engine = &state.engine;
    Json(HealthResponse {
        status: "ok".to_string(),
        strategies: engine
            .strategy_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        credentials: engine.credentials().len(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.metrics().snapshot())
}

/// Acquire one media file (GET /acquire)
///
/// Answers 200 with the result on success and 502 with the same body when
/// every strategy failed. A malformed reference or kind is a 400.
pub async fn acquire(
    State(state): State<AppState>,
    Query(query): Query<AcquireQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = query.media_kind().map_err(ApiError::InvalidParameter)?;
    let deadline = query
        .deadline_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    let media = MediaRef::resolve(&query.input)?.with_kind(kind);
    info!(media_id = %media.canonical_id, kind = %media.media_kind, "Acquire requested");

    let result = state.engine.acquire_ref(&media, deadline).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };

    Ok((
        status,
        Json(AcquireResponse {
            media_id: media.canonical_id,
            kind: media.media_kind.label().to_string(),
            result,
        }),
    ))
}

pub async fn info(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metadata = state.engine.info(&query.input).await?;
    Ok(Json(InfoResponse {
        found: !metadata.is_empty(),
        metadata,
    }))
}

pub async fn formats(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let media = MediaRef::resolve(&query.input)?;
    Ok(Json(state.engine.metadata().formats(&media).await))
}

/// Pull a fresh credential file from the configured source
pub async fn refresh_credentials(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.engine.refresh_credentials().await {
        return Err(ApiError::RefreshFailed);
    }
    Ok(Json(RefreshResponse {
        refreshed: true,
        credentials: state.engine.credentials().len(),
    }))
}
