//! LLM configuration endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use graphkb_core::{ConfigureRequest, LlmConfig};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// Current configuration snapshot; never triggers discovery.
pub async fn get_status(State(state): State<AppState>) -> Json<LlmConfig> {
    Json(state.resolver.status().await)
}

/// Apply a partial update and re-validate the endpoint.
pub async fn configure(
    State(state): State<AppState>,
    payload: Result<Json<ConfigureRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(request) = payload?;
    state.resolver.configure(request).await?;
    Ok(StatusCode::OK)
}

pub async fn list_models(State(state): State<AppState>) -> ApiResult<Json<ModelsResponse>> {
    let models = state.resolver.list_models().await?;
    Ok(Json(ModelsResponse { models }))
}
