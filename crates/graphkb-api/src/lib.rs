//! # graphkb-api
//!
//! Thin HTTP surface over the LLM resolver and the pipeline job manager.
//!
//! | Method & Path | Handler |
//! |---|---|
//! | `GET /api/llm/status` | current LLM configuration |
//! | `POST /api/llm/config` | partial LLM configuration update |
//! | `GET /api/llm/models` | models on the resolved Ollama server |
//! | `POST /api/pipeline/run` | create and start a job |
//! | `GET /api/pipeline/status/:job_id` | job snapshot |
//! | `GET /api/pipeline/jobs` | all jobs, newest first |
//! | `GET /api/pipeline/events` | job snapshots as Server-Sent Events |
//! | `GET /health` | liveness |

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use graphkb_inference::LlmConfigResolver;
use graphkb_jobs::JobManager;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<LlmConfigResolver>,
    pub jobs: Arc<JobManager>,
}

impl AppState {
    pub fn new(resolver: Arc<LlmConfigResolver>, jobs: Arc<JobManager>) -> Self {
        Self { resolver, jobs }
    }
}

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// All routes with tracing and request-id layers. CORS is added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/llm/status", get(handlers::llm::get_status))
        .route("/api/llm/config", post(handlers::llm::configure))
        .route("/api/llm/models", get(handlers::llm::list_models))
        .route("/api/pipeline/run", post(handlers::pipeline::run))
        .route(
            "/api/pipeline/status/:job_id",
            get(handlers::pipeline::get_status),
        )
        .route("/api/pipeline/jobs", get(handlers::pipeline::list_jobs))
        .route("/api/pipeline/events", get(handlers::pipeline::events))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}
