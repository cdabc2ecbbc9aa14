//! Pipeline job endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tracing::warn;

use graphkb_core::{Job, JobEvent};
use graphkb_jobs::RunRequest;

use crate::error::ApiResult;
use crate::AppState;

/// Create a job and return its pending snapshot.
pub async fn run(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult<Json<Job>> {
    let Json(request) = payload?;
    let job = state.jobs.create_job(request).await?;
    Ok(Json(job))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.jobs.get_job(&job_id).await?))
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.jobs.list_jobs().await)
}

/// Every committed job snapshot as a Server-Sent Event.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.jobs.subscribe()).filter_map(
        |result: Result<JobEvent, _>| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type).data(json))),
                Err(e) => {
                    warn!(error = %e, "Failed to serialize job event");
                    None
                }
            },
            // Lagged subscribers skip ahead; the next snapshot is complete.
            Err(_) => None,
        },
    );

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
