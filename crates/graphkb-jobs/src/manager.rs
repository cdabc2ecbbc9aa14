//! Job creation and lookup.
//!
//! [`JobManager::create_job`] validates the request, records a pending job
//! and returns its snapshot at once; the pipeline itself runs on a spawned
//! task. When `max_concurrent` is set, jobs wait in `pending` until a slot
//! in the pool frees.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{broadcast, Semaphore};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use graphkb_core::{
    Error, GraphStore, IndexingMethod, Job, JobEvent, LlmProvider, Result, VectorStore,
};

use crate::config::PipelineConfig;
use crate::executor::PipelineExecutor;
use crate::stages::{default_stages, PipelineStage, StageContext, StagePlan};
use crate::storage::{JsonlGraphStore, JsonlVectorStore};
use crate::store::StatusStore;

/// Body of a pipeline run request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub input_path: String,
    /// `standard` (default) or `fast`.
    #[serde(default)]
    pub indexing_method: Option<String>,
    /// Overrides the pipeline-level claims setting for this job.
    #[serde(default)]
    pub extract_claims: Option<bool>,
}

impl RunRequest {
    pub fn new(input_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            ..Self::default()
        }
    }

    pub fn with_indexing_method(mut self, method: impl Into<String>) -> Self {
        self.indexing_method = Some(method.into());
        self
    }

    pub fn with_extract_claims(mut self, extract_claims: bool) -> Self {
        self.extract_claims = Some(extract_claims);
        self
    }
}

pub struct JobManager {
    config: PipelineConfig,
    store: StatusStore,
    llm: Arc<dyn LlmProvider>,
    graph_store: Arc<dyn GraphStore>,
    vector_store: Arc<dyn VectorStore>,
    stages: Vec<Arc<dyn PipelineStage>>,
    slots: Option<Arc<Semaphore>>,
}

impl JobManager {
    /// Manager with the default stages and JSON-lines stores under
    /// `config.output_dir`.
    pub fn new(config: PipelineConfig, llm: Arc<dyn LlmProvider>) -> Self {
        let graph_store = Arc::new(JsonlGraphStore::under(&config.output_dir));
        let vector_store = Arc::new(JsonlVectorStore::under(&config.output_dir));
        let slots = (config.max_concurrent > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent)));
        Self {
            config,
            store: StatusStore::new(),
            llm,
            graph_store,
            vector_store,
            stages: default_stages(),
            slots,
        }
    }

    pub fn with_stages(mut self, stages: Vec<Arc<dyn PipelineStage>>) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_graph_store(mut self, graph_store: Arc<dyn GraphStore>) -> Self {
        self.graph_store = graph_store;
        self
    }

    pub fn with_vector_store(mut self, vector_store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = vector_store;
        self
    }

    pub fn with_status_store(mut self, store: StatusStore) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn status_store(&self) -> &StatusStore {
        &self.store
    }

    /// Validate `request`, record a pending job and start its pipeline.
    ///
    /// Returns the pending snapshot without waiting for any stage.
    #[instrument(
        skip(self, request),
        fields(subsystem = "jobs", component = "manager", op = "create_job")
    )]
    pub async fn create_job(&self, request: RunRequest) -> Result<Job> {
        let input_path = self.resolve_input(&request.input_path).await?;
        let indexing_method = match request.indexing_method.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse::<IndexingMethod>()?,
            _ => IndexingMethod::default(),
        };
        let extract_claims = request.extract_claims.unwrap_or(self.config.extract_claims);

        let job_id = Uuid::now_v7().to_string();
        let job = self.store.insert(Job::pending(job_id.clone())).await?;

        let plan = StagePlan::new(&self.stages, extract_claims);
        let ctx = StageContext {
            job_id: job_id.clone(),
            input_path: input_path.clone(),
            indexing_method,
            llm: Arc::clone(&self.llm),
            graph_store: Arc::clone(&self.graph_store),
            vector_store: Arc::clone(&self.vector_store),
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            converter_timeout: self.config.effective_converter_timeout(),
        };
        info!(
            job_id = %job_id,
            input_path = %input_path.display(),
            method = %indexing_method,
            stages = plan.len(),
            "Job created"
        );

        self.spawn_pipeline(job_id, plan, ctx);
        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        if Uuid::parse_str(job_id).is_err() {
            return Err(Error::NotFound(format!("Job {} not found", job_id)));
        }
        self.store.get(job_id).await
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.store.list().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.store.subscribe()
    }

    /// Canonical form of `raw`, which must exist inside the input root.
    async fn resolve_input(&self, raw: &str) -> Result<PathBuf> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Validation("input_path must not be empty".to_string()));
        }

        let root = tokio::fs::canonicalize(&self.config.input_root)
            .await
            .map_err(|e| {
                Error::Validation(format!(
                    "Input root {} is not accessible: {}",
                    self.config.input_root.display(),
                    e
                ))
            })?;

        let requested = Path::new(raw);
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            root.join(requested)
        };
        let resolved = tokio::fs::canonicalize(&candidate).await.map_err(|e| {
            Error::Validation(format!("input_path {} is not accessible: {}", raw, e))
        })?;

        if !resolved.starts_with(&root) {
            warn!(input_path = raw, root = %root.display(), "Rejected input_path outside input root");
            return Err(Error::Validation(format!(
                "input_path {} is outside the input root",
                raw
            )));
        }
        Ok(resolved)
    }

    fn spawn_pipeline(&self, job_id: String, plan: StagePlan, ctx: StageContext) {
        let store = self.store.clone();
        let executor = PipelineExecutor::new(store.clone(), self.config.stage_timeout);
        let slots = self.slots.clone();

        tokio::spawn(async move {
            let _permit = match slots {
                Some(slots) => match slots.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Pipeline pool closed");
                        fail_unless_terminal(&store, &job_id, format!("Pipeline pool closed: {}", e))
                            .await;
                        return;
                    }
                },
                None => None,
            };

            // Run on a nested task so a panicking stage fails the job
            // instead of leaving it running forever.
            let run_id = job_id.clone();
            let outcome =
                tokio::spawn(async move { executor.execute(&run_id, &plan, &ctx).await }).await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(job_id = %job_id, error = %e, "Status store rejected pipeline update");
                    fail_unless_terminal(&store, &job_id, format!("Pipeline aborted: {}", e)).await;
                }
                Err(e) => {
                    error!(job_id = %job_id, error = ?e, "Pipeline task panicked");
                    fail_unless_terminal(&store, &job_id, format!("Pipeline task panicked: {}", e))
                        .await;
                }
            }
        });
    }
}

/// Mark a job failed unless it already finished; store errors are logged.
async fn fail_unless_terminal(store: &StatusStore, job_id: &str, message: String) {
    match store.get(job_id).await {
        Ok(job) if job.is_terminal() => {}
        Ok(_) => {
            if let Err(e) = store.fail(job_id, message).await {
                error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
            }
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
        }
    }
}
