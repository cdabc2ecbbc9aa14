//! Sequential stage runner.
//!
//! The executor owns one job's artifacts for the duration of the run and is
//! the only writer of that job's status. Per stage it records the stage
//! name before running and the progress and summary after; the first
//! failure or timeout ends the run with the job marked failed.

use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use graphkb_core::{Error, JobStatus, PipelineArtifacts, Result};

use crate::stages::{StageContext, StagePlan};
use crate::store::StatusStore;

/// Stage runs slower than this are logged as warnings.
const SLOW_STAGE_THRESHOLD_SECS: u64 = 300;

#[derive(Clone)]
pub struct PipelineExecutor {
    store: StatusStore,
    stage_timeout: Duration,
}

impl PipelineExecutor {
    pub fn new(store: StatusStore, stage_timeout: Duration) -> Self {
        Self {
            store,
            stage_timeout,
        }
    }

    pub fn stage_timeout(&self) -> Duration {
        self.stage_timeout
    }

    /// Run every stage in `plan` for `job_id`.
    ///
    /// Stage failures are recorded on the job, not returned; an `Err` means
    /// the status store itself refused an update.
    #[instrument(
        skip(self, plan, ctx),
        fields(subsystem = "jobs", component = "executor", op = "execute")
    )]
    pub async fn execute(&self, job_id: &str, plan: &StagePlan, ctx: &StageContext) -> Result<()> {
        let start = Instant::now();
        let total = plan.len();

        self.store
            .update(job_id, |job| {
                job.status = JobStatus::Running;
                job.message = Some(format!("Running {} stages", total));
            })
            .await?;
        info!(stages = total, method = %ctx.indexing_method, "Pipeline started");

        let mut artifacts = PipelineArtifacts::new();
        for descriptor in plan.iter() {
            let name = descriptor.name;
            self.store
                .update(job_id, |job| {
                    job.stage = Some(name.to_string());
                    job.message = Some(format!(
                        "Running stage {}/{}: {}",
                        descriptor.ordinal, total, name
                    ));
                })
                .await?;

            let stage_start = Instant::now();
            let outcome = tokio::time::timeout(
                self.stage_timeout,
                descriptor.stage.run(ctx, &mut artifacts),
            )
            .await;

            let summary = match outcome {
                Ok(Ok(summary)) => summary,
                Ok(Err(e)) => {
                    let failure = Error::stage(name, &e);
                    error!(stage = name, error = %e, "Pipeline stage failed");
                    self.store.fail(job_id, failure.to_string()).await?;
                    return Ok(());
                }
                Err(_) => {
                    let failure = Error::stage(
                        name,
                        format!("timed out after {}s", self.stage_timeout.as_secs()),
                    );
                    warn!(
                        stage = name,
                        timeout_secs = self.stage_timeout.as_secs(),
                        "Pipeline stage exceeded timeout"
                    );
                    self.store.fail(job_id, failure.to_string()).await?;
                    return Ok(());
                }
            };

            let elapsed = stage_start.elapsed();
            if elapsed.as_secs() > SLOW_STAGE_THRESHOLD_SECS {
                warn!(stage = name, duration_ms = elapsed.as_millis() as u64, "Slow pipeline stage");
            } else {
                info!(stage = name, duration_ms = elapsed.as_millis() as u64, %summary, "Stage completed");
            }

            let progress = descriptor.ordinal as f64 / total as f64;
            self.store
                .update(job_id, |job| {
                    job.progress = progress;
                    job.message = Some(summary);
                })
                .await?;
        }

        self.store
            .update(job_id, |job| {
                job.status = JobStatus::Completed;
                job.progress = 1.0;
                job.message = Some("Pipeline completed".to_string());
            })
            .await?;
        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Pipeline completed"
        );
        Ok(())
    }
}
