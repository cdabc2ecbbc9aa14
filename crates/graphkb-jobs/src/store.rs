//! In-memory job table.
//!
//! Every write replaces the whole [`Job`] under the write lock, so readers
//! see either the previous or the next snapshot, never a mix. The lifecycle
//! invariants are checked here rather than trusted to callers:
//!
//! - a terminal job is never written again
//! - status never moves backwards
//! - progress never decreases and stays within `0.0..=1.0`
//! - `finished_at` is set exactly when the status is terminal
//!
//! Each committed snapshot is published on the [`EventBus`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use graphkb_core::{Error, EventBus, Job, JobEvent, JobEventKind, JobStatus, Result};

#[derive(Clone, Default)]
pub struct StatusStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    events: EventBus,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(events: EventBus) -> Self {
        Self {
            jobs: Arc::default(),
            events,
        }
    }

    /// Add a new job. Fails if the id is already taken.
    pub async fn insert(&self, job: Job) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(Error::Internal(format!("Duplicate job id {}", job.job_id)));
        }
        jobs.insert(job.job_id.clone(), job.clone());
        self.events
            .emit(JobEvent::new(JobEventKind::classify(None, job.status), job.clone()));
        Ok(job)
    }

    pub async fn get(&self, job_id: &str) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.job_id.cmp(&a.job_id))
        });
        jobs
    }

    /// Apply `change` to a copy of the job and commit it if the result
    /// respects the lifecycle.
    pub async fn update<F>(&self, job_id: &str, change: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;

        if current.is_terminal() {
            return Err(Error::Internal(format!(
                "Job {} is already {}",
                job_id, current.status
            )));
        }

        let mut next = current.clone();
        change(&mut next);
        next.job_id = current.job_id.clone();
        next.started_at = current.started_at;

        if !current.status.can_transition_to(next.status) {
            return Err(Error::Internal(format!(
                "Job {} cannot move from {} to {}",
                job_id, current.status, next.status
            )));
        }

        next.progress = next.progress.clamp(0.0, 1.0);
        if next.progress < current.progress {
            return Err(Error::Internal(format!(
                "Job {} progress cannot decrease ({} -> {})",
                job_id, current.progress, next.progress
            )));
        }

        next.finished_at = if next.status.is_terminal() {
            Some(Utc::now())
        } else {
            None
        };

        let kind = JobEventKind::classify(Some(current.status), next.status);
        debug!(
            job_id,
            status = %next.status,
            stage = ?next.stage,
            progress = next.progress,
            "Job updated"
        );
        jobs.insert(job_id.to_string(), next.clone());
        self.events.emit(JobEvent::new(kind, next.clone()));
        Ok(next)
    }

    /// Move a job to `failed` with the given message.
    pub async fn fail(&self, job_id: &str, message: impl Into<String>) -> Result<Job> {
        let message = message.into();
        self.update(job_id, |job| {
            job.status = JobStatus::Failed;
            job.message = Some(message);
        })
        .await
    }

    /// Receive every committed snapshot from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(job_id: &str) -> StatusStore {
        let store = StatusStore::new();
        store.insert(Job::pending(job_id)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = StatusStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_insert_duplicate_rejected() {
        let store = store_with("j1").await;
        assert!(store.insert(Job::pending("j1")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_replaces_snapshot() {
        let store = store_with("j1").await;
        let job = store
            .update("j1", |job| {
                job.status = JobStatus::Running;
                job.stage = Some("ingestion".to_string());
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(store.get("j1").await.unwrap(), job);
    }

    #[tokio::test]
    async fn test_finished_at_set_on_terminal() {
        let store = store_with("j1").await;
        let running = store
            .update("j1", |job| job.status = JobStatus::Running)
            .await
            .unwrap();
        assert!(running.finished_at.is_none());

        let done = store
            .update("j1", |job| {
                job.status = JobStatus::Completed;
                job.progress = 1.0;
            })
            .await
            .unwrap();
        assert!(done.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_job_is_frozen() {
        let store = store_with("j1").await;
        let failed = store.fail("j1", "boom").await.unwrap();

        let err = store
            .update("j1", |job| job.message = Some("again".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(store.get("j1").await.unwrap(), failed);
    }

    #[tokio::test]
    async fn test_status_cannot_regress() {
        let store = store_with("j1").await;
        store
            .update("j1", |job| job.status = JobStatus::Running)
            .await
            .unwrap();
        assert!(store
            .update("j1", |job| job.status = JobStatus::Pending)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_progress_cannot_decrease() {
        let store = store_with("j1").await;
        store
            .update("j1", |job| {
                job.status = JobStatus::Running;
                job.progress = 0.5;
            })
            .await
            .unwrap();
        assert!(store.update("j1", |job| job.progress = 0.25).await.is_err());
        assert_eq!(store.get("j1").await.unwrap().progress, 0.5);
    }

    #[tokio::test]
    async fn test_started_at_and_id_are_immutable() {
        let store = store_with("j1").await;
        let original = store.get("j1").await.unwrap();
        let job = store
            .update("j1", |job| {
                job.job_id = "other".to_string();
                job.started_at = Utc::now() + chrono::Duration::days(1);
            })
            .await
            .unwrap();
        assert_eq!(job.job_id, "j1");
        assert_eq!(job.started_at, original.started_at);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = StatusStore::new();
        store.insert(Job::pending("a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.insert(Job::pending("b")).await.unwrap();

        let ids: Vec<_> = store.list().await.into_iter().map(|j| j.job_id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_events_follow_commits() {
        let store = StatusStore::new();
        let mut rx = store.subscribe();

        store.insert(Job::pending("j1")).await.unwrap();
        store
            .update("j1", |job| job.status = JobStatus::Running)
            .await
            .unwrap();
        store.fail("j1", "boom").await.unwrap();

        let kinds: Vec<_> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|e| e.event_type)
        .collect();
        assert_eq!(kinds, vec!["job.queued", "job.started", "job.failed"]);
    }

    #[tokio::test]
    async fn test_rejected_write_emits_nothing() {
        let store = store_with("j1").await;
        store.fail("j1", "boom").await.unwrap();
        let mut rx = store.subscribe();

        let _ = store.update("j1", |job| job.progress = 1.0).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
