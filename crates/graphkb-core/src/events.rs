//! Job events and the broadcast bus that carries them.
//!
//! Every committed status write produces a [`JobEvent`] carrying the full job
//! snapshot. Polling reads and streaming subscribers therefore observe the
//! same state: a subscriber sees exactly the sequence of snapshots a poller
//! could have read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Job, JobStatus};

/// Kind of status change a [`JobEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Queued,
    Started,
    Progress,
    Completed,
    Failed,
}

impl JobEventKind {
    /// Namespaced event type (e.g., `"job.started"`).
    pub fn namespaced(self) -> &'static str {
        match self {
            Self::Queued => "job.queued",
            Self::Started => "job.started",
            Self::Progress => "job.progress",
            Self::Completed => "job.completed",
            Self::Failed => "job.failed",
        }
    }

    /// Classify a write given the status before and after it.
    pub fn classify(before: Option<JobStatus>, after: JobStatus) -> Self {
        match (before, after) {
            (None, _) => Self::Queued,
            (_, JobStatus::Completed) => Self::Completed,
            (_, JobStatus::Failed) => Self::Failed,
            (Some(JobStatus::Pending), JobStatus::Running) => Self::Started,
            _ => Self::Progress,
        }
    }
}

/// Envelope around a committed job snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    pub event_type: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub job: Job,
}

impl JobEvent {
    pub fn new(kind: JobEventKind, job: Job) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: kind.namespaced(),
            occurred_at: Utc::now(),
            job,
        }
    }
}

/// Broadcast-based bus for distributing job events to any number of consumers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently when nobody listens.
    pub fn emit(&self, event: JobEvent) {
        tracing::trace!(
            event_type = event.event_type,
            job_id = %event.job.job_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events. Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
