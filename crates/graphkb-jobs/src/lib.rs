//! # graphkb-jobs
//!
//! Pipeline jobs for graphkb.
//!
//! This crate provides:
//! - An in-memory [`StatusStore`] that enforces the job lifecycle and
//!   broadcasts every committed snapshot
//! - The eight default [`stages`] and the [`StagePlan`] that schedules them
//! - A [`PipelineExecutor`] that runs a plan with per-stage timeouts
//! - A [`JobManager`] that validates run requests and launches pipelines
//! - JSON-lines graph and vector stores
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use graphkb_inference::LlmConfigResolver;
//! use graphkb_jobs::{JobManager, PipelineConfig, RunRequest};
//!
//! let resolver = Arc::new(LlmConfigResolver::from_env());
//! let manager = JobManager::new(PipelineConfig::from_env(), resolver);
//!
//! let job = manager.create_job(RunRequest::new("batch1")).await?;
//! let mut events = manager.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{} {:?}", event.event_type, event.job.stage);
//! }
//! ```

pub mod config;
pub mod executor;
pub mod manager;
pub mod stages;
pub mod storage;
pub mod store;

// Re-export core types
pub use graphkb_core::*;

pub use config::PipelineConfig;
pub use executor::PipelineExecutor;
pub use manager::{JobManager, RunRequest};
pub use stages::{default_stages, PipelineStage, StageContext, StageDescriptor, StagePlan};
pub use storage::{JsonlGraphStore, JsonlVectorStore};
pub use store::StatusStore;
