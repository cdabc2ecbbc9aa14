//! # graphkb-core
//!
//! Core types, traits, and abstractions for graphkb, the document-to-
//! knowledge-graph orchestration service.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the inference, jobs, and API crates depend on.

pub mod artifacts;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use artifacts::*;
pub use error::{Error, Result};
pub use events::{EventBus, JobEvent, JobEventKind};
pub use models::*;
pub use traits::*;
