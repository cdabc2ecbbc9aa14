//! # graphkb-inference
//!
//! LLM endpoint resolution for graphkb.
//!
//! This crate provides:
//! - Ollama auto-discovery with an ordered probe list
//! - A resolver owning the single process-wide LLM configuration
//! - HTTP clients for Ollama and custom endpoints
//!
//! # Example
//!
//! ```rust,no_run
//! use graphkb_inference::LlmConfigResolver;
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = LlmConfigResolver::from_env();
//!     let status = resolver.resolve().await;
//!     println!("LLM ready: {}", status.client_initialized);
//! }
//! ```

pub mod config;
pub mod custom;
pub mod discovery;
pub mod ollama;
pub mod resolver;

pub use config::{DiscoveryConfig, ResolverConfig};
pub use custom::CustomClient;
pub use discovery::{Discovered, Discovery, EndpointProbe, ProbeOutcome};
pub use ollama::OllamaClient;
pub use resolver::LlmConfigResolver;
