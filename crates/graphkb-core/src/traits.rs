//! Core traits for graphkb abstractions.
//!
//! These traits define the seams between the orchestration core and its
//! external collaborators (LLM endpoints, graph and vector stores), enabling
//! pluggable backends and testability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifacts::{
    Claim, Community, CommunityReport, Document, EmbeddingRecord, Entity, Relationship, TextUnit,
};
use crate::error::Result;
use crate::models::{ChatMessage, LlmConfig};

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// HTTP-reachable LLM capability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Chat-style generation; returns the assistant message content.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Single-prompt completion.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// One embedding vector per input text.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model the client sends requests for, if any.
    fn model_name(&self) -> Option<&str>;
}

/// Source of the currently active LLM client.
///
/// Stages never touch the LLM configuration directly; they ask the provider
/// for a client at the moment they need one.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// The client for the active configuration, or an error if none is usable.
    async fn active_client(&self) -> Result<Arc<dyn LlmClient>>;

    /// Snapshot of the active configuration.
    async fn current_config(&self) -> LlmConfig;
}

// =============================================================================
// STORAGE TRAITS
// =============================================================================

/// Write contract for the graph store.
///
/// Writes are upserts keyed by record id, so re-running a partially
/// persisted job is safe. Each method returns the number of records written.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_documents(&self, documents: &[Document]) -> Result<usize>;

    async fn upsert_text_units(&self, text_units: &[TextUnit]) -> Result<usize>;

    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize>;

    async fn upsert_relationships(&self, relationships: &[Relationship]) -> Result<usize>;

    async fn upsert_claims(&self, claims: &[Claim]) -> Result<usize>;

    async fn upsert_communities(&self, communities: &[Community]) -> Result<usize>;

    async fn upsert_reports(&self, reports: &[CommunityReport]) -> Result<usize>;
}

/// Write contract for the vector store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert vectors, grouped by each record's collection.
    async fn upsert_embeddings(&self, records: &[EmbeddingRecord]) -> Result<usize>;
}
