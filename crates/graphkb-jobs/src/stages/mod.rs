//! Pipeline stages.
//!
//! A stage reads and extends the job's [`PipelineArtifacts`]. The executor
//! only sees the [`PipelineStage`] trait; which stages run, and in what
//! order, is decided by a [`StagePlan`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use graphkb_core::{
    Error, GraphStore, IndexingMethod, LlmProvider, PipelineArtifacts, Result, StageKind,
    VectorStore,
};

pub mod communities;
pub mod embeddings;
pub mod extraction;
pub mod ingestion;
pub mod persistence;
pub mod readers;
pub mod reports;
pub mod text_units;

#[cfg(test)]
pub(crate) mod tests_support;

pub use communities::DetectCommunitiesStage;
pub use embeddings::EmbeddingsStage;
pub use extraction::{ExtractClaimsStage, ExtractGraphStage};
pub use ingestion::IngestionStage;
pub use persistence::PersistenceStage;
pub use reports::CommunityReportsStage;
pub use text_units::TextUnitsStage;

/// Everything a stage may consult while running one job.
#[derive(Clone)]
pub struct StageContext {
    pub job_id: String,
    /// Canonical input directory or file.
    pub input_path: PathBuf,
    pub indexing_method: IndexingMethod,
    pub llm: Arc<dyn LlmProvider>,
    pub graph_store: Arc<dyn GraphStore>,
    pub vector_store: Arc<dyn VectorStore>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Bound for each external converter call made while reading inputs.
    pub converter_timeout: Duration,
}

/// One unit of pipeline work.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Name written to the job's `stage` field.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Run the stage; the returned text becomes the job message.
    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String>;
}

/// A scheduled stage and its 1-based position in the plan.
#[derive(Clone)]
pub struct StageDescriptor {
    pub ordinal: usize,
    pub name: &'static str,
    pub stage: Arc<dyn PipelineStage>,
}

/// Ordered list of stages scheduled for one job.
#[derive(Clone)]
pub struct StagePlan {
    descriptors: Vec<StageDescriptor>,
}

impl StagePlan {
    /// Schedule `stages` in order, leaving out optional stages unless
    /// `include_optional` is set.
    pub fn new(stages: &[Arc<dyn PipelineStage>], include_optional: bool) -> Self {
        let descriptors = stages
            .iter()
            .filter(|stage| include_optional || !stage.kind().is_optional())
            .enumerate()
            .map(|(i, stage)| StageDescriptor {
                ordinal: i + 1,
                name: stage.name(),
                stage: Arc::clone(stage),
            })
            .collect();
        Self { descriptors }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.descriptors.iter()
    }
}

/// The eight built-in stages in pipeline order.
pub fn default_stages() -> Vec<Arc<dyn PipelineStage>> {
    vec![
        Arc::new(IngestionStage),
        Arc::new(TextUnitsStage),
        Arc::new(ExtractGraphStage),
        Arc::new(ExtractClaimsStage),
        Arc::new(DetectCommunitiesStage::default()),
        Arc::new(CommunityReportsStage),
        Arc::new(EmbeddingsStage::default()),
        Arc::new(PersistenceStage),
    ]
}

/// SHA-256 hex digest of the parts joined with `:`.
pub fn stable_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join(":").as_bytes());
    hex::encode(hasher.finalize())
}

/// Parse the first JSON object in an LLM reply.
///
/// Models often wrap JSON in prose or code fences; everything outside the
/// outermost braces is ignored.
pub fn parse_llm_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => {
            return Err(Error::Serialization(
                "LLM reply contains no JSON object".to_string(),
            ))
        }
    };
    serde_json::from_str(body).map_err(|e| Error::Serialization(format!("Invalid LLM JSON: {}", e)))
}
