//! Embeddings for text units and entities.

use async_trait::async_trait;
use tracing::info;

use graphkb_core::defaults::EMBED_BATCH_SIZE;
use graphkb_core::{EmbeddingRecord, Error, LlmClient, PipelineArtifacts, Result, StageKind};

use super::{PipelineStage, StageContext};

pub const TEXT_UNIT_COLLECTION: &str = "text_units";
pub const ENTITY_COLLECTION: &str = "entities";

pub struct EmbeddingsStage {
    batch_size: usize,
}

impl Default for EmbeddingsStage {
    fn default() -> Self {
        Self {
            batch_size: EMBED_BATCH_SIZE,
        }
    }
}

impl EmbeddingsStage {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    async fn embed_all(
        &self,
        client: &dyn LlmClient,
        collection: &str,
        items: Vec<(String, String)>,
    ) -> Result<Vec<EmbeddingRecord>> {
        let mut records = Vec::with_capacity(items.len());
        for batch in items.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = client.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Serialization(format!(
                    "Embedding count mismatch for {}: sent {}, received {}",
                    collection,
                    batch.len(),
                    vectors.len()
                )));
            }
            records.extend(batch.iter().zip(vectors).map(|((id, _), vector)| {
                EmbeddingRecord {
                    id: id.clone(),
                    collection: collection.to_string(),
                    vector,
                }
            }));
        }
        Ok(records)
    }
}

#[async_trait]
impl PipelineStage for EmbeddingsStage {
    fn kind(&self) -> StageKind {
        StageKind::Embeddings
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        let units: Vec<(String, String)> = artifacts
            .text_units
            .iter()
            .map(|u| (u.id.clone(), u.text.clone()))
            .collect();
        let entities: Vec<(String, String)> = artifacts
            .entities
            .values()
            .map(|e| (e.id.clone(), format!("{}: {}", e.name, e.description)))
            .collect();

        if units.is_empty() && entities.is_empty() {
            artifacts.embeddings.clear();
            return Ok("Nothing to embed".to_string());
        }

        let client = ctx.llm.active_client().await?;
        let mut embeddings = self
            .embed_all(client.as_ref(), TEXT_UNIT_COLLECTION, units)
            .await?;
        let unit_count = embeddings.len();
        embeddings.extend(
            self.embed_all(client.as_ref(), ENTITY_COLLECTION, entities)
                .await?,
        );
        let entity_count = embeddings.len() - unit_count;

        info!(
            job_id = %ctx.job_id,
            text_units = unit_count,
            entities = entity_count,
            "Embeddings generated"
        );
        artifacts.embeddings = embeddings;
        Ok(format!(
            "Embedded {} text units and {} entities",
            unit_count, entity_count
        ))
    }
}
