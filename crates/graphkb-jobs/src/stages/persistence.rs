//! Final stage: hand every artifact collection to the stores.

use async_trait::async_trait;
use tracing::info;

use graphkb_core::{PipelineArtifacts, Result, StageKind};

use super::{PipelineStage, StageContext};

pub struct PersistenceStage;

#[async_trait]
impl PipelineStage for PersistenceStage {
    fn kind(&self) -> StageKind {
        StageKind::Persistence
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        let graph = &ctx.graph_store;
        let documents = graph.upsert_documents(&artifacts.documents).await?;
        let text_units = graph.upsert_text_units(&artifacts.text_units).await?;
        let entities: Vec<_> = artifacts.entities.values().cloned().collect();
        let entities = graph.upsert_entities(&entities).await?;
        let relationships = graph.upsert_relationships(&artifacts.relationships).await?;
        let claims = graph.upsert_claims(&artifacts.claims).await?;
        let communities = graph.upsert_communities(&artifacts.communities).await?;
        let reports = graph.upsert_reports(&artifacts.reports).await?;
        let embeddings = ctx
            .vector_store
            .upsert_embeddings(&artifacts.embeddings)
            .await?;

        info!(
            job_id = %ctx.job_id,
            documents,
            text_units,
            entities,
            relationships,
            claims,
            communities,
            reports,
            embeddings,
            "Artifacts persisted"
        );
        Ok(format!(
            "Persisted {} documents, {} entities, {} relationships and {} embeddings",
            documents, entities, relationships, embeddings
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests_support::{CountingStore, FixedProvider};
    use graphkb_core::{EmbeddingRecord, IndexingMethod};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_writes_every_collection() {
        let store = Arc::new(CountingStore::default());
        let ctx = StageContext {
            job_id: "job".to_string(),
            input_path: PathBuf::from("."),
            indexing_method: IndexingMethod::Standard,
            llm: Arc::new(FixedProvider::none()),
            graph_store: store.clone(),
            vector_store: store.clone(),
            chunk_size: 100,
            chunk_overlap: 0,
            converter_timeout: Duration::from_secs(5),
        };
        let mut artifacts = PipelineArtifacts::new();
        artifacts.embeddings = vec![EmbeddingRecord {
            id: "u1".to_string(),
            collection: "text_units".to_string(),
            vector: vec![1.0],
        }];

        let message = PersistenceStage.run(&ctx, &mut artifacts).await.unwrap();

        assert_eq!(
            message,
            "Persisted 0 documents, 0 entities, 0 relationships and 1 embeddings"
        );
        let writes = store.writes.lock().unwrap();
        let collections: Vec<_> = writes.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            collections,
            vec![
                "documents",
                "text_units",
                "entities",
                "relationships",
                "claims",
                "communities",
                "reports",
                "embeddings"
            ]
        );
        assert_eq!(writes.last(), Some(&("embeddings", 1)));
    }
}
