//! Fakes shared by the stage unit tests.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use graphkb_core::{
    ChatMessage, Claim, Community, CommunityReport, Document, EmbeddingRecord, Entity, Error,
    GraphStore, IndexingMethod, LlmClient, LlmConfig, LlmProvider, Relationship, Result, TextUnit,
    VectorStore,
};

use super::StageContext;

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// LLM answering every prompt through a closure.
pub struct ScriptedClient {
    respond: Box<Responder>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(respond: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn answer(&self, prompt: String) -> Result<String> {
        let reply = (self.respond)(&prompt);
        self.prompts.lock().unwrap().push(prompt);
        reply
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.answer(prompt)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.answer(prompt.to_string())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }

    fn model_name(&self) -> Option<&str> {
        Some("scripted")
    }
}

pub struct FixedProvider {
    client: Option<Arc<dyn LlmClient>>,
}

impl FixedProvider {
    pub fn with(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn none() -> Self {
        Self { client: None }
    }
}

#[async_trait]
impl LlmProvider for FixedProvider {
    async fn active_client(&self) -> Result<Arc<dyn LlmClient>> {
        self.client
            .clone()
            .ok_or_else(|| Error::Connectivity("LLM client not initialized".to_string()))
    }

    async fn current_config(&self) -> LlmConfig {
        LlmConfig::default()
    }
}

/// Stores that remember how many records each call received.
#[derive(Default)]
pub struct CountingStore {
    pub writes: Mutex<Vec<(&'static str, usize)>>,
}

impl CountingStore {
    fn record(&self, collection: &'static str, count: usize) -> Result<usize> {
        self.writes.lock().unwrap().push((collection, count));
        Ok(count)
    }
}

#[async_trait]
impl GraphStore for CountingStore {
    async fn upsert_documents(&self, documents: &[Document]) -> Result<usize> {
        self.record("documents", documents.len())
    }

    async fn upsert_text_units(&self, text_units: &[TextUnit]) -> Result<usize> {
        self.record("text_units", text_units.len())
    }

    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize> {
        self.record("entities", entities.len())
    }

    async fn upsert_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        self.record("relationships", relationships.len())
    }

    async fn upsert_claims(&self, claims: &[Claim]) -> Result<usize> {
        self.record("claims", claims.len())
    }

    async fn upsert_communities(&self, communities: &[Community]) -> Result<usize> {
        self.record("communities", communities.len())
    }

    async fn upsert_reports(&self, reports: &[CommunityReport]) -> Result<usize> {
        self.record("reports", reports.len())
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    async fn upsert_embeddings(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        self.record("embeddings", records.len())
    }
}

pub fn context_with(input: &Path, llm: Arc<dyn LlmProvider>) -> StageContext {
    let store = Arc::new(CountingStore::default());
    StageContext {
        job_id: "test-job".to_string(),
        input_path: input.to_path_buf(),
        indexing_method: IndexingMethod::Standard,
        llm,
        graph_store: store.clone(),
        vector_store: store,
        chunk_size: 1200,
        chunk_overlap: 100,
        converter_timeout: Duration::from_secs(30),
    }
}

pub fn context_for(input: &Path) -> StageContext {
    context_with(input, Arc::new(FixedProvider::none()))
}

pub fn scripted(
    respond: impl Fn(&str) -> Result<String> + Send + Sync + 'static,
) -> (Arc<ScriptedClient>, StageContext) {
    let client = Arc::new(ScriptedClient::new(respond));
    let ctx = context_with(
        Path::new("."),
        Arc::new(FixedProvider::with(client.clone())),
    );
    (client, ctx)
}

/// Single-page PDF whose text layer reads "Hello World".
pub const HELLO_PDF: &[u8] = b"%PDF-1.0
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj

2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj

3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
   /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>
endobj

4 0 obj
<< /Length 44 >>
stream
BT /F1 12 Tf 100 700 Td (Hello World) Tj ET
endstream
endobj

5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000266 00000 n
0000000360 00000 n

trailer
<< /Size 6 /Root 1 0 R >>
startxref
434
%%EOF";
