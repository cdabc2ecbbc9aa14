//! File-backed graph and vector stores.
//!
//! Each collection is a `<collection>.jsonl` file with one JSON object per
//! line. Upserts merge by the record's `id` field and rewrite the file
//! through a temporary sibling followed by a rename, so a reader never sees
//! a half-written collection.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use graphkb_core::{
    Claim, Community, CommunityReport, Document, EmbeddingRecord, Entity, Error, GraphStore,
    Relationship, Result, TextUnit, VectorStore,
};

/// Writes slower than this are logged as warnings.
const SLOW_WRITE_THRESHOLD_MS: u128 = 500;

/// Directory of JSONL collections guarded by a single writer lock.
struct JsonlCollections {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlCollections {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", collection))
    }

    async fn read(&self, collection: &str) -> Result<Vec<JsonValue>> {
        read_jsonl(&self.path(collection)).await
    }

    async fn upsert<T: Serialize>(&self, collection: &str, records: &[T]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let start = Instant::now();
        let _guard = self.write_lock.lock().await;

        let path = self.path(collection);
        let mut merged: BTreeMap<String, JsonValue> = BTreeMap::new();
        for existing in read_jsonl(&path).await? {
            if let Some(id) = record_id(&existing) {
                merged.insert(id, existing);
            }
        }
        for record in records {
            let value = serde_json::to_value(record)?;
            let id = record_id(&value).ok_or_else(|| {
                Error::Storage(format!("{} record has no string id", collection))
            })?;
            merged.insert(id, value);
        }

        let mut body = String::new();
        for value in merged.values() {
            body.push_str(&serde_json::to_string(value)?);
            body.push('\n');
        }

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Storage(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;
        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;

        let elapsed = start.elapsed().as_millis();
        if elapsed > SLOW_WRITE_THRESHOLD_MS {
            warn!(
                subsystem = "storage",
                collection,
                records = records.len(),
                total = merged.len(),
                duration_ms = elapsed as u64,
                "Slow collection write"
            );
        } else {
            debug!(
                subsystem = "storage",
                collection,
                records = records.len(),
                total = merged.len(),
                duration_ms = elapsed as u64,
                "Collection written"
            );
        }
        Ok(records.len())
    }
}

fn record_id(value: &JsonValue) -> Option<String> {
    value.get("id").and_then(|id| id.as_str()).map(str::to_string)
}

async fn read_jsonl(path: &Path) -> Result<Vec<JsonValue>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                Error::Storage(format!("{} line {}: {}", path.display(), n + 1, e))
            })
        })
        .collect()
}

// =============================================================================
// GRAPH STORE
// =============================================================================

/// Graph collections under `<output_dir>/graph`.
pub struct JsonlGraphStore {
    collections: JsonlCollections,
}

impl JsonlGraphStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            collections: JsonlCollections::new(dir.into()),
        }
    }

    /// Store rooted at `<output_dir>/graph`.
    pub fn under(output_dir: &Path) -> Self {
        Self::new(output_dir.join("graph"))
    }

    pub fn dir(&self) -> &Path {
        &self.collections.dir
    }

    /// Raw records of one collection, ordered by id.
    pub async fn read_collection(&self, collection: &str) -> Result<Vec<JsonValue>> {
        self.collections.read(collection).await
    }
}

#[async_trait]
impl GraphStore for JsonlGraphStore {
    async fn upsert_documents(&self, documents: &[Document]) -> Result<usize> {
        self.collections.upsert("documents", documents).await
    }

    async fn upsert_text_units(&self, text_units: &[TextUnit]) -> Result<usize> {
        self.collections.upsert("text_units", text_units).await
    }

    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize> {
        self.collections.upsert("entities", entities).await
    }

    async fn upsert_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        self.collections.upsert("relationships", relationships).await
    }

    async fn upsert_claims(&self, claims: &[Claim]) -> Result<usize> {
        self.collections.upsert("claims", claims).await
    }

    async fn upsert_communities(&self, communities: &[Community]) -> Result<usize> {
        self.collections.upsert("communities", communities).await
    }

    async fn upsert_reports(&self, reports: &[CommunityReport]) -> Result<usize> {
        self.collections.upsert("community_reports", reports).await
    }
}

// =============================================================================
// VECTOR STORE
// =============================================================================

/// Embedding collections under `<output_dir>/vectors`.
pub struct JsonlVectorStore {
    collections: JsonlCollections,
}

impl JsonlVectorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            collections: JsonlCollections::new(dir.into()),
        }
    }

    /// Store rooted at `<output_dir>/vectors`.
    pub fn under(output_dir: &Path) -> Self {
        Self::new(output_dir.join("vectors"))
    }

    pub fn dir(&self) -> &Path {
        &self.collections.dir
    }

    pub async fn read_collection(&self, collection: &str) -> Result<Vec<JsonValue>> {
        self.collections.read(collection).await
    }
}

#[async_trait]
impl VectorStore for JsonlVectorStore {
    async fn upsert_embeddings(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut by_collection: BTreeMap<&str, Vec<&EmbeddingRecord>> = BTreeMap::new();
        for record in records {
            by_collection
                .entry(record.collection.as_str())
                .or_default()
                .push(record);
        }

        let mut written = 0;
        for (collection, batch) in by_collection {
            written += self.collections.upsert(collection, &batch).await?;
        }
        Ok(written)
    }
}
