//! Intermediate and final artifacts produced by pipeline stages.
//!
//! Stages read and extend a shared [`PipelineArtifacts`] value; the
//! persistence stage hands the finished collections to the graph and vector
//! stores.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A source document read from the input path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Absolute path of the source file.
    pub uri: String,
    pub title: String,
    pub text: String,
    pub creation_date: Option<DateTime<Utc>>,
    pub metadata: JsonValue,
}

/// Addressable chunk of a document; the unit of extraction and embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    pub id: String,
    pub document_id: String,
    /// Position of the chunk within its document.
    pub order: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
    /// Text units the entity was seen in.
    pub text_unit_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source: String,
    pub target: String,
    pub description: String,
    pub weight: f64,
    pub text_unit_ids: Vec<String>,
}

/// An assertion tied to an entity and the text unit it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub subject: String,
    pub object: Option<String>,
    #[serde(rename = "type")]
    pub claim_type: String,
    pub status: String,
    pub description: String,
    pub text_unit_id: String,
}

/// Cluster of related entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    /// Entity names belonging to the community.
    pub entities: Vec<String>,
    /// Relationship ids with both endpoints inside the community.
    pub relationship_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityReport {
    pub id: String,
    pub community_id: String,
    pub title: String,
    pub summary: String,
}

/// Vector for one text unit or entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    /// Logical collection: "text_units" or "entities".
    pub collection: String,
    pub vector: Vec<f32>,
}

/// Everything the stages have produced so far for one job.
#[derive(Debug, Clone, Default)]
pub struct PipelineArtifacts {
    pub documents: Vec<Document>,
    pub text_units: Vec<TextUnit>,
    /// Keyed by normalized (upper-cased) entity name.
    pub entities: BTreeMap<String, Entity>,
    pub relationships: Vec<Relationship>,
    pub claims: Vec<Claim>,
    pub communities: Vec<Community>,
    pub reports: Vec<CommunityReport>,
    pub embeddings: Vec<EmbeddingRecord>,
}

impl PipelineArtifacts {
    pub fn new() -> Self {
        Self::default()
    }
}
