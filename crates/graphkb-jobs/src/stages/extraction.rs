//! Entity, relationship, and claim extraction.
//!
//! The standard method asks the active LLM for JSON per text unit. The fast
//! method needs no LLM: capitalised phrases become entities, and phrases
//! sharing a text unit are linked.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use graphkb_core::{
    ChatMessage, Claim, Entity, Error, IndexingMethod, PipelineArtifacts, Relationship, Result,
    StageKind, TextUnit,
};

use super::{parse_llm_json, stable_id, PipelineStage, StageContext};

const GRAPH_SYSTEM_PROMPT: &str = "You extract knowledge graphs from text. \
Reply with a single JSON object and nothing else.";

const GRAPH_PROMPT: &str = r#"Identify the named entities in the text below and the relationships between them.

Return JSON of the form:
{"entities": [{"name": "...", "type": "person|organization|location|event|concept", "description": "..."}],
 "relationships": [{"source": "...", "target": "...", "description": "...", "weight": 1.0}]}

Relationship sources and targets must be entity names from the list.

Text:
"#;

const CLAIMS_PROMPT: &str = r#"List the factual claims made in the text below about its entities.

Return JSON of the form:
{"claims": [{"subject": "...", "object": "... or null", "type": "...", "status": "TRUE|FALSE|SUSPECTED", "description": "..."}]}

Text:
"#;

/// Words that start sentences often enough to be useless as entities on their own.
const STOPWORDS: [&str; 24] = [
    "A", "An", "And", "As", "At", "But", "By", "For", "From", "He", "Her", "His", "I", "If", "In",
    "It", "Its", "On", "She", "The", "They", "This", "That", "We",
];

#[derive(Debug, Deserialize)]
struct GraphReply {
    #[serde(default)]
    entities: Vec<EntityReply>,
    #[serde(default)]
    relationships: Vec<RelationshipReply>,
}

#[derive(Debug, Deserialize)]
struct EntityReply {
    name: String,
    #[serde(rename = "type", default)]
    entity_type: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RelationshipReply {
    source: String,
    target: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_weight")]
    weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct ClaimsReply {
    #[serde(default)]
    claims: Vec<ClaimReply>,
}

#[derive(Debug, Deserialize)]
struct ClaimReply {
    subject: String,
    #[serde(default)]
    object: Option<String>,
    #[serde(rename = "type", default)]
    claim_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    description: String,
}

/// Key used to merge entities: trimmed, upper-cased name.
pub fn entity_key(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Accumulates entities and relationships across text units.
#[derive(Default)]
struct GraphBuilder {
    entities: BTreeMap<String, Entity>,
    relationships: BTreeMap<(String, String), Relationship>,
}

impl GraphBuilder {
    fn add_entity(&mut self, name: &str, entity_type: &str, description: &str, unit_id: &str) {
        let key = entity_key(name);
        if key.is_empty() {
            return;
        }
        let entity = self.entities.entry(key.clone()).or_insert_with(|| Entity {
            id: stable_id(&["entity", &key]),
            name: name.trim().to_string(),
            entity_type: String::new(),
            description: String::new(),
            text_unit_ids: Vec::new(),
        });
        if entity.entity_type.is_empty() && !entity_type.trim().is_empty() {
            entity.entity_type = entity_type.trim().to_lowercase();
        }
        let description = description.trim();
        if !description.is_empty() && !entity.description.contains(description) {
            if !entity.description.is_empty() {
                entity.description.push('\n');
            }
            entity.description.push_str(description);
        }
        if !entity.text_unit_ids.iter().any(|id| id == unit_id) {
            entity.text_unit_ids.push(unit_id.to_string());
        }
    }

    fn add_relationship(
        &mut self,
        source: &str,
        target: &str,
        description: &str,
        weight: f64,
        unit_id: &str,
    ) {
        let (source_key, target_key) = (entity_key(source), entity_key(target));
        if source_key.is_empty() || target_key.is_empty() || source_key == target_key {
            return;
        }
        // Endpoints the model forgot to list still become entities.
        self.add_entity(source, "", "", unit_id);
        self.add_entity(target, "", "", unit_id);

        let relationship = self
            .relationships
            .entry((source_key.clone(), target_key.clone()))
            .or_insert_with(|| Relationship {
                id: stable_id(&["relationship", &source_key, &target_key]),
                source: source_key.clone(),
                target: target_key.clone(),
                description: String::new(),
                weight: 0.0,
                text_unit_ids: Vec::new(),
            });
        relationship.weight += if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            1.0
        };
        let description = description.trim();
        if !description.is_empty() && !relationship.description.contains(description) {
            if !relationship.description.is_empty() {
                relationship.description.push('\n');
            }
            relationship.description.push_str(description);
        }
        if !relationship.text_unit_ids.iter().any(|id| id == unit_id) {
            relationship.text_unit_ids.push(unit_id.to_string());
        }
    }

    fn finish(mut self, artifacts: &mut PipelineArtifacts) {
        for entity in self.entities.values_mut() {
            if entity.entity_type.is_empty() {
                entity.entity_type = "unknown".to_string();
            }
        }
        artifacts.entities = self.entities;
        artifacts.relationships = self.relationships.into_values().collect();
    }
}

/// Capitalised phrases in `text`, e.g. "Ada Lovelace" or "London".
pub fn capitalised_phrases(text: &str) -> Vec<String> {
    fn flush(current: &mut Vec<&str>, phrases: &mut Vec<String>) {
        let keep = match current.as_slice() {
            [] => false,
            [single] => !STOPWORDS.contains(single),
            _ => true,
        };
        if keep {
            phrases.push(current.join(" "));
        }
        current.clear();
    }

    let mut phrases = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for raw in text.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalised = word.chars().count() > 1
            && word.chars().next().map(char::is_uppercase).unwrap_or(false);

        if capitalised {
            current.push(word);
        } else {
            flush(&mut current, &mut phrases);
        }

        // Punctuation after a word ends the phrase.
        let ends_phrase = raw
            .chars()
            .last()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(false);
        if ends_phrase {
            flush(&mut current, &mut phrases);
        }
    }
    flush(&mut current, &mut phrases);
    phrases
}

fn extract_fast(text_units: &[TextUnit], builder: &mut GraphBuilder) {
    for unit in text_units {
        let names: BTreeSet<String> = capitalised_phrases(&unit.text).into_iter().collect();
        for name in &names {
            builder.add_entity(name, "concept", "", &unit.id);
        }
        let names: Vec<&String> = names.iter().collect();
        for (i, source) in names.iter().enumerate() {
            for target in &names[i + 1..] {
                builder.add_relationship(source, target, "co-occurs with", 1.0, &unit.id);
            }
        }
    }
}

pub struct ExtractGraphStage;

#[async_trait]
impl PipelineStage for ExtractGraphStage {
    fn kind(&self) -> StageKind {
        StageKind::ExtractGraph
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        let mut builder = GraphBuilder::default();

        match ctx.indexing_method {
            IndexingMethod::Fast => extract_fast(&artifacts.text_units, &mut builder),
            IndexingMethod::Standard => {
                let client = ctx.llm.active_client().await?;
                for unit in &artifacts.text_units {
                    let reply = client
                        .chat(&[
                            ChatMessage::system(GRAPH_SYSTEM_PROMPT),
                            ChatMessage::user(format!("{}{}", GRAPH_PROMPT, unit.text)),
                        ])
                        .await?;
                    let parsed: GraphReply = parse_llm_json(&reply).map_err(|e| {
                        Error::Serialization(format!("text unit {}: {}", unit.id, e))
                    })?;
                    debug!(
                        text_unit = %unit.id,
                        entities = parsed.entities.len(),
                        relationships = parsed.relationships.len(),
                        "Extracted graph fragment"
                    );
                    for entity in &parsed.entities {
                        builder.add_entity(
                            &entity.name,
                            &entity.entity_type,
                            &entity.description,
                            &unit.id,
                        );
                    }
                    for rel in &parsed.relationships {
                        builder.add_relationship(
                            &rel.source,
                            &rel.target,
                            &rel.description,
                            rel.weight,
                            &unit.id,
                        );
                    }
                }
            }
        }

        builder.finish(artifacts);
        info!(
            job_id = %ctx.job_id,
            method = %ctx.indexing_method,
            entities = artifacts.entities.len(),
            relationships = artifacts.relationships.len(),
            "Graph extracted"
        );
        Ok(format!(
            "Extracted {} entities and {} relationships",
            artifacts.entities.len(),
            artifacts.relationships.len()
        ))
    }
}

pub struct ExtractClaimsStage;

#[async_trait]
impl PipelineStage for ExtractClaimsStage {
    fn kind(&self) -> StageKind {
        StageKind::ExtractClaims
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        let client = ctx.llm.active_client().await?;
        let mut claims = Vec::new();

        for unit in &artifacts.text_units {
            let reply = client
                .chat(&[
                    ChatMessage::system(GRAPH_SYSTEM_PROMPT),
                    ChatMessage::user(format!("{}{}", CLAIMS_PROMPT, unit.text)),
                ])
                .await?;
            let parsed: ClaimsReply = parse_llm_json(&reply)
                .map_err(|e| Error::Serialization(format!("text unit {}: {}", unit.id, e)))?;

            for (i, claim) in parsed.claims.into_iter().enumerate() {
                if claim.subject.trim().is_empty() {
                    continue;
                }
                claims.push(Claim {
                    id: stable_id(&["claim", &unit.id, &i.to_string()]),
                    subject: entity_key(&claim.subject),
                    object: claim
                        .object
                        .filter(|o| !o.trim().is_empty())
                        .map(|o| entity_key(&o)),
                    claim_type: claim.claim_type,
                    status: claim.status,
                    description: claim.description,
                    text_unit_id: unit.id.clone(),
                });
            }
        }

        info!(job_id = %ctx.job_id, claims = claims.len(), "Claims extracted");
        let message = format!("Extracted {} claims", claims.len());
        artifacts.claims = claims;
        Ok(message)
    }
}
