//! Community detection by weighted label propagation.
//!
//! Deterministic: nodes are visited in key order, each adopts the label with
//! the largest summed edge weight among its neighbours (ties go to the
//! smallest label), and iteration stops when nothing changes or the cap is
//! reached. Entities without relationships form their own communities.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tracing::info;

use graphkb_core::defaults::COMMUNITY_MAX_ITERATIONS;
use graphkb_core::{Community, PipelineArtifacts, Relationship, Result, StageKind};

use super::{stable_id, PipelineStage, StageContext};

pub struct DetectCommunitiesStage {
    max_iterations: usize,
}

impl Default for DetectCommunitiesStage {
    fn default() -> Self {
        Self {
            max_iterations: COMMUNITY_MAX_ITERATIONS,
        }
    }
}

impl DetectCommunitiesStage {
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self { max_iterations }
    }
}

/// Assign each node a community label.
///
/// `nodes` must be sorted; the returned map covers every node.
pub fn label_propagation(
    nodes: &[String],
    relationships: &[Relationship],
    max_iterations: usize,
) -> BTreeMap<String, String> {
    let mut adjacency: HashMap<&str, Vec<(&str, f64)>> = HashMap::new();
    for rel in relationships {
        let weight = if rel.weight > 0.0 { rel.weight } else { 1.0 };
        adjacency
            .entry(rel.source.as_str())
            .or_default()
            .push((rel.target.as_str(), weight));
        adjacency
            .entry(rel.target.as_str())
            .or_default()
            .push((rel.source.as_str(), weight));
    }

    let mut labels: BTreeMap<String, String> =
        nodes.iter().map(|n| (n.clone(), n.clone())).collect();

    for _ in 0..max_iterations {
        let mut changed = false;
        for node in nodes {
            let Some(neighbours) = adjacency.get(node.as_str()) else {
                continue;
            };

            let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
            for (neighbour, weight) in neighbours {
                if let Some(label) = labels.get(*neighbour) {
                    *scores.entry(label.as_str()).or_insert(0.0) += weight;
                }
            }

            // BTreeMap iterates labels in ascending order, so strict `>`
            // keeps the smallest label on ties.
            let mut best: Option<(&str, f64)> = None;
            for (label, score) in &scores {
                if best.map(|(_, s)| *score > s).unwrap_or(true) {
                    best = Some((label, *score));
                }
            }

            if let Some((label, _)) = best {
                if labels.get(node).map(String::as_str) != Some(label) {
                    let label = label.to_string();
                    labels.insert(node.clone(), label);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    labels
}

#[async_trait]
impl PipelineStage for DetectCommunitiesStage {
    fn kind(&self) -> StageKind {
        StageKind::DetectCommunities
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        let nodes: Vec<String> = artifacts.entities.keys().cloned().collect();
        let labels = label_propagation(&nodes, &artifacts.relationships, self.max_iterations);

        let mut members: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (node, label) in &labels {
            members.entry(label.as_str()).or_default().push(node.as_str());
        }

        let communities: Vec<Community> = members
            .iter()
            .map(|(label, nodes)| {
                let relationship_ids = artifacts
                    .relationships
                    .iter()
                    .filter(|r| {
                        labels.get(&r.source).map(String::as_str) == Some(*label)
                            && labels.get(&r.target).map(String::as_str) == Some(*label)
                    })
                    .map(|r| r.id.clone())
                    .collect();
                Community {
                    id: stable_id(&["community", label]),
                    entities: nodes
                        .iter()
                        .map(|key| {
                            artifacts
                                .entities
                                .get(*key)
                                .map(|e| e.name.clone())
                                .unwrap_or_else(|| key.to_string())
                        })
                        .collect(),
                    relationship_ids,
                }
            })
            .collect();

        info!(
            job_id = %ctx.job_id,
            communities = communities.len(),
            entities = nodes.len(),
            "Communities detected"
        );
        let message = format!(
            "Detected {} communities over {} entities",
            communities.len(),
            nodes.len()
        );
        artifacts.communities = communities;
        Ok(message)
    }
}
