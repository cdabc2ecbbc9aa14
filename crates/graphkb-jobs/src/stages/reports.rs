//! Community reports: one LLM summary per detected community.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use graphkb_core::{
    Community, CommunityReport, PipelineArtifacts, Relationship, Result, StageKind,
};

use super::{parse_llm_json, stable_id, PipelineStage, StageContext};

const REPORT_PROMPT: &str = r#"Write a short report about the community of entities below.

Return JSON of the form:
{"title": "...", "summary": "..."}

"#;

pub struct CommunityReportsStage;

#[derive(Debug, Deserialize)]
struct ReportReply {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
}

fn report_prompt(community: &Community, artifacts: &PipelineArtifacts) -> String {
    let mut prompt = String::from(REPORT_PROMPT);
    prompt.push_str("Entities:\n");
    for name in &community.entities {
        let description = artifacts
            .entities
            .get(&name.to_uppercase())
            .map(|e| e.description.as_str())
            .unwrap_or_default();
        prompt.push_str(&format!("- {}: {}\n", name, description));
    }

    let relationships: Vec<&Relationship> = artifacts
        .relationships
        .iter()
        .filter(|r| community.relationship_ids.contains(&r.id))
        .collect();
    if !relationships.is_empty() {
        prompt.push_str("\nRelationships:\n");
        for rel in relationships {
            prompt.push_str(&format!(
                "- {} -> {}: {}\n",
                rel.source, rel.target, rel.description
            ));
        }
    }
    prompt
}

/// Title and summary from a model reply; prose is kept as the summary.
fn parse_report(reply: &str, fallback_title: &str) -> (String, String) {
    match parse_llm_json::<ReportReply>(reply) {
        Ok(parsed) if !parsed.summary.trim().is_empty() => {
            let title = if parsed.title.trim().is_empty() {
                fallback_title.to_string()
            } else {
                parsed.title.trim().to_string()
            };
            (title, parsed.summary.trim().to_string())
        }
        _ => (fallback_title.to_string(), reply.trim().to_string()),
    }
}

#[async_trait]
impl PipelineStage for CommunityReportsStage {
    fn kind(&self) -> StageKind {
        StageKind::CommunityReports
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        if artifacts.communities.is_empty() {
            artifacts.reports.clear();
            return Ok("No communities to report on".to_string());
        }

        let client = ctx.llm.active_client().await?;
        let mut reports = Vec::with_capacity(artifacts.communities.len());
        for community in &artifacts.communities {
            let reply = client.complete(&report_prompt(community, artifacts)).await?;
            let fallback_title = community.entities.join(", ");
            let (title, summary) = parse_report(&reply, &fallback_title);
            debug!(job_id = %ctx.job_id, community_id = %community.id, title = %title, "Report written");
            reports.push(CommunityReport {
                id: stable_id(&["report", &community.id]),
                community_id: community.id.clone(),
                title,
                summary,
            });
        }

        info!(job_id = %ctx.job_id, reports = reports.len(), "Community reports generated");
        let message = format!("Generated {} community reports", reports.len());
        artifacts.reports = reports;
        Ok(message)
    }
}
