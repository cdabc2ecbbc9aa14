//! Domain models for graphkb: LLM configuration state and pipeline jobs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// =============================================================================
// LLM CONFIGURATION
// =============================================================================

/// Which kind of LLM endpoint is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    /// Local Ollama server, located by auto-discovery or manual override.
    #[default]
    Ollama,
    /// User-provided HTTP endpoint.
    Custom,
}

impl FromStr for LlmMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "custom" => Ok(Self::Custom),
            other => Err(Error::Validation(format!(
                "Invalid LLM mode '{}': expected 'ollama' or 'custom'",
                other
            ))),
        }
    }
}

impl fmt::Display for LlmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Where the active `base_url` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    /// Manual override set through configuration.
    Override,
    /// `OLLAMA_HOST` environment variable.
    Environment,
    /// systemd service unit inspection.
    ServiceFile,
    /// One of the fixed loopback candidates.
    Candidate,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => write!(f, "override"),
            Self::Environment => write!(f, "environment"),
            Self::ServiceFile => write!(f, "service_file"),
            Self::Candidate => write!(f, "candidate"),
        }
    }
}

/// Snapshot of the process-wide LLM configuration.
///
/// Returned by the resolver's status call and serialized as-is by
/// `GET /api/llm/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub mode: LlmMode,
    pub base_url: Option<String>,
    pub model_name: Option<String>,
    /// True only after the most recent validation probe succeeded.
    pub client_initialized: bool,
    /// Message from the most recent failed validation, if any.
    pub last_error: Option<String>,
    pub discovered_via: Option<DiscoverySource>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mode: LlmMode::Ollama,
            base_url: None,
            model_name: None,
            client_initialized: false,
            last_error: None,
            discovered_via: None,
        }
    }
}

/// Partial update accepted by `POST /api/llm/config`.
///
/// Absent fields keep their current value. An empty `base_url` clears the
/// manual override; an empty `model_name` clears the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureRequest {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

/// A single chat turn sent to an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// =============================================================================
// PIPELINE JOBS
// =============================================================================

/// Lifecycle state of a pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Failed,
    Completed,
}

impl JobStatus {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Completed)
    }

    /// Position in the lifecycle; a job's rank never decreases.
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Failed | Self::Completed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Failed => write!(f, "failed"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// How entities and relationships are extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMethod {
    /// LLM-driven extraction.
    #[default]
    Standard,
    /// Deterministic extraction without LLM calls.
    Fast,
}

impl FromStr for IndexingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "fast" => Ok(Self::Fast),
            other => Err(Error::Validation(format!(
                "Invalid indexing_method '{}': expected 'standard' or 'fast'",
                other
            ))),
        }
    }
}

impl fmt::Display for IndexingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

/// One run of the indexing pipeline, as seen by polling clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub stage: Option<String>,
    pub progress: f64,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly queued job.
    pub fn pending(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            stage: None,
            progress: 0.0,
            message: Some("Job queued".to_string()),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Ingestion,
    TextUnits,
    ExtractGraph,
    ExtractClaims,
    DetectCommunities,
    CommunityReports,
    Embeddings,
    Persistence,
}

impl StageKind {
    /// Every stage in pipeline order.
    pub const ALL: [StageKind; 8] = [
        StageKind::Ingestion,
        StageKind::TextUnits,
        StageKind::ExtractGraph,
        StageKind::ExtractClaims,
        StageKind::DetectCommunities,
        StageKind::CommunityReports,
        StageKind::Embeddings,
        StageKind::Persistence,
    ];

    /// Name written to `Job::stage`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::TextUnits => "text_units",
            Self::ExtractGraph => "extract_graph",
            Self::ExtractClaims => "extract_claims",
            Self::DetectCommunities => "detect_communities",
            Self::CommunityReports => "community_reports",
            Self::Embeddings => "embeddings",
            Self::Persistence => "persistence",
        }
    }

    /// Whether the stage may be left out of a plan.
    pub fn is_optional(self) -> bool {
        matches!(self, Self::ExtractClaims)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_mode_parse_case_insensitive() {
        assert_eq!("Ollama".parse::<LlmMode>().unwrap(), LlmMode::Ollama);
        assert_eq!(" custom ".parse::<LlmMode>().unwrap(), LlmMode::Custom);
    }

    #[test]
    fn test_llm_mode_parse_invalid_is_validation_error() {
        let err = "openai".parse::<LlmMode>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_llm_config_serializes_expected_fields() {
        let cfg = LlmConfig::default();
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["mode"], "ollama");
        assert!(json["base_url"].is_null());
        assert!(json["model_name"].is_null());
        assert_eq!(json["client_initialized"], false);
    }

    #[test]
    fn test_configure_request_accepts_partial_body() {
        let req: ConfigureRequest = serde_json::from_str(r#"{"model_name":"llama3"}"#).unwrap();
        assert!(req.mode.is_none());
        assert!(req.base_url.is_none());
        assert_eq!(req.model_name.as_deref(), Some("llama3"));
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
    }

    #[test]
    fn test_job_status_never_regresses() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn test_pending_job_snapshot() {
        let job = Job::pending("abc");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.stage.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_job_status_serializes_lowercase() {
        let job = Job::pending("abc");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json["finished_at"].is_null());
    }

    #[test]
    fn test_indexing_method_parse() {
        assert_eq!(
            "standard".parse::<IndexingMethod>().unwrap(),
            IndexingMethod::Standard
        );
        assert_eq!("FAST".parse::<IndexingMethod>().unwrap(), IndexingMethod::Fast);
        assert!("graph".parse::<IndexingMethod>().is_err());
    }

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<_> = StageKind::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "ingestion",
                "text_units",
                "extract_graph",
                "extract_claims",
                "detect_communities",
                "community_reports",
                "embeddings",
                "persistence",
            ]
        );
        assert!(StageKind::ExtractClaims.is_optional());
        assert!(!StageKind::Persistence.is_optional());
    }
}
