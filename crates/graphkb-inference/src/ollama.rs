//! Ollama client and endpoint probes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use graphkb_core::{ChatMessage, Error, LlmClient, Result};

/// Client for a validated Ollama endpoint.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: Option<String>,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(http: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: None,
            timeout,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn require_model(&self) -> Result<&str> {
        self.model.as_deref().ok_or_else(|| {
            Error::Configuration("Ollama mode requires model_name to be set".to_string())
        })
    }

    /// Confirm `base_url` answers like an Ollama server.
    ///
    /// `GET /api/version` must succeed and carry a `version` string, which is
    /// returned.
    pub async fn version_check(http: &Client, base_url: &str, timeout: Duration) -> Result<String> {
        let response = http
            .get(format!("{}/api/version", base_url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("{} unreachable: {}", base_url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Connectivity(format!(
                "{} returned {} for /api/version",
                base_url,
                response.status()
            )));
        }

        let body: VersionResponse = response.json().await.map_err(|e| {
            Error::Connectivity(format!("{} is not an Ollama server: {}", base_url, e))
        })?;

        Ok(body.version)
    }

    /// Names of the models installed on the server.
    pub async fn list_models(http: &Client, base_url: &str, timeout: Duration) -> Result<Vec<String>> {
        let response = http
            .get(format!("{}/api/tags", base_url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("Failed to list models: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Connectivity(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse model list: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn post<T, R>(&self, path: &str, body: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Connectivity(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
    }
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl LlmClient for OllamaClient {
    #[instrument(skip(self, messages), fields(subsystem = "inference", component = "ollama", op = "chat", message_count = messages.len()))]
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let model = self.require_model()?;
        let start = Instant::now();

        let result: ChatResponse = self
            .post(
                "/api/chat",
                &ChatRequest {
                    model,
                    messages,
                    stream: false,
                },
            )
            .await?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = result.message.content.len(),
            duration_ms = elapsed,
            "Chat complete"
        );
        if elapsed > 30000 {
            warn!(duration_ms = elapsed, slow = true, "Slow chat operation");
        }
        Ok(result.message.content)
    }

    #[instrument(skip(self, prompt), fields(subsystem = "inference", component = "ollama", op = "complete", prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let model = self.require_model()?;
        let result: GenerateResponse = self
            .post(
                "/api/generate",
                &GenerateRequest {
                    model,
                    prompt,
                    stream: false,
                },
            )
            .await?;
        Ok(result.response)
    }

    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed", input_count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let model = self.require_model()?;
        let start = Instant::now();

        let result: EmbedResponse = self
            .post("/api/embed", &EmbedRequest { model, input: texts })
            .await?;

        if result.embeddings.len() != texts.len() {
            return Err(Error::Connectivity(format!(
                "Ollama returned {} embeddings for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            result_count = result.embeddings.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > 5000 {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(result.embeddings)
    }

    fn model_name(&self) -> Option<&str> {
        self.model.as_deref()
    }
}
