//! Client for a user-provided HTTP LLM endpoint.
//!
//! The endpoint exposes `POST /chat`, `POST /complete` and `POST /embed`.
//! Chat and completion answer with `{"content": ...}`; embedding answers with
//! `{"embeddings": [[...], ...]}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

use graphkb_core::{ChatMessage, Error, LlmClient, Result};

pub struct CustomClient {
    http: Client,
    base_url: String,
    model: Option<String>,
    timeout: Duration,
}

impl CustomClient {
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

    /// Check that something answers at `base_url`.
    ///
    /// Any response below 500 counts as reachable: custom endpoints are not
    /// required to serve their root path.
    pub async fn reachability_check(http: &Client, base_url: &str, timeout: Duration) -> Result<()> {
        let response = http
            .get(base_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("{} unreachable: {}", base_url, e)))?;

        if response.status().is_server_error() {
            return Err(Error::Connectivity(format!(
                "{} returned {}",
                base_url,
                response.status()
            )));
        }
        debug!(base_url, status = %response.status(), "Custom endpoint reachable");
        Ok(())
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
                "Custom endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    params: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    prompt: &'a str,
    params: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl LlmClient for CustomClient {
    #[instrument(skip(self, messages), fields(subsystem = "inference", component = "custom", op = "chat", message_count = messages.len()))]
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let result: ContentResponse = self
            .post(
                "/chat",
                &ChatRequest {
                    messages,
                    params: JsonValue::Object(Map::new()),
                    model: self.model.as_deref(),
                },
            )
            .await?;
        Ok(result.content)
    }

    #[instrument(skip(self, prompt), fields(subsystem = "inference", component = "custom", op = "complete", prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let result: ContentResponse = self
            .post(
                "/complete",
                &CompleteRequest {
                    prompt,
                    params: JsonValue::Object(Map::new()),
                    model: self.model.as_deref(),
                },
            )
            .await?;
        Ok(result.content)
    }

    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "custom", op = "embed", input_count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let result: EmbedResponse = self
            .post(
                "/embed",
                &EmbedRequest {
                    input: texts,
                    model: self.model.as_deref(),
                },
            )
            .await?;

        if result.embeddings.len() != texts.len() {
            return Err(Error::Connectivity(format!(
                "Custom endpoint returned {} embeddings for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }
        Ok(result.embeddings)
    }

    fn model_name(&self) -> Option<&str> {
        self.model.as_deref()
    }
}
