//! Process-wide LLM configuration.
//!
//! [`LlmConfigResolver`] owns the single active [`LlmConfig`] together with
//! the client built for it. Reads take a short read lock on the snapshot and
//! never wait on probes: `configure` and `resolve` perform all network checks
//! before taking the write lock, then replace the whole snapshot at once.
//! Writers are serialized by a separate gate so merges never interleave.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use graphkb_core::defaults;
use graphkb_core::{
    ConfigureRequest, DiscoverySource, Error, LlmClient, LlmConfig, LlmMode, LlmProvider, Result,
};

use crate::config::{normalize_base_url, ResolverConfig};
use crate::custom::CustomClient;
use crate::discovery::Discovery;
use crate::ollama::OllamaClient;

struct ResolverState {
    config: LlmConfig,
    /// Manually supplied endpoint; wins over discovery until cleared.
    manual_override: Option<String>,
    client: Option<Arc<dyn LlmClient>>,
}

/// Outcome of validating one mode/endpoint/model combination.
struct Resolution {
    base_url: Option<String>,
    discovered_via: Option<DiscoverySource>,
    client: Option<Arc<dyn LlmClient>>,
    last_error: Option<String>,
}

pub struct LlmConfigResolver {
    state: RwLock<ResolverState>,
    configure_gate: Mutex<()>,
    discovery: Discovery,
    http: Client,
    request_timeout: Duration,
}

impl LlmConfigResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let http = Client::new();
        let discovery = Discovery::from_config(&config.discovery, http.clone());

        info!(
            mode = %config.mode,
            base_url = ?config.base_url,
            model = ?config.model_name,
            "Initializing LLM config resolver"
        );

        Self {
            state: RwLock::new(ResolverState {
                config: LlmConfig {
                    mode: config.mode,
                    base_url: config.base_url.clone(),
                    model_name: config.model_name,
                    client_initialized: false,
                    last_error: None,
                    discovered_via: config.base_url.as_ref().map(|_| DiscoverySource::Override),
                },
                manual_override: config.base_url,
                client: None,
            }),
            configure_gate: Mutex::new(()),
            discovery,
            http,
            request_timeout: config.request_timeout,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(ResolverConfig::from_env())
    }

    /// Current configuration snapshot. No side effects.
    pub async fn status(&self) -> LlmConfig {
        self.state.read().await.config.clone()
    }

    /// Re-validate the current configuration.
    ///
    /// Never fails: an unreachable endpoint is reported through
    /// `client_initialized = false` and `last_error`.
    pub async fn resolve(&self) -> LlmConfig {
        let _gate = self.configure_gate.lock().await;

        let (mode, manual_override, model_name) = {
            let state = self.state.read().await;
            (
                state.config.mode,
                state.manual_override.clone(),
                state.config.model_name.clone(),
            )
        };

        let resolution = self
            .validate(mode, manual_override.as_deref(), model_name.clone())
            .await;
        self.commit(mode, manual_override, model_name, resolution)
            .await
    }

    /// Merge a partial update onto the current configuration and re-validate.
    ///
    /// Absent fields keep their value; an empty `base_url` clears the manual
    /// override and an empty `model_name` clears the model. Invalid input
    /// leaves the configuration untouched. Reachability failures are not
    /// errors; they surface as `client_initialized = false`.
    pub async fn configure(&self, request: ConfigureRequest) -> Result<LlmConfig> {
        let _gate = self.configure_gate.lock().await;

        let (current_mode, current_override, current_model) = {
            let state = self.state.read().await;
            (
                state.config.mode,
                state.manual_override.clone(),
                state.config.model_name.clone(),
            )
        };

        let mode = match request.mode.as_deref() {
            Some(raw) => raw.parse::<LlmMode>()?,
            None => current_mode,
        };

        let manual_override = match request.base_url.as_deref() {
            None => current_override,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(normalize_base_url(raw)?),
        };

        let model_name = match request.model_name.as_deref() {
            None => current_model,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(raw.trim().to_string()),
        };

        if mode == LlmMode::Custom && manual_override.is_none() {
            return Err(Error::Configuration(
                "custom mode requires a base_url".to_string(),
            ));
        }

        let resolution = self
            .validate(mode, manual_override.as_deref(), model_name.clone())
            .await;
        let config = self
            .commit(mode, manual_override, model_name, resolution)
            .await;

        info!(
            mode = %config.mode,
            base_url = ?config.base_url,
            model = ?config.model_name,
            client_initialized = config.client_initialized,
            "LLM configuration updated"
        );
        Ok(config)
    }

    /// Models installed on the resolved Ollama endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let config = self.status().await;

        if config.mode != LlmMode::Ollama {
            return Err(Error::Configuration(
                "Model listing is only available in ollama mode".to_string(),
            ));
        }

        let base_url = config.base_url.ok_or_else(|| {
            Error::Connectivity(
                config
                    .last_error
                    .unwrap_or_else(|| "No Ollama endpoint resolved".to_string()),
            )
        })?;

        OllamaClient::list_models(
            &self.http,
            &base_url,
            Duration::from_secs(defaults::LIST_MODELS_TIMEOUT_SECS),
        )
        .await
    }

    async fn validate(
        &self,
        mode: LlmMode,
        manual_override: Option<&str>,
        model_name: Option<String>,
    ) -> Resolution {
        let probe_timeout = self.discovery.probe_timeout();

        match (mode, manual_override) {
            (LlmMode::Custom, None) => Resolution {
                base_url: None,
                discovered_via: None,
                client: None,
                last_error: Some("custom mode requires a base_url".to_string()),
            },
            (LlmMode::Custom, Some(url)) => {
                match CustomClient::reachability_check(&self.http, url, probe_timeout).await {
                    Ok(()) => Resolution {
                        base_url: Some(url.to_string()),
                        discovered_via: Some(DiscoverySource::Override),
                        client: Some(Arc::new(
                            CustomClient::new(self.http.clone(), url, self.request_timeout)
                                .with_model(model_name),
                        )),
                        last_error: None,
                    },
                    Err(e) => {
                        warn!(base_url = url, error = %e, "Custom endpoint unreachable");
                        Resolution {
                            base_url: Some(url.to_string()),
                            discovered_via: Some(DiscoverySource::Override),
                            client: None,
                            last_error: Some(e.to_string()),
                        }
                    }
                }
            }
            (LlmMode::Ollama, Some(url)) => {
                match OllamaClient::version_check(&self.http, url, probe_timeout).await {
                    Ok(version) => {
                        info!(base_url = url, version = %version, "Ollama override validated");
                        Resolution {
                            base_url: Some(url.to_string()),
                            discovered_via: Some(DiscoverySource::Override),
                            client: Some(self.ollama_client(url, model_name)),
                            last_error: None,
                        }
                    }
                    Err(e) => {
                        warn!(base_url = url, error = %e, "Ollama override failed validation");
                        Resolution {
                            base_url: Some(url.to_string()),
                            discovered_via: Some(DiscoverySource::Override),
                            client: None,
                            last_error: Some(e.to_string()),
                        }
                    }
                }
            }
            (LlmMode::Ollama, None) => match self.discovery.discover().await {
                Ok(found) => Resolution {
                    client: Some(self.ollama_client(&found.base_url, model_name)),
                    base_url: Some(found.base_url),
                    discovered_via: Some(found.source),
                    last_error: None,
                },
                Err(e) => Resolution {
                    base_url: None,
                    discovered_via: None,
                    client: None,
                    last_error: Some(e.to_string()),
                },
            },
        }
    }

    fn ollama_client(&self, base_url: &str, model_name: Option<String>) -> Arc<dyn LlmClient> {
        Arc::new(
            OllamaClient::new(self.http.clone(), base_url, self.request_timeout)
                .with_model(model_name),
        )
    }

    async fn commit(
        &self,
        mode: LlmMode,
        manual_override: Option<String>,
        model_name: Option<String>,
        resolution: Resolution,
    ) -> LlmConfig {
        let config = LlmConfig {
            mode,
            base_url: resolution.base_url,
            model_name,
            client_initialized: resolution.client.is_some(),
            last_error: resolution.last_error,
            discovered_via: resolution.discovered_via,
        };

        let mut state = self.state.write().await;
        *state = ResolverState {
            config: config.clone(),
            manual_override,
            client: resolution.client,
        };
        config
    }
}

#[async_trait]
impl LlmProvider for LlmConfigResolver {
    async fn active_client(&self) -> Result<Arc<dyn LlmClient>> {
        let state = self.state.read().await;

        let client = state.client.clone().ok_or_else(|| {
            Error::Connectivity(format!(
                "LLM client not initialized: {}",
                state
                    .config
                    .last_error
                    .as_deref()
                    .unwrap_or("no endpoint resolved")
            ))
        })?;

        if state.config.mode == LlmMode::Ollama && state.config.model_name.is_none() {
            return Err(Error::Configuration(
                "Ollama mode requires model_name to be set".to_string(),
            ));
        }

        Ok(client)
    }

    async fn current_config(&self) -> LlmConfig {
        self.status().await
    }
}
