//! Resolver and discovery configuration.
//!
//! Configuration is read from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LLM_MODE` | `ollama` | Initial mode (`ollama` or `custom`) |
//! | `LLM_BASE_URL` | unset | Initial manual override |
//! | `LLM_MODEL_NAME` | unset | Initial model |
//! | `OLLAMA_HOST` | unset | Environment-declared Ollama host |
//! | `LLM_PROBE_TIMEOUT_MS` | `1500` | Timeout for each discovery probe |
//! | `LLM_REQUEST_TIMEOUT_SECS` | `120` | Timeout for each LLM request |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use graphkb_core::defaults;
use graphkb_core::{Error, LlmMode, Result};

/// Where auto-discovery looks, in order, and how long each probe may take.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Raw `OLLAMA_HOST` value.
    pub env_host: Option<String>,
    /// systemd unit files inspected for an `OLLAMA_HOST` binding.
    pub service_files: Vec<PathBuf>,
    /// Fixed addresses tried last, in order.
    pub candidates: Vec<String>,
    pub probe_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            env_host: None,
            service_files: default_service_files(),
            candidates: defaults::OLLAMA_CANDIDATES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            probe_timeout: Duration::from_millis(defaults::PROBE_TIMEOUT_MS),
        }
    }
}

impl DiscoveryConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        let probe_timeout_ms = env::var("LLM_PROBE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::PROBE_TIMEOUT_MS);

        Self {
            env_host: env::var("OLLAMA_HOST").ok().filter(|v| !v.trim().is_empty()),
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            ..Self::default()
        }
    }

    /// Config that never probes anything; useful as a base for tests.
    pub fn empty() -> Self {
        Self {
            env_host: None,
            service_files: Vec::new(),
            candidates: Vec::new(),
            probe_timeout: Duration::from_millis(defaults::PROBE_TIMEOUT_MS),
        }
    }

    pub fn with_env_host(mut self, host: impl Into<String>) -> Self {
        self.env_host = Some(host.into());
        self
    }

    pub fn with_service_files(mut self, files: Vec<PathBuf>) -> Self {
        self.service_files = files;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

fn default_service_files() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = defaults::OLLAMA_SERVICE_FILES
        .iter()
        .map(PathBuf::from)
        .collect();
    if let Ok(home) = env::var("HOME") {
        files.push(PathBuf::from(home).join(defaults::OLLAMA_USER_SERVICE_FILE));
    }
    files
}

/// Initial state and timeouts for the LLM configuration resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub mode: LlmMode,
    /// Manual override in effect at startup.
    pub base_url: Option<String>,
    pub model_name: Option<String>,
    pub request_timeout: Duration,
    pub discovery: DiscoveryConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: LlmMode::Ollama,
            base_url: None,
            model_name: None,
            request_timeout: Duration::from_secs(defaults::LLM_REQUEST_TIMEOUT_SECS),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// An unrecognized `LLM_MODE` falls back to `ollama` with a warning; an
    /// unusable `LLM_BASE_URL` is ignored with a warning.
    pub fn from_env() -> Self {
        let mode = match env::var("LLM_MODE") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Ignoring invalid LLM_MODE, using ollama");
                LlmMode::Ollama
            }),
            Err(_) => LlmMode::Ollama,
        };

        let base_url = env::var("LLM_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .and_then(|raw| match normalize_base_url(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Ignoring invalid LLM_BASE_URL");
                    None
                }
            });

        let request_timeout_secs = env::var("LLM_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::LLM_REQUEST_TIMEOUT_SECS);

        Self {
            mode,
            base_url,
            model_name: env::var("LLM_MODEL_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            request_timeout: Duration::from_secs(request_timeout_secs),
            discovery: DiscoveryConfig::from_env(),
        }
    }

    pub fn with_mode(mut self, mode: LlmMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the startup override, normalized like `LLM_BASE_URL`; an unusable
    /// value is ignored with a warning.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let raw = base_url.into();
        match normalize_base_url(&raw) {
            Ok(url) => self.base_url = Some(url),
            Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid base_url"),
        }
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }
}

/// Validate a user-supplied endpoint URL and strip trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Configuration("base_url cannot be empty".to_string()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(Error::Configuration(format!(
            "base_url must start with http:// or https://, got: {}",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Turn an `OLLAMA_HOST`-style value into a dialable URL.
///
/// Accepts a full URL, `host`, or `host:port`. The wildcard bind address
/// `0.0.0.0` is dialled as loopback; a missing port defaults to 11434.
pub fn host_to_url(raw: &str) -> Option<String> {
    let value = raw.trim().trim_matches('"').trim_end_matches('/');
    if value.is_empty() {
        return None;
    }

    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.replace("://0.0.0.0", "://127.0.0.1"));
    }

    let (host, port) = match value.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (host, port.parse::<u16>().ok()?)
        }
        _ => (value, defaults::OLLAMA_PORT),
    };

    let host = match host {
        "" | "0.0.0.0" => "127.0.0.1",
        other => other,
    };

    Some(format!("http://{}:{}", host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://gpu-box:8080/").unwrap(),
            "http://gpu-box:8080"
        );
    }

    #[test]
    fn test_normalize_base_url_rejects_missing_scheme() {
        let err = normalize_base_url("gpu-box:8080").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_normalize_base_url_rejects_empty() {
        assert!(normalize_base_url("   ").is_err());
    }

    #[test]
    fn test_host_to_url_bare_host_gets_default_port() {
        assert_eq!(
            host_to_url("gpu-box").as_deref(),
            Some("http://gpu-box:11434")
        );
    }

    #[test]
    fn test_host_to_url_host_and_port() {
        assert_eq!(
            host_to_url("10.0.0.5:9999").as_deref(),
            Some("http://10.0.0.5:9999")
        );
    }

    #[test]
    fn test_host_to_url_wildcard_dials_loopback() {
        assert_eq!(
            host_to_url("0.0.0.0:11434").as_deref(),
            Some("http://127.0.0.1:11434")
        );
        assert_eq!(
            host_to_url("http://0.0.0.0:11434/").as_deref(),
            Some("http://127.0.0.1:11434")
        );
    }

    #[test]
    fn test_host_to_url_full_url_kept() {
        assert_eq!(
            host_to_url("https://ollama.internal").as_deref(),
            Some("https://ollama.internal")
        );
    }

    #[test]
    fn test_host_to_url_empty() {
        assert!(host_to_url("  ").is_none());
    }

    #[test]
    fn test_discovery_config_empty_has_no_probes() {
        let cfg = DiscoveryConfig::empty();
        assert!(cfg.env_host.is_none());
        assert!(cfg.service_files.is_empty());
        assert!(cfg.candidates.is_empty());
    }

    #[test]
    fn test_discovery_config_default_candidates_order() {
        let cfg = DiscoveryConfig::default();
        assert_eq!(
            cfg.candidates,
            vec![
                "http://127.0.0.1:11434".to_string(),
                "http://localhost:11434".to_string()
            ]
        );
    }

    #[test]
    fn test_resolver_config_builder() {
        let cfg = ResolverConfig::default()
            .with_mode(LlmMode::Custom)
            .with_base_url("http://x:1")
            .with_model_name("m")
            .with_request_timeout(Duration::from_secs(5));
        assert_eq!(cfg.mode, LlmMode::Custom);
        assert_eq!(cfg.base_url.as_deref(), Some("http://x:1"));
        assert_eq!(cfg.model_name.as_deref(), Some("m"));
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_resolver_config_builder_normalizes_base_url() {
        let cfg = ResolverConfig::default().with_base_url(" http://x:1/ ");
        assert_eq!(cfg.base_url.as_deref(), Some("http://x:1"));

        let cfg = cfg.with_base_url("x:1");
        assert_eq!(cfg.base_url.as_deref(), Some("http://x:1"));
    }
}
