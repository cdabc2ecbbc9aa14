//! Ollama endpoint auto-discovery.
//!
//! Discovery is an ordered list of [`EndpointProbe`]s. Each probe either
//! proposes a candidate URL or reports nothing; every proposal is then
//! confirmed with a version check, and the first confirmed candidate wins.
//!
//! Order:
//! 1. `OLLAMA_HOST` environment variable
//! 2. systemd unit files declaring `Environment="OLLAMA_HOST=..."`
//! 3. fixed loopback candidates (`127.0.0.1`, then `localhost`)
//!
//! The manual override is not a probe here; the resolver checks it before
//! discovery is ever consulted.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, warn};

use graphkb_core::{DiscoverySource, Error, Result};

use crate::config::{host_to_url, DiscoveryConfig};
use crate::ollama::OllamaClient;

/// Result of running a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found(String),
    NotFound,
}

/// One step of the discovery order.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Which source a successful candidate is attributed to.
    fn source(&self) -> DiscoverySource;

    /// Propose a candidate URL, without contacting it.
    async fn locate(&self) -> ProbeOutcome;
}

/// Candidate taken from the `OLLAMA_HOST` value.
pub struct EnvHostProbe {
    host: Option<String>,
}

impl EnvHostProbe {
    pub fn new(host: Option<String>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl EndpointProbe for EnvHostProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Environment
    }

    async fn locate(&self) -> ProbeOutcome {
        match self.host.as_deref().and_then(host_to_url) {
            Some(url) => ProbeOutcome::Found(url),
            None => ProbeOutcome::NotFound,
        }
    }
}

/// Candidate read from the first systemd unit file that binds `OLLAMA_HOST`.
pub struct ServiceFileProbe {
    files: Vec<PathBuf>,
}

impl ServiceFileProbe {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

fn service_host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?m)^\s*Environment\s*=.*?OLLAMA_HOST=([^"\s]+)"#)
            .expect("service file pattern is a valid regex")
    })
}

/// Extract the `OLLAMA_HOST` value from the contents of a unit file.
pub fn parse_service_host(contents: &str) -> Option<String> {
    service_host_pattern()
        .captures(contents)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl EndpointProbe for ServiceFileProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::ServiceFile
    }

    async fn locate(&self) -> ProbeOutcome {
        for file in &self.files {
            let contents = match tokio::fs::read_to_string(file).await {
                Ok(contents) => contents,
                Err(e) => {
                    debug!(path = %file.display(), error = %e, "Service file not readable");
                    continue;
                }
            };
            if let Some(url) = parse_service_host(&contents).as_deref().and_then(host_to_url) {
                debug!(path = %file.display(), url = %url, "Service file declares OLLAMA_HOST");
                return ProbeOutcome::Found(url);
            }
        }
        ProbeOutcome::NotFound
    }
}

/// A fixed address that is always proposed.
pub struct FixedCandidateProbe {
    url: String,
}

impl FixedCandidateProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl EndpointProbe for FixedCandidateProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Candidate
    }

    async fn locate(&self) -> ProbeOutcome {
        ProbeOutcome::Found(self.url.clone())
    }
}

/// A confirmed Ollama endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub base_url: String,
    pub source: DiscoverySource,
    pub version: String,
}

/// Runs the probes in order and confirms candidates.
pub struct Discovery {
    probes: Vec<Box<dyn EndpointProbe>>,
    http: Client,
    probe_timeout: Duration,
}

impl Discovery {
    pub fn new(probes: Vec<Box<dyn EndpointProbe>>, http: Client, probe_timeout: Duration) -> Self {
        Self {
            probes,
            http,
            probe_timeout,
        }
    }

    /// Build the standard probe order from configuration.
    pub fn from_config(config: &DiscoveryConfig, http: Client) -> Self {
        let mut probes: Vec<Box<dyn EndpointProbe>> = vec![
            Box::new(EnvHostProbe::new(config.env_host.clone())),
            Box::new(ServiceFileProbe::new(config.service_files.clone())),
        ];
        for candidate in &config.candidates {
            probes.push(Box::new(FixedCandidateProbe::new(candidate.clone())));
        }
        Self::new(probes, http, config.probe_timeout)
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Find the first candidate that passes the version check.
    ///
    /// Returns `Connectivity` listing what was tried when nothing answers.
    pub async fn discover(&self) -> Result<Discovered> {
        let mut tried: Vec<String> = Vec::new();

        for probe in &self.probes {
            let url = match probe.locate().await {
                ProbeOutcome::Found(url) => url,
                ProbeOutcome::NotFound => {
                    debug!(source = %probe.source(), "Probe found no candidate");
                    continue;
                }
            };

            if tried.contains(&url) {
                continue;
            }

            match OllamaClient::version_check(&self.http, &url, self.probe_timeout).await {
                Ok(version) => {
                    info!(
                        base_url = %url,
                        source = %probe.source(),
                        version = %version,
                        "Discovered Ollama endpoint"
                    );
                    return Ok(Discovered {
                        base_url: url,
                        source: probe.source(),
                        version,
                    });
                }
                Err(e) => {
                    debug!(base_url = %url, source = %probe.source(), error = %e, "Candidate rejected");
                    tried.push(url);
                }
            }
        }

        warn!(tried = tried.len(), "No Ollama endpoint discovered");
        Err(Error::Connectivity(if tried.is_empty() {
            "No Ollama endpoint discovered: no candidates".to_string()
        } else {
            format!("No Ollama endpoint discovered (tried {})", tried.join(", "))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn ollama_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.6.0"})))
            .mount(&server)
            .await;
        server
    }

    fn unit_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_service_host_quoted() {
        let unit = "[Service]\nExecStart=/usr/bin/ollama serve\nEnvironment=\"OLLAMA_HOST=0.0.0.0:11434\"\n";
        assert_eq!(parse_service_host(unit).as_deref(), Some("0.0.0.0:11434"));
    }

    #[test]
    fn test_parse_service_host_among_other_vars() {
        let unit = "[Service]\nEnvironment=\"PATH=/usr/bin\" \"OLLAMA_HOST=10.1.1.1\"\n";
        assert_eq!(parse_service_host(unit).as_deref(), Some("10.1.1.1"));
    }

    #[test]
    fn test_parse_service_host_absent() {
        assert!(parse_service_host("[Service]\nExecStart=/usr/bin/ollama serve\n").is_none());
    }

    #[tokio::test]
    async fn test_env_probe_normalizes_host() {
        let probe = EnvHostProbe::new(Some("gpu-box".to_string()));
        assert_eq!(
            probe.locate().await,
            ProbeOutcome::Found("http://gpu-box:11434".to_string())
        );
        assert_eq!(EnvHostProbe::new(None).locate().await, ProbeOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_service_probe_skips_missing_files() {
        let unit = unit_file("Environment=\"OLLAMA_HOST=127.0.0.1:9999\"\n");
        let probe = ServiceFileProbe::new(vec![
            PathBuf::from("/nonexistent/ollama.service"),
            unit.path().to_path_buf(),
        ]);
        assert_eq!(
            probe.locate().await,
            ProbeOutcome::Found("http://127.0.0.1:9999".to_string())
        );
    }

    #[tokio::test]
    async fn test_discover_prefers_environment() {
        let env_server = ollama_server().await;
        let candidate_server = ollama_server().await;

        let config = DiscoveryConfig::empty()
            .with_env_host(env_server.uri())
            .with_candidates(vec![candidate_server.uri()]);
        let found = Discovery::from_config(&config, Client::new())
            .discover()
            .await
            .unwrap();

        assert_eq!(found.base_url, env_server.uri());
        assert_eq!(found.source, DiscoverySource::Environment);
        assert_eq!(found.version, "0.6.0");
    }

    #[tokio::test]
    async fn test_discover_falls_through_to_service_file() {
        let server = ollama_server().await;
        let unit = unit_file(&format!("Environment=\"OLLAMA_HOST={}\"\n", server.uri()));

        let config = DiscoveryConfig::empty()
            .with_env_host("http://127.0.0.1:1")
            .with_service_files(vec![unit.path().to_path_buf()])
            .with_probe_timeout(Duration::from_millis(300));
        let found = Discovery::from_config(&config, Client::new())
            .discover()
            .await
            .unwrap();

        assert_eq!(found.source, DiscoverySource::ServiceFile);
        assert_eq!(found.base_url, server.uri());
    }

    #[tokio::test]
    async fn test_discover_candidates_in_order() {
        let second = ollama_server().await;
        let config = DiscoveryConfig::empty()
            .with_candidates(vec!["http://127.0.0.1:1".to_string(), second.uri()])
            .with_probe_timeout(Duration::from_millis(300));

        let found = Discovery::from_config(&config, Client::new())
            .discover()
            .await
            .unwrap();
        assert_eq!(found.source, DiscoverySource::Candidate);
        assert_eq!(found.base_url, second.uri());
    }

    #[tokio::test]
    async fn test_discover_rejects_non_ollama_responder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let config = DiscoveryConfig::empty().with_candidates(vec![server.uri()]);
        let err = Discovery::from_config(&config, Client::new())
            .discover()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_discover_nothing_configured() {
        let err = Discovery::from_config(&DiscoveryConfig::empty(), Client::new())
            .discover()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }
}
