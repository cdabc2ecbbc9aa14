//! HTTP server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use graphkb_core::{defaults, Error, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` allows any origin.
    pub allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            allowed_origins: defaults::ALLOWED_ORIGINS.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `HOST` | `0.0.0.0` | Bind host |
    /// | `PORT` | `7777` | Bind port |
    /// | `ALLOWED_ORIGINS` | `http://localhost:5173` | Comma-separated CORS origins (`*` = any) |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| defaults::SERVER_HOST.to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults::SERVER_PORT);
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| defaults::ALLOWED_ORIGINS.to_string());

        Self {
            host,
            port,
            allowed_origins,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_allowed_origins(mut self, origins: impl Into<String>) -> Self {
        self.allowed_origins = origins.into();
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid bind address: {}", e)))
    }

    /// CORS layer for the configured origins.
    pub fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .max_age(Duration::from_secs(defaults::CORS_MAX_AGE_SECS));

        if self.allowed_origins.trim() == "*" {
            layer.allow_origin(Any)
        } else {
            layer.allow_origin(AllowOrigin::list(parse_allowed_origins(
                &self.allowed_origins,
            )))
        }
    }
}

/// Parse a comma-separated origin list, dropping invalid entries.
///
/// An empty list falls back to the default dashboard origin.
pub fn parse_allowed_origins(raw: &str) -> Vec<HeaderValue> {
    let origins: Vec<HeaderValue> = raw
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if origins.is_empty() {
        return vec![HeaderValue::from_static(defaults::ALLOWED_ORIGINS)];
    }
    origins
}
