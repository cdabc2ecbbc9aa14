//! graphkb-api - HTTP API server for graphkb

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graphkb_api::{router, AppState, ServerConfig};
use graphkb_inference::LlmConfigResolver;
use graphkb_jobs::{JobManager, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "graphkb_api=debug,graphkb_jobs=debug,graphkb_inference=debug,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("graphkb-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let server_config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    info!(
        input_root = %pipeline_config.input_root.display(),
        output_dir = %pipeline_config.output_dir.display(),
        stage_timeout_secs = pipeline_config.stage_timeout.as_secs(),
        max_concurrent = pipeline_config.max_concurrent,
        converter_timeout_secs = pipeline_config.effective_converter_timeout().as_secs(),
        "Pipeline configured"
    );

    let resolver = Arc::new(LlmConfigResolver::from_env());
    let jobs = Arc::new(JobManager::new(pipeline_config, resolver.clone()));

    // Initial resolution runs in the background; startup never waits on probes.
    {
        let resolver = resolver.clone();
        tokio::spawn(async move {
            let config = resolver.resolve().await;
            if config.client_initialized {
                info!(
                    mode = %config.mode,
                    base_url = config.base_url.as_deref().unwrap_or_default(),
                    "Initial LLM resolution succeeded"
                );
            } else {
                warn!(
                    mode = %config.mode,
                    error = config.last_error.as_deref().unwrap_or("unknown"),
                    "No usable LLM endpoint at startup"
                );
            }
        });
    }

    let app = router(AppState::new(resolver, jobs)).layer(server_config.cors_layer());

    let addr = server_config.socket_addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
