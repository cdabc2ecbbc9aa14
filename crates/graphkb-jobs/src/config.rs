//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use graphkb_core::defaults;

/// Configuration for job execution.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory that bounds acceptable `input_path` values.
    pub input_root: PathBuf,
    /// Root for graph and vector artifacts.
    pub output_dir: PathBuf,
    /// Upper bound for a single stage.
    pub stage_timeout: Duration,
    /// Whether the claims stage is scheduled when a request doesn't say.
    pub extract_claims: bool,
    /// Maximum concurrently running pipelines; 0 means unbounded.
    pub max_concurrent: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Upper bound for one `pdftotext` or `pandoc` call during ingestion.
    pub converter_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from(defaults::INPUT_ROOT),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            stage_timeout: Duration::from_secs(defaults::STAGE_TIMEOUT_SECS),
            extract_claims: defaults::EXTRACT_CLAIMS,
            max_concurrent: defaults::PIPELINE_MAX_CONCURRENT,
            chunk_size: defaults::CHUNK_SIZE,
            chunk_overlap: defaults::CHUNK_OVERLAP,
            converter_timeout: Duration::from_secs(defaults::CONVERTER_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `INPUT_ROOT` | `./data/input` | Directory bounding `input_path` |
    /// | `OUTPUT_DIR` | `./data/output` | Artifact output directory |
    /// | `PIPELINE_STAGE_TIMEOUT_SECS` | `1800` | Per-stage timeout |
    /// | `PIPELINE_EXTRACT_CLAIMS` | `true` | Run the claims stage by default |
    /// | `PIPELINE_MAX_CONCURRENT` | `0` | Concurrent pipelines (0 = unbounded) |
    /// | `PIPELINE_CHUNK_SIZE` | `1200` | Characters per text unit |
    /// | `PIPELINE_CHUNK_OVERLAP` | `100` | Overlap between text units |
    /// | `PIPELINE_CONVERTER_TIMEOUT_SECS` | `120` | Per-call PDF/DOCX converter timeout |
    pub fn from_env() -> Self {
        let input_root = std::env::var("INPUT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::INPUT_ROOT));

        let output_dir = std::env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::OUTPUT_DIR));

        let stage_timeout_secs = std::env::var("PIPELINE_STAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::STAGE_TIMEOUT_SECS);

        let extract_claims = std::env::var("PIPELINE_EXTRACT_CLAIMS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(defaults::EXTRACT_CLAIMS);

        let max_concurrent = std::env::var("PIPELINE_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::PIPELINE_MAX_CONCURRENT);

        let chunk_size = std::env::var("PIPELINE_CHUNK_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::CHUNK_SIZE)
            .max(1);

        let chunk_overlap = std::env::var("PIPELINE_CHUNK_OVERLAP")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::CHUNK_OVERLAP);

        let converter_timeout_secs = std::env::var("PIPELINE_CONVERTER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::CONVERTER_TIMEOUT_SECS);

        Self {
            input_root,
            output_dir,
            stage_timeout: Duration::from_secs(stage_timeout_secs),
            extract_claims,
            max_concurrent,
            chunk_size,
            chunk_overlap,
            converter_timeout: Duration::from_secs(converter_timeout_secs),
        }
    }

    pub fn with_input_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.input_root = root.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_extract_claims(mut self, enabled: bool) -> Self {
        self.extract_claims = enabled;
        self
    }

    /// Set maximum concurrent pipelines (0 = unbounded).
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size.max(1);
        self.chunk_overlap = overlap;
        self
    }

    pub fn with_converter_timeout(mut self, timeout: Duration) -> Self {
        self.converter_timeout = timeout;
        self
    }

    /// Converter timeout, never longer than a whole stage.
    pub fn effective_converter_timeout(&self) -> Duration {
        self.converter_timeout.min(self.stage_timeout)
    }
}
