//! Centralized default constants for graphkb.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 7777;

/// Default CORS origin (dashboard dev server).
pub const ALLOWED_ORIGINS: &str = "http://localhost:5173";

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Root directory that bounds accepted `input_path` values.
pub const INPUT_ROOT: &str = "./data/input";

/// Root directory for graph and vector artifacts.
pub const OUTPUT_DIR: &str = "./data/output";

// =============================================================================
// INFERENCE
// =============================================================================

/// Port Ollama listens on unless told otherwise.
pub const OLLAMA_PORT: u16 = 11434;

/// Fixed candidate addresses tried after the environment and service-file probes.
pub const OLLAMA_CANDIDATES: [&str; 2] = ["http://127.0.0.1:11434", "http://localhost:11434"];

/// systemd unit files inspected for an Ollama bind address.
pub const OLLAMA_SERVICE_FILES: [&str; 2] = [
    "/etc/systemd/system/ollama.service",
    "/lib/systemd/system/ollama.service",
];

/// Per-user systemd unit, relative to `$HOME`.
pub const OLLAMA_USER_SERVICE_FILE: &str = ".config/systemd/user/ollama.service";

/// Timeout for a single discovery/validation probe in milliseconds.
pub const PROBE_TIMEOUT_MS: u64 = 1500;

/// Timeout for a single LLM request (chat, completion, embedding) in seconds.
pub const LLM_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Timeout for listing models in seconds.
pub const LIST_MODELS_TIMEOUT_SECS: u64 = 10;

/// Texts per embedding request.
pub const EMBED_BATCH_SIZE: usize = 32;

// =============================================================================
// PIPELINE
// =============================================================================

/// Maximum characters per text unit.
pub const CHUNK_SIZE: usize = 1200;

/// Overlap characters between adjacent text units.
pub const CHUNK_OVERLAP: usize = 100;

/// Upper bound for a single stage's wall-clock time in seconds.
pub const STAGE_TIMEOUT_SECS: u64 = 1800;

/// Maximum concurrently running pipelines (0 = unbounded).
pub const PIPELINE_MAX_CONCURRENT: usize = 0;

/// Whether the claims stage is scheduled by default.
pub const EXTRACT_CLAIMS: bool = true;

/// Label propagation iteration cap for community detection.
pub const COMMUNITY_MAX_ITERATIONS: usize = 20;

/// File extensions read by the ingestion stage.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["txt", "md", "markdown", "pdf", "docx"];

/// Timeout for one external converter call (`pdftotext`, `pandoc`) in seconds.
pub const CONVERTER_TIMEOUT_SECS: u64 = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_prefer_ip_literal() {
        assert!(OLLAMA_CANDIDATES[0].contains("127.0.0.1"));
        assert!(OLLAMA_CANDIDATES[1].contains("localhost"));
    }

    #[test]
    fn test_chunk_overlap_smaller_than_chunk() {
        assert!(CHUNK_OVERLAP < CHUNK_SIZE);
    }

    #[test]
    fn test_converter_timeout_within_stage_timeout() {
        assert!(CONVERTER_TIMEOUT_SECS < STAGE_TIMEOUT_SECS);
    }

    #[test]
    fn test_candidates_use_ollama_port() {
        for candidate in OLLAMA_CANDIDATES {
            assert!(candidate.ends_with(&OLLAMA_PORT.to_string()));
        }
    }
}
