//! Structured logging field names for graphkb.
//!
//! Every crate logs with these field names so log aggregation can query the
//! same keys across subsystems. `tracing` macros need literal keys, so the
//! constants document the contract rather than being spliced into call sites.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Job failed, or the service is degraded |
//! | WARN  | Recoverable issue: failed probe, skipped input file, slow operation |
//! | INFO  | Lifecycle events and operation completions |
//! | DEBUG | Decision points: which probe answered, per-unit extraction results |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID of the HTTP request (UUIDv7).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "inference", "jobs", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "resolver", "discovery", "executor", "manager"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "resolve", "configure", "execute", "create_job"
pub const OPERATION: &str = "op";

// ─── Pipeline fields ───────────────────────────────────────────────────────

/// Job id being processed.
pub const JOB_ID: &str = "job_id";

/// Stage name (see `StageKind::name`).
pub const STAGE: &str = "stage";

/// Job progress in `0.0..=1.0`.
pub const PROGRESS: &str = "progress";

/// Artifact collection written by a store.
pub const COLLECTION: &str = "collection";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Resolved LLM endpoint.
pub const BASE_URL: &str = "base_url";

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Discovery probe that produced the endpoint.
pub const SOURCE: &str = "source";

// ─── Measurement and outcome fields ───────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// All field names above.
pub const ALL_FIELDS: [&str; 13] = [
    REQUEST_ID,
    SUBSYSTEM,
    COMPONENT,
    OPERATION,
    JOB_ID,
    STAGE,
    PROGRESS,
    COLLECTION,
    BASE_URL,
    MODEL,
    SOURCE,
    DURATION_MS,
    ERROR_MSG,
];
