//! Ingestion: read supported files under the input path into documents.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use graphkb_core::defaults::SUPPORTED_EXTENSIONS;
use graphkb_core::{Document, Error, PipelineArtifacts, Result, StageKind};

use super::readers::{extract_text, DocumentFormat};
use super::{stable_id, PipelineStage, StageContext};

pub struct IngestionStage;

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Human-readable title from a file name: `quarterly_report-v2.md` -> `quarterly report v2`.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .replace(['_', '-'], " ")
        .trim()
        .to_string()
}

/// Supported files under `root` (or `root` itself), sorted for stable order.
fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let supported = is_supported(path);
            if !supported {
                debug!(path = %path.display(), "Skipping unsupported file");
            }
            supported
        })
        .collect();
    files.sort();
    files
}

/// Read one file; failures are logged and skipped so a single bad file
/// never fails the job.
async fn read_document(path: &Path, converter_timeout: Duration) -> Option<Document> {
    let format = DocumentFormat::from_path(path)?;
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable file");
            return None;
        }
    };

    let text = match extract_text(path, &bytes, format, converter_timeout).await {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), format = %format, error = %e, "Skipping unreadable file");
            return None;
        }
    };
    if text.trim().is_empty() {
        warn!(path = %path.display(), "Skipping empty file");
        return None;
    }

    let creation_date = tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from);

    let uri = path.display().to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    Some(Document {
        id: stable_id(&["document", &uri]),
        title: title_from_path(path),
        metadata: json!({ "ext": ext, "size_bytes": bytes.len() }),
        uri,
        text,
        creation_date,
    })
}

#[async_trait]
impl PipelineStage for IngestionStage {
    fn kind(&self) -> StageKind {
        StageKind::Ingestion
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        let root = ctx.input_path.clone();
        let files = tokio::task::spawn_blocking(move || collect_files(&root))
            .await
            .map_err(|e| Error::Internal(format!("File walk panicked: {}", e)))?;

        let mut documents = Vec::with_capacity(files.len());
        for path in &files {
            if let Some(document) = read_document(path, ctx.converter_timeout).await {
                documents.push(document);
            }
        }

        if documents.is_empty() {
            return Err(Error::Validation(format!(
                "no supported documents found in {}",
                ctx.input_path.display()
            )));
        }

        info!(
            job_id = %ctx.job_id,
            documents = documents.len(),
            scanned = files.len(),
            "Documents loaded"
        );
        let message = format!("Loaded {} documents", documents.len());
        artifacts.documents = documents;
        Ok(message)
    }
}
