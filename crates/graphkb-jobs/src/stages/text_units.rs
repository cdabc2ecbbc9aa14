//! Text-unit composition: split documents into overlapping chunks.

use async_trait::async_trait;
use tracing::info;

use graphkb_core::{PipelineArtifacts, Result, StageKind, TextUnit};

use super::{stable_id, PipelineStage, StageContext};

pub struct TextUnitsStage;

/// Split `text` into chunks of at most `size` characters, each starting
/// `size - overlap` characters after the previous one.
///
/// Works on `char`s, so multi-byte text is never cut mid-codepoint.
/// Whitespace-only chunks are dropped.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let step = if overlap >= size { size } else { size - overlap };
    let chars: Vec<char> = text.chars().collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[async_trait]
impl PipelineStage for TextUnitsStage {
    fn kind(&self) -> StageKind {
        StageKind::TextUnits
    }

    async fn run(&self, ctx: &StageContext, artifacts: &mut PipelineArtifacts) -> Result<String> {
        let mut text_units = Vec::new();
        for document in &artifacts.documents {
            for (order, text) in chunk_text(&document.text, ctx.chunk_size, ctx.chunk_overlap)
                .into_iter()
                .enumerate()
            {
                text_units.push(TextUnit {
                    id: stable_id(&[&document.id, &order.to_string()]),
                    document_id: document.id.clone(),
                    order,
                    text,
                });
            }
        }

        info!(
            job_id = %ctx.job_id,
            documents = artifacts.documents.len(),
            text_units = text_units.len(),
            "Text units composed"
        );
        let message = format!(
            "Composed {} text units from {} documents",
            text_units.len(),
            artifacts.documents.len()
        );
        artifacts.text_units = text_units;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests_support::context_for;
    use graphkb_core::Document;
    use serde_json::json;
    use std::path::Path;

    #[test]
    fn test_chunk_text_with_overlap() {
        let chunks = chunk_text("abcdefghij", 4, 1);
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_chunk_text_short_input_single_chunk() {
        assert_eq!(chunk_text("hello", 100, 10), vec!["hello"]);
    }

    #[test]
    fn test_chunk_text_multibyte_safe() {
        let chunks = chunk_text("héllo wörld ✓✓", 5, 0);
        assert_eq!(chunks, vec!["héllo", "wörl", "d ✓✓"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 5);
        }
    }

    #[test]
    fn test_chunk_text_overlap_not_smaller_than_size() {
        assert_eq!(chunk_text("abcdef", 3, 5), vec!["abc", "def"]);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("   ", 10, 2).is_empty());
    }

    #[tokio::test]
    async fn test_text_unit_ids_derive_from_document_and_order() {
        let mut ctx = context_for(Path::new("."));
        ctx.chunk_size = 5;
        ctx.chunk_overlap = 0;

        let mut artifacts = PipelineArtifacts::new();
        artifacts.documents.push(Document {
            id: "doc1".to_string(),
            uri: "/in/doc1.txt".to_string(),
            title: "doc1".to_string(),
            text: "aaaaabbbbb".to_string(),
            creation_date: None,
            metadata: json!({}),
        });

        TextUnitsStage.run(&ctx, &mut artifacts).await.unwrap();

        assert_eq!(artifacts.text_units.len(), 2);
        assert_eq!(artifacts.text_units[1].order, 1);
        assert_eq!(artifacts.text_units[1].text, "bbbbb");
        assert_eq!(artifacts.text_units[1].id, stable_id(&["doc1", "1"]));
    }
}
