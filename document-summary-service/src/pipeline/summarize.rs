use std::path::Path;

use futures::future::try_join_all;
use tracing::info;

use super::{embedding, splitter};
use crate::config::ServiceConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::llm;

const SUMMARY_PREAMBLE: &str = "You are a precise document summarization assistant.";

/// One chunk of a document, paired with its embedding.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Per-document summary index: the tree-reduced root summary plus the
/// embedded chunks it was built from. Owned by the session that built it
/// and never persisted.
#[derive(Debug, Clone)]
pub struct DocumentSummaryIndex {
    doc_id: String,
    summary: String,
    chunks: Vec<IndexedChunk>,
}

impl DocumentSummaryIndex {
    pub fn new(doc_id: String, summary: String, chunks: Vec<IndexedChunk>) -> Self {
        Self {
            doc_id,
            summary,
            chunks,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// The stored summary for `doc_id`, or `None` for any other id.
    pub fn get_document_summary(&self, doc_id: &str) -> Option<&str> {
        (doc_id == self.doc_id).then_some(self.summary.as_str())
    }

    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }
}

/// Build a summary index for the document at `path`.
///
/// Returns the index together with the root summary text. Blocking from the
/// caller's perspective; the leaf summarization fan-out and the reduction
/// steps run concurrently inside.
pub async fn summarize(
    config: &ServiceConfig,
    path: &Path,
) -> PipelineResult<(DocumentSummaryIndex, String)> {
    let doc_id = doc_id_for_path(path)?;
    info!(doc_id = %doc_id, path = %path.display(), "starting document summarization");

    let text = load_first_unit(path).await?;

    let chunks = splitter::split_text(&text, config.chunk_size);
    if chunks.is_empty() {
        return Err(PipelineError::DocumentLoad(
            "document contains no text".to_string(),
        ));
    }
    info!(doc_id = %doc_id, chunk_count = chunks.len(), "document split");

    let summary = tree_summarize(config, &chunks).await?;
    info!(doc_id = %doc_id, summary_length = summary.len(), "summary generated");

    let embeddings = embedding::embed_texts(chunks.clone())
        .await
        .map_err(|e| PipelineError::ModelUnavailable(format!("chunk embedding failed: {e}")))?;

    let indexed = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(text, embedding)| IndexedChunk { text, embedding })
        .collect();

    let index = DocumentSummaryIndex::new(doc_id, summary.clone(), indexed);
    Ok((index, summary))
}

/// Document identifier: the file's base name without its extension.
pub fn doc_id_for_path(path: &Path) -> PipelineResult<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| {
            PipelineError::DocumentLoad(format!(
                "cannot derive document id from {}",
                path.display()
            ))
        })
}

/// Extract text from the PDF and keep exactly the first parsed unit.
/// Multi-page documents are deliberately truncated; lifting that is out of
/// scope for this pipeline.
async fn load_first_unit(path: &Path) -> PipelineResult<String> {
    let path = path.to_path_buf();

    let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_by_pages(&path))
        .await
        .map_err(|e| PipelineError::DocumentLoad(e.to_string()))?
        .map_err(|e| PipelineError::DocumentLoad(e.to_string()))?;

    let first = pages.into_iter().next().unwrap_or_default();
    if first.trim().is_empty() {
        return Err(PipelineError::DocumentLoad(
            "no parsable text in first document unit".to_string(),
        ));
    }

    Ok(first)
}

/// Tree-reduction summarization: summarize every leaf chunk concurrently,
/// then merge summaries in batches until a single root summary remains.
async fn tree_summarize(config: &ServiceConfig, chunks: &[String]) -> PipelineResult<String> {
    let leaf_futures = chunks.iter().map(|chunk| leaf_summary(config, chunk));
    let mut summaries = try_join_all(leaf_futures).await?;

    while summaries.len() > 1 {
        info!(summaries = summaries.len(), "merging partial summaries");
        let batches: Vec<Vec<String>> = summaries
            .chunks(config.merge_batch_size.max(2))
            .map(|batch| batch.to_vec())
            .collect();
        let merge_futures = batches.iter().map(|batch| merge_summaries(config, batch));
        summaries = try_join_all(merge_futures).await?;
    }

    summaries.pop().ok_or_else(|| {
        PipelineError::ModelUnavailable("summarization produced no output".to_string())
    })
}

async fn leaf_summary(config: &ServiceConfig, chunk: &str) -> PipelineResult<String> {
    let prompt = format!(
        "Summarize the following document section. Capture the key points, \
         named entities, and any conclusions.\n\nSection:\n{chunk}\n\nSummary:"
    );
    llm::complete(config, SUMMARY_PREAMBLE, &prompt).await
}

async fn merge_summaries(config: &ServiceConfig, summaries: &[String]) -> PipelineResult<String> {
    if summaries.len() == 1 {
        return Ok(summaries[0].clone());
    }

    let joined = summaries.join("\n---\n");
    let prompt = format!(
        "The following are summaries of consecutive parts of one document. \
         Merge them into a single coherent summary that preserves all key \
         information.\n\nPartial summaries:\n{joined}\n\nMerged summary:"
    );
    llm::complete(config, SUMMARY_PREAMBLE, &prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_is_file_stem() {
        assert_eq!(
            doc_id_for_path(Path::new("./documents/report.pdf")).unwrap(),
            "report"
        );
        assert_eq!(
            doc_id_for_path(Path::new("sample.v2.pdf")).unwrap(),
            "sample.v2"
        );
    }

    #[test]
    fn test_doc_id_requires_a_file_name() {
        assert!(doc_id_for_path(Path::new("/")).is_err());
        assert!(doc_id_for_path(Path::new("")).is_err());
    }

    #[test]
    fn test_summary_lookup_by_doc_id() {
        let index = DocumentSummaryIndex::new(
            "report".to_string(),
            "A short summary.".to_string(),
            Vec::new(),
        );

        assert_eq!(index.get_document_summary("report"), Some("A short summary."));
        assert_eq!(index.get_document_summary("other"), None);
    }

    #[tokio::test]
    async fn test_missing_document_is_a_load_error() {
        let config = ServiceConfig::default();
        let result = summarize(&config, Path::new("/does/not/exist.pdf")).await;

        assert!(matches!(result, Err(PipelineError::DocumentLoad(_))));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_a_load_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        tokio::fs::write(&path, b"this is not a pdf").await.unwrap();

        let config = ServiceConfig::default();
        let result = summarize(&config, &path).await;

        assert!(matches!(result, Err(PipelineError::DocumentLoad(_))));
    }
}
