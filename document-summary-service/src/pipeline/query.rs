use std::sync::Arc;

use futures::future::try_join_all;
use tracing::info;

use super::embedding;
use super::splitter;
use super::summarize::{DocumentSummaryIndex, IndexedChunk};
use crate::config::ServiceConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{self, AnswerStream};

/// Retrieval-augmented answering interface bound to one summary index.
///
/// Every query re-runs retrieval and synthesis; only the index is reused.
/// Answers are delivered as an incremental fragment stream.
pub struct QueryEngine {
    index: Arc<DocumentSummaryIndex>,
    config: ServiceConfig,
}

impl QueryEngine {
    pub fn new(index: DocumentSummaryIndex, config: ServiceConfig) -> Self {
        Self {
            index: Arc::new(index),
            config,
        }
    }

    pub fn doc_id(&self) -> &str {
        self.index.doc_id()
    }

    /// Answer `question` against the index.
    pub async fn query(&self, question: &str) -> PipelineResult<AnswerStream> {
        let query_embedding = embedding::embed_query(question)
            .await
            .map_err(|e| PipelineError::ModelUnavailable(format!("query embedding failed: {e}")))?;

        let ranked = rank_chunks(
            &query_embedding,
            self.index.chunks(),
            self.config.retrieval_top_k,
        );
        info!(
            doc_id = self.index.doc_id(),
            retrieved = ranked.len(),
            "chunks retrieved for query"
        );

        let retrieved: Vec<String> = ranked
            .iter()
            .map(|&i| self.index.chunks()[i].text.clone())
            .collect();

        let context = self.reduce_context(question, retrieved).await?;

        let prompt = format!(
            "You are an assistant answering questions about a single document. \
             Use only the context below to answer the question.\n\n\
             Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
        );

        llm::stream_generate(&self.config, &prompt).await
    }

    /// Tree-summarize synthesis: when the retrieved context exceeds the
    /// chunk budget, produce per-chunk partial answers concurrently and
    /// merge until the context fits. The final synthesis is streamed by the
    /// caller.
    async fn reduce_context(
        &self,
        question: &str,
        mut parts: Vec<String>,
    ) -> PipelineResult<String> {
        while parts.len() > 1
            && splitter::approx_token_count(&parts.join("\n")) > self.config.chunk_size
        {
            info!(parts = parts.len(), "reducing retrieved context");
            let partial_futures = parts
                .iter()
                .map(|part| partial_answer(&self.config, question, part));
            let partials = try_join_all(partial_futures).await?;

            parts = partials
                .chunks(self.config.merge_batch_size.max(2))
                .map(|batch| batch.join("\n---\n"))
                .collect();
        }

        Ok(parts.join("\n---\n"))
    }
}

/// Indices of the `top_k` chunks most similar to the query embedding,
/// best first.
pub fn rank_chunks(query_embedding: &[f32], chunks: &[IndexedChunk], top_k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            (
                i,
                embedding::cosine_similarity(query_embedding, &chunk.embedding),
            )
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(top_k.max(1))
        .map(|(i, _)| i)
        .collect()
}

async fn partial_answer(
    config: &ServiceConfig,
    question: &str,
    context: &str,
) -> PipelineResult<String> {
    let prompt = format!(
        "Answer the question using only the context below. If the context \
         is not relevant to the question, say so briefly.\n\n\
         Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    );
    llm::complete(
        config,
        "You are an assistant answering questions about a single document.",
        &prompt,
    )
    .await
}
