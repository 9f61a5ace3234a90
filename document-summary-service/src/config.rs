use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from environment variables with defaults.
///
/// The service talks to a locally hosted Ollama endpoint for generation and
/// runs the embedding model in-process, so no API keys are required.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding uploaded PDF documents.
    pub documents_dir: PathBuf,
    /// Base URL of the Ollama endpoint.
    pub ollama_url: String,
    /// Generation model name, e.g. "llama3".
    pub generation_model: String,
    /// Per-request timeout for the generation model.
    pub request_timeout: Duration,
    /// Maximum chunk size, in tokens (approximated at 4 chars per token).
    pub chunk_size: usize,
    /// Number of chunks retrieved per query.
    pub retrieval_top_k: usize,
    /// Number of partial summaries merged per tree-reduction step.
    pub merge_batch_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./documents"),
            ollama_url: "http://localhost:11434".to_string(),
            generation_model: "llama3".to_string(),
            request_timeout: Duration::from_secs(60),
            chunk_size: 4096,
            retrieval_top_k: 4,
            merge_batch_size: 10,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            documents_dir: std::env::var("DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.documents_dir),
            ollama_url: std::env::var("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            generation_model: std::env::var("GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            request_timeout: std::env::var("LLM_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            chunk_size: parse_env("CHUNK_SIZE", defaults.chunk_size),
            retrieval_top_k: parse_env("RETRIEVAL_TOP_K", defaults.retrieval_top_k),
            merge_batch_size: parse_env("MERGE_BATCH_SIZE", defaults.merge_batch_size),
        }
    }
}

fn parse_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
