use thiserror::Error;

/// Failures surfaced by the summarization and query pipelines.
///
/// Both variants are user-visible: the presentation layer maps them to
/// responses and never retries. A failed pipeline call leaves the session
/// exactly as it was before the action.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document could not be read or parsed. Raised before any index
    /// construction takes place.
    #[error("document could not be loaded: {0}")]
    DocumentLoad(String),

    /// The embedding or generation model is unreachable, timed out, or
    /// returned unusable output.
    #[error("model endpoint unavailable: {0}")]
    ModelUnavailable(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
