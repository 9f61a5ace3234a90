use anyhow::Result;
use tracing::info;

/// Generate embeddings for a batch of texts using fastembed.
///
/// The ONNX inference is off-loaded to a blocking thread so it does not
/// obstruct Tokio's async scheduler. The model weights are downloaded on
/// first use.
pub async fn embed_texts(texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    info!(count = texts.len(), "generating embeddings");

    let embeddings = tokio::task::spawn_blocking(move || {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let mut model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGELargeENV15).with_show_download_progress(true),
        )?;
        let embeddings = model.embed(texts, None)?;
        Ok::<Vec<Vec<f32>>, anyhow::Error>(embeddings)
    })
    .await??;

    info!(
        count = embeddings.len(),
        dimensions = embeddings.first().map(|e| e.len()).unwrap_or(0),
        "embeddings generated"
    );
    Ok(embeddings)
}

/// Generate an embedding for a single query string.
pub async fn embed_query(text: &str) -> Result<Vec<f32>> {
    let mut embeddings = embed_texts(vec![text.to_owned()]).await?;
    embeddings
        .pop()
        .ok_or_else(|| anyhow::anyhow!("embedding model returned no output"))
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        let a = [0.0, 0.0];
        let b = [1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_opposite_vectors() {
        let a = [1.0, 2.0];
        let b = [-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }
}
