use super::RagError;
use crate::db::models::Chunk;
use tracing::debug;

/// A chunk paired with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Cosine similarity between two vectors.
///
/// Vectors of different lengths, or a zero-norm side, score 0.0.
/// [`retrieve`] reports a length mismatch as an error instead.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Rank `chunks` against `query_embedding` and keep the best `top_k`.
///
/// Linear scan over every chunk. Results are ordered by descending score;
/// equal scores keep their document order. A chunk whose embedding length
/// differs from the query's is an integrity error, never coerced.
pub fn retrieve<'a>(
    query_embedding: &[f32],
    chunks: &'a [Chunk],
    top_k: usize,
) -> Result<Vec<ScoredChunk<'a>>, RagError> {
    if top_k == 0 || chunks.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.embedding.len() != query_embedding.len() {
            return Err(RagError::DimensionMismatch {
                expected: query_embedding.len(),
                actual: chunk.embedding.len(),
            });
        }
        scored.push(ScoredChunk {
            chunk,
            score: cosine_similarity(query_embedding, &chunk.embedding),
        });
    }

    // `sort_by` is stable, which gives the document-order tie-break.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);

    debug!(
        candidates = chunks.len(),
        returned = scored.len(),
        best = scored.first().map(|s| s.score),
        "retrieved chunks"
    );
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: format!("c{}", index),
            text: format!("chunk {}", index),
            embedding,
            chunk_index: index,
        }
    }

    /// Unit vector in the xy-plane whose cosine against [1, 0] is `score`.
    fn with_score(index: usize, score: f32) -> Chunk {
        chunk(index, vec![score, (1.0 - score * score).sqrt()])
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_symmetric() {
        let a = vec![0.3, -1.2, 4.0, 0.01];
        let b = vec![-2.0, 0.5, 1.5, 3.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        let zero = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &b), 0.0);
        assert_eq!(cosine_similarity(&b, &zero), 0.0);
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn test_retrieve_stable_tie_break() {
        let chunks: Vec<Chunk> = [0.9, 0.1, 0.5, 0.9, 0.3]
            .iter()
            .enumerate()
            .map(|(i, s)| with_score(i, *s))
            .collect();

        let results = retrieve(&[1.0, 0.0], &chunks, 2).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c3"]);
        assert!((results[0].score - 0.9).abs() < 1e-5);
        assert!((results[1].score - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_retrieve_sorted_and_bounded() {
        let chunks: Vec<Chunk> = [0.2, 0.8, -0.4, 0.6]
            .iter()
            .enumerate()
            .map(|(i, s)| with_score(i, *s))
            .collect();

        let results = retrieve(&[1.0, 0.0], &chunks, 10).unwrap();
        assert_eq!(results.len(), 4);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c0", "c2"]);

        assert_eq!(retrieve(&[1.0, 0.0], &chunks, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_retrieve_empty_cases() {
        let chunks = vec![with_score(0, 0.5)];
        assert!(retrieve(&[1.0, 0.0], &[], 3).unwrap().is_empty());
        assert!(retrieve(&[1.0, 0.0], &chunks, 0).unwrap().is_empty());
    }

    #[test]
    fn test_retrieve_zero_norm_chunk() {
        let chunks = vec![chunk(0, vec![0.0, 0.0]), with_score(1, -0.5)];
        let results = retrieve(&[1.0, 0.0], &chunks, 2).unwrap();
        assert_eq!(results[0].chunk.id, "c0");
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_retrieve_dimension_mismatch() {
        let chunks = vec![with_score(0, 0.5), chunk(1, vec![1.0, 0.0, 0.0])];
        let err = retrieve(&[1.0, 0.0], &chunks, 2).unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }
}
