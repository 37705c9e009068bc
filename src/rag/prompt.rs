use super::ScoredChunk;

/// Assemble the grounded prompt sent as the single user turn in RAG mode.
///
/// Chunks are labelled `Context 1..N` in the order given, which is
/// relevance order straight out of [`super::retrieve`].
pub fn build_rag_prompt(query: &str, retrieved: &[ScoredChunk<'_>]) -> String {
    let context = retrieved
        .iter()
        .enumerate()
        .map(|(i, scored)| format!("Context {}:\n{}", i + 1, scored.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on the following context, answer the question.\n\n\
         {context}\n\n\
         Question: {query}\n\n\
         Answer based only on the provided context:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Chunk;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", index),
            text: text.into(),
            embedding: vec![1.0],
            chunk_index: index,
        }
    }

    #[test]
    fn test_prompt_keeps_relevance_order() {
        let late = chunk(7, "Rust was first released in 2015.");
        let early = chunk(0, "Rust is a systems language.");
        let retrieved = vec![
            ScoredChunk {
                chunk: &late,
                score: 0.9,
            },
            ScoredChunk {
                chunk: &early,
                score: 0.4,
            },
        ];

        let prompt = build_rag_prompt("When was Rust released?", &retrieved);
        let first = prompt.find("Context 1:\nRust was first released").unwrap();
        let second = prompt.find("Context 2:\nRust is a systems language.").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Question: When was Rust released?"));
        assert!(prompt.ends_with("Answer based only on the provided context:"));
    }

    #[test]
    fn test_prompt_with_no_context() {
        let prompt = build_rag_prompt("anything?", &[]);
        assert!(!prompt.contains("Context 1"));
        assert!(prompt.contains("Question: anything?"));
        assert!(prompt.starts_with("Based on the following context"));
    }
}
