/// Context window assembly for answer composition.
///
/// Retrieval results arrive ordered by similarity. The window keeps as
/// many of the highest-scoring chunks as fit within the character budget,
/// dropping the lowest-scoring ones first; the prompt only ever contains
/// text that exists in the index.
use crate::db::search::RetrievedChunk;

/// Chunks selected for the prompt, in retrieval order.
pub struct ContextWindow<'a> {
    pub chunks: Vec<&'a RetrievedChunk>,
    pub text: String,
}

/// Select the highest-scoring chunks whose combined text fits within
/// `budget_chars`. Counting covers chunk content plus the blank-line
/// separators joining them, so the assembled text never exceeds the budget.
pub fn assemble_window(results: &[RetrievedChunk], budget_chars: usize) -> ContextWindow<'_> {
    const SEPARATOR_CHARS: usize = 2;

    let mut chunks = Vec::new();
    let mut used = 0usize;

    for chunk in results {
        let sep = if chunks.is_empty() { 0 } else { SEPARATOR_CHARS };
        let len = chunk.content.chars().count();
        if used + sep + len > budget_chars {
            break;
        }
        used += sep + len;
        chunks.push(chunk);
    }

    let text = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    ContextWindow { chunks, text }
}

/// Build the tutor system prompt around the assembled context.
pub fn build_system_prompt(context: &str, language: &str) -> String {
    format!(
        "You are a tutor. Explain the answer to the student's question in {language}, \
         using only the study material below. If the material does not cover the \
         question, say so instead of guessing.\n\nStudy material:\n{context}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, similarity: f64) -> RetrievedChunk {
        RetrievedChunk {
            document_id: "doc".to_string(),
            chunk_id: 1,
            position: 0,
            start_offset: 0,
            content: content.to_string(),
            similarity,
        }
    }

    #[test]
    fn test_all_chunks_fit() {
        let results = vec![chunk("aaaa", 0.9), chunk("bbbb", 0.8)];
        let window = assemble_window(&results, 100);
        assert_eq!(window.chunks.len(), 2);
        assert_eq!(window.text, "aaaa\n\nbbbb");
    }

    #[test]
    fn test_lowest_scoring_dropped_first() {
        let results = vec![chunk("aaaa", 0.9), chunk("bbbb", 0.8), chunk("cccc", 0.7)];
        let window = assemble_window(&results, 10);
        assert_eq!(window.chunks.len(), 2);
        assert!(window.text.contains("aaaa"));
        assert!(window.text.contains("bbbb"));
        assert!(!window.text.contains("cccc"));
    }

    #[test]
    fn test_separators_count_toward_budget() {
        let results = vec![chunk("aaaa", 0.9), chunk("bbbb", 0.8)];
        // Content alone fits (8 chars) but "aaaa\n\nbbbb" would be 10
        let window = assemble_window(&results, 9);
        assert_eq!(window.chunks.len(), 1);
        assert_eq!(window.text, "aaaa");

        let window = assemble_window(&results, 10);
        assert_eq!(window.chunks.len(), 2);
        assert_eq!(window.text.chars().count(), 10);
    }

    #[test]
    fn test_budget_smaller_than_best_chunk() {
        let results = vec![chunk("aaaaaaaa", 0.9)];
        let window = assemble_window(&results, 4);
        assert!(window.chunks.is_empty());
        assert!(window.text.is_empty());
    }

    #[test]
    fn test_empty_results() {
        let window = assemble_window(&[], 100);
        assert!(window.chunks.is_empty());
    }

    #[test]
    fn test_budget_counts_chars_not_bytes() {
        // four chars, twelve bytes
        let results = vec![chunk("日本語だ", 0.9)];
        let window = assemble_window(&results, 4);
        assert_eq!(window.chunks.len(), 1);
    }

    #[test]
    fn test_system_prompt_carries_language_and_context() {
        let prompt = build_system_prompt("the cell is small", "Spanish");
        assert!(prompt.contains("Spanish"));
        assert!(prompt.contains("the cell is small"));
    }
}
